//! Speech-markup assembly
//!
//! Replies carry the detected conversation language nested inside a fixed
//! envelope locale; keepalive probes are a tailing silence with no audible
//! content. Text is always XML-escaped before insertion.

use crate::config::VoiceConfig;

const SPEAK_OPEN: &str = "<speak version='1.0' \
     xmlns='http://www.w3.org/2001/10/synthesis' \
     xmlns:mstts='https://www.w3.org/2001/mstts'";

/// A complete speech-markup document ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsmlDocument {
    body: String,
}

impl SsmlDocument {
    /// Utterance spoken entirely in the voice's own locale (greetings,
    /// fixed prompts).
    pub fn utterance(voice: &VoiceConfig, text: &str) -> Self {
        let body = format!(
            "{} xml:lang='{}'><voice xml:lang='{}' xml:gender='{}' name='{}'>{}</voice></speak>",
            SPEAK_OPEN,
            voice.locale,
            voice.locale,
            voice.gender,
            voice.name,
            xml_escape(text)
        );
        Self { body }
    }

    /// Reply utterance with the detected language nested inside the envelope
    /// locale, so a multilingual voice switches language without changing the
    /// outer document.
    pub fn localized_utterance(voice: &VoiceConfig, language: &str, text: &str) -> Self {
        let body = format!(
            "{} xml:lang='{}'><voice xml:lang='{}' xml:gender='{}' name='{}'>\
             <lang xml:lang=\"{}\">{}</lang></voice></speak>",
            SPEAK_OPEN,
            voice.locale,
            voice.locale,
            voice.gender,
            voice.name,
            language,
            xml_escape(text)
        );
        Self { body }
    }

    /// Minimal silent probe: a 5 ms tailing silence keeps the synthesis
    /// session warm without producing audible output.
    pub fn silence_probe(voice: &VoiceConfig) -> Self {
        let body = format!(
            "{} xml:lang='{}'><voice xml:lang='{}' xml:gender='{}' name='{}'>\
             <mstts:silence type=\"Tailing\" value=\"5ms\"/></voice></speak>",
            SPEAK_OPEN, voice.locale, voice.locale, voice.gender, voice.name
        );
        Self { body }
    }

    /// The serialized markup.
    pub fn as_str(&self) -> &str {
        &self.body
    }

    /// Consume into the serialized markup.
    pub fn into_string(self) -> String {
        self.body
    }
}

/// Escape XML special characters for element content and attribute values.
fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

//! Configuration types for the avatar session controller

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Main configuration for an avatar conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarSessionConfig {
    /// Base URL of the trusted backend serving tokens and dialogue
    /// (e.g. `http://localhost:7071/api`)
    pub backend_base_url: String,

    /// System instruction seeding the conversation (first turn, never removed)
    pub system_prompt: String,

    /// Voice used for synthesized replies
    pub voice: VoiceConfig,

    /// Per-language voice overrides (language tag -> voice name), applied when
    /// the detected reply language needs a dedicated voice (e.g. RTL locales)
    pub voice_overrides: HashMap<String, String>,

    /// Greeting spoken when the avatar finishes starting
    pub greeting: GreetingConfig,

    /// Avatar character and video appearance, carried to the synthesis service
    pub avatar: AvatarAppearance,

    /// Keepalive probing parameters
    pub keepalive: KeepAliveConfig,

    /// Session recovery parameters
    pub reconnect: ReconnectConfig,
}

/// Voice selection for synthesized speech
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Synthesis voice name
    pub name: String,

    /// Locale declared on the markup envelope (replies may nest another
    /// language inside it)
    pub locale: String,

    /// Gender attribute declared on the voice element
    pub gender: String,
}

/// Greeting utterance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GreetingConfig {
    /// Text spoken and shown when the avatar becomes ready
    pub text: String,

    /// Language tag the greeting is spoken in
    pub language: String,
}

/// Avatar character and video appearance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarAppearance {
    /// Avatar character name
    pub character: String,

    /// Avatar presentation style
    pub style: String,

    /// Background fill rendered behind the character, `#RRGGBBAA`.
    /// A solid chroma green here is what the matte pass keys out.
    pub background_color: String,

    /// Horizontal crop window applied to the service's video output
    pub crop: CropWindow,
}

/// Horizontal crop window in source pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropWindow {
    /// Left edge (inclusive)
    pub left: u32,

    /// Right edge (exclusive)
    pub right: u32,
}

/// Keepalive probing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepAliveConfig {
    /// Milliseconds between probe ticks (must be positive)
    pub interval_ms: u64,

    /// Probe budget per connected period; 0 disables probing entirely
    /// (the supervisor halts on its first tick)
    pub max_attempts: u32,
}

/// Session recovery parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Pause between tearing down a failed pair and rebuilding it,
    /// so the remote endpoint is not thrashed
    pub settle_delay_ms: u64,

    /// Fixed backoff before retrying a rebuild that failed at the
    /// credential-fetch or construction step
    pub retry_backoff_ms: u64,
}

impl Default for AvatarSessionConfig {
    fn default() -> Self {
        Self {
            backend_base_url: "http://localhost:7071/api".to_string(),
            system_prompt: "You are an AI assistant focused on delivering brief product \
                            details and assisting with the ordering process. Provide \
                            responses within 3 sentences, emphasizing conciseness and \
                            accuracy. Respond in the language the customer is using."
                .to_string(),
            voice: VoiceConfig::default(),
            voice_overrides: HashMap::from([(
                "ar-AE".to_string(),
                "ar-AE-FatimaNeural".to_string(),
            )]),
            greeting: GreetingConfig::default(),
            avatar: AvatarAppearance::default(),
            keepalive: KeepAliveConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            name: "en-US-CoraMultilingualNeural".to_string(),
            locale: "en-US".to_string(),
            gender: "Female".to_string(),
        }
    }
}

impl Default for GreetingConfig {
    fn default() -> Self {
        Self {
            text: "Hello, I'm Lisa. How can I help you today?".to_string(),
            language: "en-US".to_string(),
        }
    }
}

impl Default for AvatarAppearance {
    fn default() -> Self {
        Self {
            character: "lisa".to_string(),
            style: "casual-sitting".to_string(),
            background_color: "#00FF00FF".to_string(),
            // Center the 1080p character strip for a portrait layout
            crop: CropWindow {
                left: 600,
                right: 1320,
            },
        }
    }
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval_ms: 60_000,
            max_attempts: 20,
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 2_000,
            retry_backoff_ms: 30_000,
        }
    }
}

impl AvatarSessionConfig {
    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `backend_base_url` is not an HTTP(S) URL
    /// - `voice.name` or `voice.locale` is empty
    /// - `keepalive.interval_ms` is 0
    /// - `reconnect` delays are 0
    /// - `avatar.background_color` is not `#RRGGBBAA`
    /// - `avatar.crop` is not a non-empty left-to-right window
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if !self.backend_base_url.starts_with("http://")
            && !self.backend_base_url.starts_with("https://")
        {
            return Err(Error::InvalidConfig(format!(
                "backend_base_url must start with http:// or https://, got {}",
                self.backend_base_url
            )));
        }

        if self.voice.name.is_empty() {
            return Err(Error::InvalidConfig(
                "voice.name must not be empty".to_string(),
            ));
        }

        if self.voice.locale.is_empty() {
            return Err(Error::InvalidConfig(
                "voice.locale must not be empty".to_string(),
            ));
        }

        if self.keepalive.interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "keepalive.interval_ms must be positive".to_string(),
            ));
        }

        if self.reconnect.settle_delay_ms == 0 || self.reconnect.retry_backoff_ms == 0 {
            return Err(Error::InvalidConfig(
                "reconnect delays must be positive".to_string(),
            ));
        }

        let color = &self.avatar.background_color;
        if color.len() != 9
            || !color.starts_with('#')
            || !color[1..].chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(Error::InvalidConfig(format!(
                "avatar.background_color must be #RRGGBBAA, got {}",
                color
            )));
        }

        if self.avatar.crop.left >= self.avatar.crop.right {
            return Err(Error::InvalidConfig(format!(
                "avatar.crop must satisfy left < right, got {}..{}",
                self.avatar.crop.left, self.avatar.crop.right
            )));
        }

        Ok(())
    }

    /// Create a configuration pointing at the given backend
    pub fn new(backend_base_url: &str) -> Self {
        Self {
            backend_base_url: backend_base_url.to_string(),
            ..Self::default()
        }
    }

    /// Resolve the voice used for a reply in the given language,
    /// honoring per-language overrides
    pub fn voice_for(&self, language: &str) -> VoiceConfig {
        match self.voice_overrides.get(language) {
            Some(name) => VoiceConfig {
                name: name.clone(),
                ..self.voice.clone()
            },
            None => self.voice.clone(),
        }
    }

    /// Set the reply voice
    ///
    /// Useful for chaining with `new()`.
    pub fn with_voice(mut self, name: &str, locale: &str) -> Self {
        self.voice = VoiceConfig {
            name: name.to_string(),
            locale: locale.to_string(),
            ..self.voice
        };
        self
    }

    /// Set the greeting utterance
    ///
    /// Useful for chaining with `new()`.
    pub fn with_greeting(mut self, text: &str, language: &str) -> Self {
        self.greeting = GreetingConfig {
            text: text.to_string(),
            language: language.to_string(),
        };
        self
    }

    /// Set keepalive interval and probe budget
    ///
    /// Useful for chaining with `new()`.
    pub fn with_keepalive(mut self, interval_ms: u64, max_attempts: u32) -> Self {
        self.keepalive = KeepAliveConfig {
            interval_ms,
            max_attempts,
        };
        self
    }

    /// Add a per-language voice override
    ///
    /// Useful for chaining with `new()`.
    pub fn with_voice_override(mut self, language: &str, voice_name: &str) -> Self {
        self.voice_overrides
            .insert(language.to_string(), voice_name.to_string());
        self
    }

    /// Load a configuration from a YAML document
    ///
    /// Missing fields fall back to their defaults; the result is validated.
    pub fn from_yaml_str(yaml: &str) -> crate::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| crate::Error::SerializationError(format!("invalid config YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

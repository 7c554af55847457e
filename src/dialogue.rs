//! Conversation exchange with the dialogue backend
//!
//! The backend owns the conversation: each exchange sends the full log and
//! receives the full updated log back, which replaces the local copy
//! wholesale. Nothing here inspects or edits individual turns beyond reading
//! the newest assistant reply.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Speaker role in the conversation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn in the conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    /// System prompt turn, always first in the log.
    pub fn system(content: &str) -> Self {
        Self {
            role: Role::System,
            content: content.to_string(),
        }
    }

    /// User utterance turn.
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
        }
    }

    /// Assistant reply turn.
    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
        }
    }
}

/// Product offer attached to an assistant reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Pitch line for the product
    #[serde(default)]
    pub content: Option<String>,
    /// Image shown alongside the pitch
    #[serde(default)]
    pub image_url: Option<String>,
    /// Backend-specific extras (pricing, taglines) passed through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Backend response to a conversation exchange.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DialogueReply {
    /// Full conversation log including the new assistant turn
    pub messages: Vec<ConversationTurn>,
    /// Product offers the assistant chose to surface
    #[serde(default)]
    pub products: Vec<Product>,
}

impl DialogueReply {
    /// Text of the newest assistant turn, if the log ends with one.
    pub fn latest_assistant_text(&self) -> Option<&str> {
        let turn = self.messages.last()?;
        if turn.role == Role::Assistant {
            Some(turn.content.as_str())
        } else {
            None
        }
    }

    /// The single product offer to surface, if any.
    ///
    /// At most one card is shown per reply; any further products in the
    /// response are dropped here rather than at every call site.
    pub fn featured_product(&self) -> Option<&Product> {
        self.products.first()
    }
}

/// Conversation backend surface.
#[async_trait]
pub trait DialogueBackend: Send + Sync {
    /// Send the conversation log and receive the updated log plus any offers.
    async fn exchange(&self, turns: &[ConversationTurn]) -> Result<DialogueReply>;

    /// Detect the language of a user utterance, as a BCP 47 tag.
    async fn detect_language(&self, text: &str) -> Result<String>;
}

/// Dialogue backend over the trusted HTTP API.
pub struct HttpDialogueClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDialogueClient {
    /// Create a client against the given backend base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| Error::DialogueFailed(format!("HTTP client build failed: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl DialogueBackend for HttpDialogueClient {
    async fn exchange(&self, turns: &[ConversationTurn]) -> Result<DialogueReply> {
        let url = self.endpoint("message");
        let response = self
            .client
            .post(&url)
            .json(turns)
            .send()
            .await
            .map_err(|e| Error::DialogueFailed(format!("message request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::DialogueFailed(format!(
                "message endpoint returned {}",
                response.status()
            )));
        }

        let reply: DialogueReply = response
            .json()
            .await
            .map_err(|e| Error::DialogueFailed(format!("message response malformed: {}", e)))?;

        debug!(
            "dialogue exchange: {} turn(s) in log, {} product(s)",
            reply.messages.len(),
            reply.products.len()
        );
        Ok(reply)
    }

    async fn detect_language(&self, text: &str) -> Result<String> {
        let url = self.endpoint("detectLanguage");
        let response = self
            .client
            .post(&url)
            .query(&[("text", text)])
            .send()
            .await
            .map_err(|e| {
                Error::DialogueFailed(format!("language detection request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(Error::DialogueFailed(format!(
                "language detection endpoint returned {}",
                response.status()
            )));
        }

        let tag = response.text().await.map_err(|e| {
            Error::DialogueFailed(format!("language detection response unreadable: {}", e))
        })?;

        let tag = tag.trim().to_string();
        if tag.is_empty() {
            return Err(Error::DialogueFailed(
                "language detection returned an empty tag".to_string(),
            ));
        }

        debug!("detected language: {}", tag);
        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let turn = ConversationTurn::user("hello");
        let json = serde_json::to_string(&turn).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hello"}"#);
    }

    #[test]
    fn test_reply_parses_with_products() {
        let json = r#"{
            "messages": [
                {"role": "system", "content": "You are a helpful assistant."},
                {"role": "user", "content": "Any deals today?"},
                {"role": "assistant", "content": "We have a great offer on headphones."}
            ],
            "products": [
                {"content": "Noise-cancelling headphones", "image_url": "https://cdn.example.com/hp.png"},
                {"content": "Spare ear pads", "image_url": null}
            ]
        }"#;

        let reply: DialogueReply = serde_json::from_str(json).unwrap();
        assert_eq!(reply.messages.len(), 3);
        assert_eq!(
            reply.latest_assistant_text(),
            Some("We have a great offer on headphones.")
        );
        assert_eq!(reply.products.len(), 2);
        assert_eq!(
            reply.featured_product().unwrap().content.as_deref(),
            Some("Noise-cancelling headphones")
        );
    }

    #[test]
    fn test_reply_defaults_products_when_absent() {
        let json = r#"{"messages": [{"role": "assistant", "content": "Hi."}]}"#;
        let reply: DialogueReply = serde_json::from_str(json).unwrap();
        assert!(reply.products.is_empty());
        assert!(reply.featured_product().is_none());
    }

    #[test]
    fn test_latest_assistant_text_requires_assistant_tail() {
        let json = r#"{"messages": [
            {"role": "assistant", "content": "Hi."},
            {"role": "user", "content": "Hello?"}
        ]}"#;
        let reply: DialogueReply = serde_json::from_str(json).unwrap();
        assert_eq!(reply.latest_assistant_text(), None);
    }

    #[test]
    fn test_product_passes_unknown_fields_through() {
        let json = r#"{
            "content": "Winter coat",
            "image_url": "https://cdn.example.com/coat.png",
            "special_offer": "50% off",
            "original_price": "$120"
        }"#;

        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.content.as_deref(), Some("Winter coat"));
        assert_eq!(product.extra.get("special_offer").unwrap(), "50% off");
        assert_eq!(product.extra.get("original_price").unwrap(), "$120");
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let client = HttpDialogueClient::new("http://localhost:7071/api/").unwrap();
        assert_eq!(client.endpoint("message"), "http://localhost:7071/api/message");
    }
}

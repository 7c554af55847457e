//! Credential acquisition from the trusted backend
//!
//! Two short-lived credentials bootstrap a session pair: relay credentials for
//! the media transport and a bearer token for the synthesis service. Both are
//! fetched in a single round trip and replaced wholesale on every refresh;
//! retry policy belongs to the caller, never to the provider itself.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Relay endpoint credentials for transport negotiation.
///
/// Exactly one relay entry is configured on the peer connection; the backend
/// may list one URL or several for the same relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayCredential {
    /// Relay URLs (`turn:` / `turns:`)
    pub urls: Vec<String>,
    /// Relay username
    pub username: String,
    /// Relay password
    pub password: String,
}

/// Bearer credential for the synthesis session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechCredential {
    /// Raw bearer token, attached as-is by the synthesis connector
    pub token: String,
}

/// Source of session credentials.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Fetch relay credentials for transport negotiation.
    async fn fetch_transport_credential(&self) -> Result<RelayCredential>;

    /// Fetch a bearer token for the synthesis session.
    async fn fetch_synthesis_credential(&self) -> Result<SpeechCredential>;
}

/// The backend hands relay URLs back as either a single string or a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UrlList {
    One(String),
    Many(Vec<String>),
}

impl UrlList {
    fn into_vec(self) -> Vec<String> {
        match self {
            UrlList::One(url) => vec![url],
            UrlList::Many(urls) => urls,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IceServerTokenResponse {
    #[serde(rename = "Urls")]
    urls: UrlList,
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "Password")]
    password: String,
}

/// Token provider backed by the trusted HTTP backend.
pub struct BackendTokenProvider {
    client: reqwest::Client,
    base_url: String,
}

impl BackendTokenProvider {
    /// Create a provider against the given backend base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| Error::CredentialUnavailable(format!("HTTP client build failed: {}", e)))?;
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
impl TokenProvider for BackendTokenProvider {
    async fn fetch_transport_credential(&self) -> Result<RelayCredential> {
        let url = self.endpoint("getIceServerToken");
        let response = self.client.post(&url).send().await.map_err(|e| {
            Error::CredentialUnavailable(format!("ice server token request failed: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(Error::CredentialUnavailable(format!(
                "ice server token endpoint returned {}",
                response.status()
            )));
        }

        let body: IceServerTokenResponse = response.json().await.map_err(|e| {
            Error::CredentialUnavailable(format!("ice server token response malformed: {}", e))
        })?;

        let credential = RelayCredential {
            urls: body.urls.into_vec(),
            username: body.username,
            password: body.password,
        };
        if credential.urls.is_empty() {
            return Err(Error::CredentialUnavailable(
                "ice server token response contained no relay URLs".to_string(),
            ));
        }

        debug!("fetched relay credential for {} URL(s)", credential.urls.len());
        Ok(credential)
    }

    async fn fetch_synthesis_credential(&self) -> Result<SpeechCredential> {
        let url = self.endpoint("getSpeechToken");
        let response = self.client.post(&url).send().await.map_err(|e| {
            Error::CredentialUnavailable(format!("speech token request failed: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(Error::CredentialUnavailable(format!(
                "speech token endpoint returned {}",
                response.status()
            )));
        }

        let token = response.text().await.map_err(|e| {
            Error::CredentialUnavailable(format!("speech token response unreadable: {}", e))
        })?;

        let token = token.trim().to_string();
        if token.is_empty() {
            return Err(Error::CredentialUnavailable(
                "speech token endpoint returned an empty token".to_string(),
            ));
        }

        debug!("fetched speech token ({} bytes)", token.len());
        Ok(SpeechCredential { token })
    }
}

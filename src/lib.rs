//! Real-time avatar conversation sessions over WebRTC
//!
//! This crate provides the session controller for an audio/video avatar
//! client: credential bootstrap, media transport, keepalive probing with
//! automatic recovery, dialogue exchange, and chroma-key matting of the
//! avatar's video frames.
//!
//! # Features
//!
//! - **Session lifecycle**: One transport/synthesis pair per session, built
//!   on short-lived backend credentials and replaced as a unit on recovery
//! - **Keepalive probing**: Silent SSML probes on a budgeted interval keep
//!   idle sessions warm without audible output
//! - **Automatic recovery**: Lost transports tear down, settle, and rebuild
//!   on fresh credentials with fixed-backoff retries
//! - **Dialogue integration**: Language detection, conversation exchange, and
//!   product offers through the trusted HTTP backend
//! - **Chroma-key matting**: Per-frame green-screen removal with spill
//!   correction, throttled to the display cadence
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Embedding host                                          │
//! │  ↓ start_session / speak / stop_session    ↑ events      │
//! │  AvatarSessionController                                 │
//! │  ├─ SessionContext (current pair + epoch)                │
//! │  ├─ KeepAliveSupervisor (silent probes, budget)          │
//! │  ├─ ReconnectCoordinator (teardown → settle → rebuild)   │
//! │  ├─ TransportSession (webrtc peer connection)            │
//! │  ├─ SynthesisConnector / SynthesisSession (injected)     │
//! │  └─ DialogueBackend (detect language, exchange turns)    │
//! │                                                          │
//! │  FrameMatteProcessor (repaint clock → throttle → matte)  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use avatar_rtc::AvatarSessionConfig;
//!
//! let config = AvatarSessionConfig::new("http://localhost:7071/api")
//!     .with_greeting("Welcome to the showroom.", "en-US")
//!     .with_keepalive(60_000, 20);
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.keepalive.max_attempts, 20);
//! ```
//!
//! ## Async Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use avatar_rtc::{
//!     AvatarSessionConfig, AvatarSessionController, BackendTokenProvider, HttpDialogueClient,
//!     SynthesisConnector,
//! };
//!
//! # async fn example(connector: Arc<dyn SynthesisConnector>) -> avatar_rtc::Result<()> {
//! let config = AvatarSessionConfig::new("http://localhost:7071/api");
//! let tokens = Arc::new(BackendTokenProvider::new(&config.backend_base_url)?);
//! let dialogue = Arc::new(HttpDialogueClient::new(&config.backend_base_url)?);
//!
//! let (controller, mut events) = AvatarSessionController::new(config, tokens, connector, dialogue)?;
//!
//! controller.start_session().await?;
//! controller.speak("What's on offer today?").await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//!
//! controller.stop_session().await;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

// Public modules
pub mod auth;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod matte;
pub mod session;
pub mod synthesis;
pub mod transport;

// Re-exports for public API
pub use auth::{BackendTokenProvider, RelayCredential, SpeechCredential, TokenProvider};
pub use config::{
    AvatarAppearance, AvatarSessionConfig, CropWindow, GreetingConfig, KeepAliveConfig,
    ReconnectConfig, VoiceConfig,
};
pub use dialogue::{
    ConversationTurn, DialogueBackend, DialogueReply, HttpDialogueClient, Product, Role,
};
pub use error::{Error, Result};
pub use matte::{
    FrameMatteProcessor, FrameThrottle, MatteConfig, MatteStats, RepaintClock, VideoFrame,
};
pub use session::{AvatarSessionController, SessionEvent};
pub use synthesis::{
    CancelReason, SsmlDocument, SynthesisConnector, SynthesisOutcome, SynthesisSession,
};
pub use transport::{TrackKind, TransportSession, TransportState};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
    }
}

//! Synthesis session boundary
//!
//! The remote voice/avatar service is reached through two seams: a
//! [`SynthesisConnector`] that binds a fresh session to a credential and an
//! avatar configuration, and the [`SynthesisSession`] handle itself, through
//! which markup is submitted and the avatar render is started. The wire
//! protocol behind these traits belongs to the embedder; this crate owns the
//! session semantics: markup assembly, outcome classification, and the
//! replace-as-a-unit discipline during recovery.

mod ssml;

pub use ssml::SsmlDocument;

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::SpeechCredential;
use crate::config::AvatarAppearance;
use crate::error::{Error, Result};
use crate::transport::TransportSession;

/// Why a synthesis request was canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Transport or service fault; the session pair is considered dead
    ServiceError,
    /// Request interrupted locally (session closed or superseded)
    Interrupted,
    /// Cancellation without a usable cause
    Unspecified,
}

impl CancelReason {
    /// Whether this cancellation indicates a dead transport/service,
    /// as opposed to a benign local interruption.
    pub fn is_service_error(&self) -> bool {
        matches!(self, CancelReason::ServiceError)
    }
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::ServiceError => write!(f, "service error"),
            CancelReason::Interrupted => write!(f, "interrupted"),
            CancelReason::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// Terminal result of a synthesis request or avatar start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    /// Request fully synthesized
    Completed {
        /// Service-assigned result identifier, useful for log correlation
        result_id: String,
    },
    /// Request canceled before completion
    Canceled {
        /// Classified cause
        reason: CancelReason,
        /// Service-provided detail, already human-readable
        detail: String,
    },
}

impl SynthesisOutcome {
    /// Whether the request fully completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, SynthesisOutcome::Completed { .. })
    }

    /// Convert into a `Result`, mapping cancellation to
    /// [`Error::SynthesisCanceled`].
    pub fn into_result(self) -> Result<String> {
        match self {
            SynthesisOutcome::Completed { result_id } => Ok(result_id),
            SynthesisOutcome::Canceled { reason, detail } => {
                Err(Error::SynthesisCanceled(format!("{}: {}", reason, detail)))
            }
        }
    }
}

/// One live handle to the remote synthesis/avatar service.
///
/// A session is bound to the credential and avatar configuration it was
/// created with; it is destroyed and replaced together with the transport it
/// renders over, never refreshed in place.
#[async_trait]
pub trait SynthesisSession: Send + Sync {
    /// Start the avatar render, negotiating media over the given transport.
    ///
    /// Asynchronous with no ordering guarantees relative to other session
    /// activity; completion drives the greeting, cancellation re-enables
    /// manual start.
    async fn start_avatar(&self, transport: Arc<TransportSession>) -> SynthesisOutcome;

    /// Submit a speech-markup document and wait for its terminal outcome.
    async fn speak(&self, document: &SsmlDocument) -> SynthesisOutcome;

    /// Close the session. Idempotent; outstanding requests resolve as
    /// canceled with a [`CancelReason::Interrupted`] cause.
    async fn close(&self);
}

/// Factory binding fresh synthesis sessions to a credential.
#[async_trait]
pub trait SynthesisConnector: Send + Sync {
    /// Create a new session for the given credential and avatar appearance.
    async fn connect(
        &self,
        credential: &SpeechCredential,
        appearance: &AvatarAppearance,
    ) -> Result<Arc<dyn SynthesisSession>>;
}

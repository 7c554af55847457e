//! Shared session state
//!
//! The transport and synthesis handles live and die together; `SessionContext`
//! is the single place that holds the current pair. A generation counter gives
//! each installed pair an identity, so callbacks wired against a torn-down
//! pair can recognize themselves as stale and drop out.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::synthesis::SynthesisSession;
use crate::transport::TransportSession;

/// The two live handles of an active session.
#[derive(Clone)]
pub struct SessionPair {
    /// Media transport for the avatar's audio and video
    pub transport: Arc<TransportSession>,
    /// Synthesis handle bound to the same credentials
    pub synthesis: Arc<dyn SynthesisSession>,
}

/// Owner of the current session pair and its generation counter.
pub struct SessionContext {
    /// Current pair, if a session is established
    pair: RwLock<Option<SessionPair>>,

    /// Generation counter; bumped on every teardown
    epoch: AtomicU64,

    /// Set for the duration of an explicit user teardown
    shutdown: AtomicBool,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            pair: RwLock::new(None),
            epoch: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Install a freshly built pair, replacing any existing one.
    ///
    /// The caller closes a replaced pair before installing its successor;
    /// installation itself never closes anything.
    pub async fn install_pair(&self, pair: SessionPair) {
        let mut guard = self.pair.write().await;
        if guard.is_some() {
            debug!("replacing existing session pair");
        }
        *guard = Some(pair);
    }

    /// Remove and return the current pair, leaving none installed.
    pub async fn take_pair(&self) -> Option<SessionPair> {
        self.pair.write().await.take()
    }

    /// Snapshot of the current pair.
    pub async fn pair(&self) -> Option<SessionPair> {
        self.pair.read().await.clone()
    }

    /// Snapshot of the current transport handle.
    pub async fn transport(&self) -> Option<Arc<TransportSession>> {
        self.pair.read().await.as_ref().map(|p| Arc::clone(&p.transport))
    }

    /// Current generation.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Advance the generation, invalidating callbacks wired to earlier pairs.
    pub fn bump_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether a captured generation still matches the current one.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch() == epoch
    }

    /// Mark the session as being torn down by the user.
    pub fn begin_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Clear the teardown mark, typically on a fresh session start.
    pub fn clear_shutdown(&self) {
        self.shutdown.store(false, Ordering::SeqCst);
    }

    /// Whether an explicit teardown is in progress.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::RelayCredential;
    use crate::synthesis::{SsmlDocument, SynthesisOutcome};
    use async_trait::async_trait;

    struct NullSynthesis;

    #[async_trait]
    impl SynthesisSession for NullSynthesis {
        async fn start_avatar(&self, _transport: Arc<TransportSession>) -> SynthesisOutcome {
            SynthesisOutcome::Completed {
                result_id: "null".to_string(),
            }
        }

        async fn speak(&self, _document: &SsmlDocument) -> SynthesisOutcome {
            SynthesisOutcome::Completed {
                result_id: "null".to_string(),
            }
        }

        async fn close(&self) {}
    }

    async fn test_pair() -> SessionPair {
        let relay = RelayCredential {
            urls: vec!["stun:stun.l.google.com:19302".to_string()],
            username: String::new(),
            password: String::new(),
        };
        SessionPair {
            transport: Arc::new(TransportSession::create(&relay).await.unwrap()),
            synthesis: Arc::new(NullSynthesis),
        }
    }

    #[tokio::test]
    async fn test_install_take_roundtrip() {
        let context = SessionContext::new();
        assert!(context.pair().await.is_none());

        context.install_pair(test_pair().await).await;
        assert!(context.pair().await.is_some());
        assert!(context.transport().await.is_some());

        assert!(context.take_pair().await.is_some());
        assert!(context.pair().await.is_none());
        assert!(context.take_pair().await.is_none());
    }

    #[tokio::test]
    async fn test_epoch_advances_on_bump() {
        let context = SessionContext::new();
        let initial = context.epoch();
        assert!(context.is_current(initial));

        let bumped = context.bump_epoch();
        assert_eq!(bumped, initial + 1);
        assert!(!context.is_current(initial));
        assert!(context.is_current(bumped));
    }

    #[test]
    fn test_shutdown_flag() {
        let context = SessionContext::new();
        assert!(!context.is_shutting_down());

        context.begin_shutdown();
        assert!(context.is_shutting_down());

        context.clear_shutdown();
        assert!(!context.is_shutting_down());
    }
}

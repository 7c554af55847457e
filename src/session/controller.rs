//! Host-facing session controller
//!
//! One controller per embedded avatar. The host drives it with
//! `start_session` / `speak` / `stop_session` and watches the event stream;
//! everything else (keepalive probing, recovery, greeting) runs on background
//! tasks the controller owns.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::TokenProvider;
use crate::config::{AvatarSessionConfig, KeepAliveConfig};
use crate::dialogue::{ConversationTurn, DialogueBackend, Product};
use crate::error::{Error, Result};
use crate::session::context::SessionContext;
use crate::session::keepalive::KeepAliveSupervisor;
use crate::session::reconnect::{ReconnectCoordinator, RecoveryReason};
use crate::synthesis::{SsmlDocument, SynthesisConnector, SynthesisOutcome};
use crate::transport::{TrackKind, TransportState};

/// Notifications surfaced to the embedding host.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Transport connection state changed
    TransportState(TransportState),
    /// A remote media track was mounted, possibly replacing an earlier one
    TrackMounted { kind: TrackKind, replaced: bool },
    /// Avatar start completed; the session is ready to speak
    AvatarStarted,
    /// Avatar start failed; manual session start may be retried
    StartFailed { detail: String },
    /// The assistant produced a reply
    AssistantReply { text: String },
    /// The assistant surfaced a product offer
    ProductOffer(Product),
}

/// Top-level controller for one avatar conversation session.
pub struct AvatarSessionController {
    config: AvatarSessionConfig,
    context: Arc<SessionContext>,
    keepalive: Arc<KeepAliveSupervisor>,
    coordinator: Arc<ReconnectCoordinator>,
    dialogue: Arc<dyn DialogueBackend>,

    /// Live keepalive parameters, shared with the recovery wiring
    keepalive_params: Arc<parking_lot::RwLock<KeepAliveConfig>>,

    /// Local copy of the conversation; the backend's version is authoritative
    log: parking_lot::Mutex<Vec<ConversationTurn>>,

    events: mpsc::UnboundedSender<SessionEvent>,

    /// Recovery receiver, parked here until the dispatcher task claims it
    recovery_rx: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<RecoveryReason>>>,
    dispatcher: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl AvatarSessionController {
    /// Build a controller and its event stream.
    ///
    /// The network-facing seams are injected: token provider, synthesis
    /// connector, dialogue backend. Validates the configuration up front.
    pub fn new(
        config: AvatarSessionConfig,
        tokens: Arc<dyn TokenProvider>,
        connector: Arc<dyn SynthesisConnector>,
        dialogue: Arc<dyn DialogueBackend>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>)> {
        config.validate()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (recovery_tx, recovery_rx) = mpsc::unbounded_channel();

        let context = Arc::new(SessionContext::new());
        let keepalive = Arc::new(KeepAliveSupervisor::new(
            Arc::clone(&context),
            config.voice.clone(),
            recovery_tx.clone(),
        ));
        let keepalive_params = Arc::new(parking_lot::RwLock::new(config.keepalive.clone()));

        let coordinator = Arc::new(ReconnectCoordinator::new(
            Arc::clone(&context),
            Arc::clone(&keepalive),
            Arc::clone(&keepalive_params),
            tokens,
            connector,
            config.clone(),
            events_tx.clone(),
            recovery_tx,
        ));

        let log = parking_lot::Mutex::new(vec![ConversationTurn::system(&config.system_prompt)]);

        Ok((
            Self {
                config,
                context,
                keepalive,
                coordinator,
                dialogue,
                keepalive_params,
                log,
                events: events_tx,
                recovery_rx: parking_lot::Mutex::new(Some(recovery_rx)),
                dispatcher: parking_lot::Mutex::new(None),
            },
            events_rx,
        ))
    }

    /// Start a session: fetch credentials, build the pair, begin avatar start.
    ///
    /// Returns once the pair is installed; avatar start completes in the
    /// background and reports through the event stream. Calling this while a
    /// session is already active is a no-op.
    pub async fn start_session(&self) -> Result<()> {
        if self.context.pair().await.is_some() {
            warn!("start_session called with an active session, ignoring");
            return Ok(());
        }

        self.context.clear_shutdown();
        self.ensure_recovery_dispatcher();

        // each session opens a fresh conversation
        *self.log.lock() = vec![ConversationTurn::system(&self.config.system_prompt)];

        info!("starting avatar session");
        self.coordinator.establish().await
    }

    /// Run one conversation turn end to end.
    ///
    /// Detects the utterance language, exchanges the conversation with the
    /// dialogue backend, surfaces the reply and any product offer, then
    /// synthesizes the reply in the detected language. Genuine user input
    /// also refreshes the keepalive budget.
    pub async fn speak(&self, text: &str) -> Result<()> {
        if self.context.pair().await.is_none() {
            return Err(Error::TransportError(
                "speak without an active session".to_string(),
            ));
        }

        self.keepalive.reset();

        let language = match self.dialogue.detect_language(text).await {
            Ok(tag) => tag,
            Err(e) => {
                warn!("language detection failed, dropping utterance: {}", e);
                return Err(e);
            }
        };

        let turns = {
            let mut log = self.log.lock();
            log.push(ConversationTurn::user(text));
            log.clone()
        };

        let reply = self.dialogue.exchange(&turns).await?;

        // the backend's log is authoritative
        *self.log.lock() = reply.messages.clone();

        let reply_text = match reply.latest_assistant_text() {
            Some(text) => text.to_string(),
            None => {
                warn!("dialogue reply did not end with an assistant turn");
                return Ok(());
            }
        };

        let _ = self.events.send(SessionEvent::AssistantReply {
            text: reply_text.clone(),
        });
        if let Some(product) = reply.featured_product() {
            let _ = self.events.send(SessionEvent::ProductOffer(product.clone()));
        }

        let voice = self.config.voice_for(&language);
        let document = SsmlDocument::localized_utterance(&voice, &language, &reply_text);

        // recovery may have replaced the pair during the exchange; bind the
        // live handle only now
        let pair = self.context.pair().await.ok_or_else(|| {
            Error::TransportError("session closed during the turn".to_string())
        })?;

        match pair.synthesis.speak(&document).await {
            SynthesisOutcome::Completed { result_id } => {
                debug!("utterance synthesized (result={})", result_id);
                Ok(())
            }
            SynthesisOutcome::Canceled { reason, detail } => {
                // reply-path cancellations are reported, never a recovery trigger
                warn!("utterance canceled ({}): {}", reason, detail);
                Err(Error::SynthesisCanceled(format!("{}: {}", reason, detail)))
            }
        }
    }

    /// Tear the session down: disarm keepalive, close synthesis and
    /// transport, and block any pending recovery. Idempotent.
    pub async fn stop_session(&self) {
        info!("stopping avatar session");
        self.context.begin_shutdown();
        self.coordinator.teardown_pair().await;
    }

    /// Whether a session pair is currently installed.
    pub async fn is_active(&self) -> bool {
        self.context.pair().await.is_some()
    }

    /// Snapshot of the conversation log, system prompt first.
    pub fn conversation(&self) -> Vec<ConversationTurn> {
        self.log.lock().clone()
    }

    /// Update the keepalive parameters.
    ///
    /// Applies live: if the probe timer is armed it restarts with the new
    /// parameters and a zeroed attempt count.
    pub fn set_keepalive_params(&self, interval_ms: u64, max_attempts: u32) -> Result<()> {
        if interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "keepalive interval must be positive".to_string(),
            ));
        }

        {
            let mut params = self.keepalive_params.write();
            params.interval_ms = interval_ms;
            params.max_attempts = max_attempts;
        }

        if self.keepalive.is_armed() {
            self.keepalive.start(interval_ms, max_attempts);
            debug!(
                "keepalive restarted with interval={}ms, budget={}",
                interval_ms, max_attempts
            );
        }

        Ok(())
    }

    /// Route recovery requests from observers into the coordinator. Spawned
    /// once, on the first session start, and lives for the controller's
    /// lifetime.
    fn ensure_recovery_dispatcher(&self) {
        let mut slot = self.recovery_rx.lock();
        if let Some(mut recovery_rx) = slot.take() {
            let coordinator = Arc::clone(&self.coordinator);
            let handle = tokio::spawn(async move {
                while let Some(reason) = recovery_rx.recv().await {
                    coordinator.request(reason);
                }
            });
            *self.dispatcher.lock() = Some(handle);
        }
    }
}

impl Drop for AvatarSessionController {
    fn drop(&mut self) {
        if let Some(handle) = self.dispatcher.lock().take() {
            handle.abort();
        }
        self.keepalive.stop();
    }
}

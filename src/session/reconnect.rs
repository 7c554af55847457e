//! Session pair teardown and rebuild
//!
//! Recovery replaces the whole pair rather than renegotiating in place: stop
//! probing, close what is left, wait for the service side to notice, then
//! build a fresh transport and synthesis handle on fresh credentials. Failed
//! attempts are retried on a fixed backoff until a rebuild sticks or the user
//! tears the session down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::auth::TokenProvider;
use crate::config::{AvatarSessionConfig, KeepAliveConfig};
use crate::error::Result;
use crate::session::context::{SessionContext, SessionPair};
use crate::session::controller::SessionEvent;
use crate::session::keepalive::KeepAliveSupervisor;
use crate::synthesis::{SsmlDocument, SynthesisConnector, SynthesisOutcome, SynthesisSession};
use crate::transport::TransportSession;

/// Why a recovery pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryReason {
    /// Transport left its stable state
    TransportLost,
    /// A keepalive probe was canceled with a service-error cause
    ProbeServiceError,
    /// A previous rebuild attempt failed and its backoff elapsed
    RetryBackoff,
}

impl std::fmt::Display for RecoveryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecoveryReason::TransportLost => "transport lost",
            RecoveryReason::ProbeServiceError => "probe service error",
            RecoveryReason::RetryBackoff => "retry after failed attempt",
        };
        write!(f, "{}", s)
    }
}

/// Coordinator for building and rebuilding the session pair.
///
/// [`establish`](Self::establish) is also the initial-start path; recovery is
/// the same build preceded by teardown and a settle delay.
pub struct ReconnectCoordinator {
    context: Arc<SessionContext>,
    keepalive: Arc<KeepAliveSupervisor>,

    /// Live keepalive parameters, shared with the host-facing setter
    keepalive_params: Arc<parking_lot::RwLock<KeepAliveConfig>>,

    tokens: Arc<dyn TokenProvider>,
    connector: Arc<dyn SynthesisConnector>,
    config: AvatarSessionConfig,

    events: mpsc::UnboundedSender<SessionEvent>,

    /// Recovery requests from observers wired onto rebuilt transports
    recovery_tx: mpsc::UnboundedSender<RecoveryReason>,

    /// At most one recovery attempt runs at a time
    in_flight: AtomicBool,
}

impl ReconnectCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: Arc<SessionContext>,
        keepalive: Arc<KeepAliveSupervisor>,
        keepalive_params: Arc<parking_lot::RwLock<KeepAliveConfig>>,
        tokens: Arc<dyn TokenProvider>,
        connector: Arc<dyn SynthesisConnector>,
        config: AvatarSessionConfig,
        events: mpsc::UnboundedSender<SessionEvent>,
        recovery_tx: mpsc::UnboundedSender<RecoveryReason>,
    ) -> Self {
        Self {
            context,
            keepalive,
            keepalive_params,
            tokens,
            connector,
            config,
            events,
            recovery_tx,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Request a recovery pass. Safe to call from any observer at any time:
    /// requests during shutdown or while an attempt is already in flight are
    /// dropped.
    pub fn request(self: &Arc<Self>, reason: RecoveryReason) {
        if self.context.is_shutting_down() {
            debug!("recovery requested ({}) during shutdown, ignoring", reason);
            return;
        }
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("recovery already in flight, ignoring request ({})", reason);
            return;
        }

        info!("session recovery started: {}", reason);

        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            coordinator.run_recovery().await;
        });
    }

    async fn run_recovery(self: Arc<Self>) {
        self.teardown_pair().await;

        tokio::time::sleep(Duration::from_millis(self.config.reconnect.settle_delay_ms)).await;

        if self.context.is_shutting_down() {
            debug!("shutdown during settle delay, abandoning recovery");
            self.in_flight.store(false, Ordering::SeqCst);
            return;
        }

        match self.establish().await {
            Ok(()) => {
                info!("session recovery rebuilt the pair");
                self.in_flight.store(false, Ordering::SeqCst);
            }
            Err(e) => {
                let backoff = Duration::from_millis(self.config.reconnect.retry_backoff_ms);
                warn!("session recovery failed: {}; retrying in {:?}", e, backoff);
                self.in_flight.store(false, Ordering::SeqCst);

                // a pair rebuilt while the backoff runs supersedes the retry
                let epoch = self.context.epoch();
                let coordinator = Arc::clone(&self);
                tokio::spawn(async move {
                    tokio::time::sleep(backoff).await;
                    if !coordinator.context.is_current(epoch)
                        || coordinator.context.pair().await.is_some()
                    {
                        debug!("scheduled retry superseded, dropping");
                        return;
                    }
                    coordinator.request(RecoveryReason::RetryBackoff);
                });
            }
        }
    }

    /// Stop probing, invalidate outstanding callbacks, and close the pair.
    pub(crate) async fn teardown_pair(&self) {
        self.keepalive.stop();
        let epoch = self.context.bump_epoch();

        if let Some(pair) = self.context.take_pair().await {
            if let Some(uptime) = pair.transport.uptime().await {
                debug!(
                    "tearing down transport {} after {:?} connected",
                    pair.transport.connection_id(),
                    uptime
                );
            }

            pair.synthesis.close().await;
            if let Err(e) = pair.transport.close().await {
                warn!("transport close during teardown failed: {}", e);
            }
        }

        debug!("session pair torn down (epoch now {})", epoch);
    }

    /// Build a fresh pair on fresh credentials and install it.
    ///
    /// Used for both initial session start and recovery; avatar start runs in
    /// the background and reports through the event stream.
    pub(crate) async fn establish(self: &Arc<Self>) -> Result<()> {
        let speech = self.tokens.fetch_synthesis_credential().await?;
        let relay = self.tokens.fetch_transport_credential().await?;

        let synthesis = self.connector.connect(&speech, &self.config.avatar).await?;
        let transport = match TransportSession::create(&relay).await {
            Ok(transport) => Arc::new(transport),
            Err(e) => {
                // not installed yet, so no later teardown can reach it
                synthesis.close().await;
                return Err(e);
            }
        };

        self.wire_transport(&transport).await;

        self.context
            .install_pair(SessionPair {
                transport: Arc::clone(&transport),
                synthesis: Arc::clone(&synthesis),
            })
            .await;

        self.spawn_avatar_start(synthesis, transport);

        Ok(())
    }

    /// Wire state and track observers onto a freshly built transport.
    ///
    /// Observers capture the current epoch; once the pair is torn down they
    /// recognize themselves as stale and drop out.
    async fn wire_transport(&self, transport: &Arc<TransportSession>) {
        let epoch = self.context.epoch();

        let context = Arc::clone(&self.context);
        let events = self.events.clone();
        let recovery_tx = self.recovery_tx.clone();
        let keepalive = Arc::clone(&self.keepalive);
        let keepalive_params = Arc::clone(&self.keepalive_params);

        transport
            .set_state_observer(move |state| {
                if !context.is_current(epoch) {
                    debug!("state change {} from a replaced transport, ignoring", state);
                    return;
                }

                let _ = events.send(SessionEvent::TransportState(state));

                if state.is_stable() {
                    let params = keepalive_params.read().clone();
                    keepalive.start(params.interval_ms, params.max_attempts);
                } else if state.needs_recovery() {
                    let _ = recovery_tx.send(RecoveryReason::TransportLost);
                }
            })
            .await;

        let context = Arc::clone(&self.context);
        let events = self.events.clone();

        transport
            .set_track_observer(move |kind, _track, replaced| {
                if !context.is_current(epoch) {
                    return;
                }
                let _ = events.send(SessionEvent::TrackMounted { kind, replaced });
            })
            .await;
    }

    /// Start the avatar in the background; completion speaks the greeting,
    /// failure tears the dead pair back down and re-enables manual session
    /// start through the event stream.
    fn spawn_avatar_start(
        self: &Arc<Self>,
        synthesis: Arc<dyn SynthesisSession>,
        transport: Arc<TransportSession>,
    ) {
        let coordinator = Arc::clone(self);
        let events = self.events.clone();
        let config = self.config.clone();
        let epoch = self.context.epoch();

        tokio::spawn(async move {
            let outcome = synthesis.start_avatar(transport).await;

            if !coordinator.context.is_current(epoch) {
                debug!("avatar start settled for a replaced session, ignoring");
                return;
            }

            match outcome {
                SynthesisOutcome::Completed { result_id } => {
                    info!("avatar started (result={})", result_id);
                    let _ = events.send(SessionEvent::AvatarStarted);

                    let voice = config.voice_for(&config.greeting.language);
                    let document = SsmlDocument::localized_utterance(
                        &voice,
                        &config.greeting.language,
                        &config.greeting.text,
                    );
                    match synthesis.speak(&document).await {
                        SynthesisOutcome::Completed { .. } => debug!("greeting spoken"),
                        SynthesisOutcome::Canceled { reason, detail } => {
                            warn!("greeting canceled ({}): {}", reason, detail)
                        }
                    }
                }
                SynthesisOutcome::Canceled { reason, detail } => {
                    warn!("avatar start canceled ({}): {}", reason, detail);
                    // cleared before the event goes out, so a restart prompted
                    // by it finds the controller inactive
                    coordinator.teardown_pair().await;
                    let _ = events.send(SessionEvent::StartFailed {
                        detail: format!("{}: {}", reason, detail),
                    });
                }
            }
        });
    }
}

//! Periodic silent-probe supervisor
//!
//! The synthesis service drops idle sessions; a minimal silence document sent
//! on an interval keeps the avatar warm without audible output. Probing runs
//! on a budget: once `max_attempts` probes have gone out with no genuine user
//! activity, the timer disarms and the session is left alive but unprobed.
//! User activity resets the budget.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::VoiceConfig;
use crate::session::context::SessionContext;
use crate::session::reconnect::RecoveryReason;
use crate::synthesis::{SsmlDocument, SynthesisOutcome};

/// Keepalive timer and probe budget for the active session pair.
pub struct KeepAliveSupervisor {
    context: Arc<SessionContext>,

    /// Voice the silence probes are issued under
    voice: VoiceConfig,

    /// Probes sent since the last reset
    attempts_used: Arc<AtomicU32>,

    /// Armed timer task; at most one at a time
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,

    /// Handoff to the reconnect coordinator
    recovery_tx: mpsc::UnboundedSender<RecoveryReason>,
}

impl KeepAliveSupervisor {
    pub fn new(
        context: Arc<SessionContext>,
        voice: VoiceConfig,
        recovery_tx: mpsc::UnboundedSender<RecoveryReason>,
    ) -> Self {
        Self {
            context,
            voice,
            attempts_used: Arc::new(AtomicU32::new(0)),
            task: parking_lot::Mutex::new(None),
            recovery_tx,
        }
    }

    /// Arm the probe timer, replacing any existing one.
    ///
    /// The first probe fires one full interval after arming. The attempt
    /// budget starts from zero.
    pub fn start(&self, interval_ms: u64, max_attempts: u32) {
        self.stop();
        self.attempts_used.store(0, Ordering::SeqCst);

        let context = Arc::clone(&self.context);
        let voice = self.voice.clone();
        let attempts = Arc::clone(&self.attempts_used);
        let recovery_tx = self.recovery_tx.clone();

        let handle = tokio::spawn(async move {
            probe_loop(context, voice, attempts, recovery_tx, interval_ms, max_attempts).await;
        });

        *self.task.lock() = Some(handle);

        debug!(
            "keepalive armed: interval={}ms, budget={}",
            interval_ms, max_attempts
        );
    }

    /// Zero the attempt budget, leaving the timer as it is.
    ///
    /// Called on genuine user activity; an exhausted timer stays exhausted
    /// until the next [`start`](Self::start).
    pub fn reset(&self) {
        self.attempts_used.store(0, Ordering::SeqCst);
    }

    /// Disarm the probe timer. Idempotent.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            debug!("keepalive disarmed");
        }
    }

    /// Whether a probe timer is currently armed and running.
    pub fn is_armed(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Probes sent since the last reset.
    pub fn attempts_used(&self) -> u32 {
        self.attempts_used.load(Ordering::SeqCst)
    }
}

/// The timer body. Probes are awaited inline; ticks that would land while a
/// probe is still pending are skipped rather than queued.
async fn probe_loop(
    context: Arc<SessionContext>,
    voice: VoiceConfig,
    attempts: Arc<AtomicU32>,
    recovery_tx: mpsc::UnboundedSender<RecoveryReason>,
    interval_ms: u64,
    max_attempts: u32,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // the interval's first tick completes immediately; consume it so probing
    // starts one full interval after arming
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let pair = match context.pair().await {
            Some(pair) => pair,
            None => {
                debug!("keepalive: no active session pair, stopping");
                return;
            }
        };

        if !pair.transport.is_connected().await {
            let state = pair.transport.state().await;
            warn!(
                "keepalive: transport {} instead of connected, requesting recovery",
                state
            );
            let _ = recovery_tx.send(RecoveryReason::TransportLost);
            return;
        }

        let used = attempts.load(Ordering::SeqCst);
        if used >= max_attempts {
            info!(
                "keepalive: probe budget exhausted after {} attempt(s), timer disarmed",
                used
            );
            return;
        }
        attempts.fetch_add(1, Ordering::SeqCst);

        let probe = SsmlDocument::silence_probe(&voice);
        match pair.synthesis.speak(&probe).await {
            SynthesisOutcome::Completed { .. } => {
                debug!("keepalive probe {} completed", used + 1);
            }
            SynthesisOutcome::Canceled { reason, detail } => {
                if reason.is_service_error() {
                    warn!("keepalive probe hit a service error: {}", detail);
                    let _ = recovery_tx.send(RecoveryReason::ProbeServiceError);
                    return;
                }
                warn!("keepalive probe canceled ({}): {}", reason, detail);
            }
        }
    }
}

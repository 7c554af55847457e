//! Elapsed-time gate for repaint-driven processing
//!
//! The repaint clock fires at display rate; pixel work only needs to run a
//! few dozen times per second. The gate is a pure function of timestamps so
//! it can be exercised without any real clock.

/// Gate that admits at most one frame per `min_interval_ms` elapsed.
///
/// The interval check is strict: a frame exactly `min_interval_ms` after the
/// last processed one is still skipped. The reference point only advances
/// when a frame is admitted, so skipped frames never delay the next
/// admission.
#[derive(Debug, Clone, Copy)]
pub struct FrameThrottle {
    min_interval_ms: u64,
    last_processed_ms: u64,
}

impl FrameThrottle {
    /// Create a gate admitting at most one frame per `min_interval_ms`.
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval_ms,
            last_processed_ms: 0,
        }
    }

    /// Decide whether the frame at `now_ms` should be processed, advancing
    /// the reference point when it is.
    pub fn should_process(&mut self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_processed_ms) > self.min_interval_ms {
            self.last_processed_ms = now_ms;
            true
        } else {
            false
        }
    }

    /// The configured minimum interval.
    pub fn min_interval_ms(&self) -> u64 {
        self.min_interval_ms
    }
}

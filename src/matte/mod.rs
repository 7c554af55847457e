//! Frame matting pipeline
//!
//! A repaint-clock-driven loop pulls the latest decoded frame, keys the
//! chroma background out in place, and hands the result to a render surface.
//! The loop self-reschedules on every clock tick; actual pixel work is gated
//! by [`FrameThrottle`] so it runs at most once per configured interval no
//! matter how fast the display repaints. Frames that arrive before the
//! stream has real dimensions are dropped before the pixel pass.

mod kernel;
mod throttle;

pub use kernel::{matte_frame, rgba_buffer_len, RGBA_BYTES_PER_PIXEL};
pub use throttle::FrameThrottle;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// One decoded RGBA frame.
///
/// Transient: produced by the video decoder, matted in place, presented,
/// then dropped. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// RGBA samples, row-major, 4 bytes per pixel
    pub data: Vec<u8>,
    /// Capture timestamp in milliseconds
    pub timestamp_ms: u64,
}

impl VideoFrame {
    /// Create a frame, validating the buffer length against the dimensions.
    pub fn rgba(width: u32, height: u32, data: Vec<u8>, timestamp_ms: u64) -> Result<Self> {
        let expected = rgba_buffer_len(width, height);
        if data.len() != expected {
            return Err(Error::InvalidFrame(format!(
                "RGBA buffer is {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            timestamp_ms,
        })
    }
}

/// Matting pipeline configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MatteConfig {
    /// Minimum elapsed milliseconds between processed frames
    pub min_process_interval_ms: u64,
}

impl Default for MatteConfig {
    fn default() -> Self {
        Self {
            min_process_interval_ms: 30,
        }
    }
}

/// Source of repaint ticks, reported as elapsed milliseconds.
///
/// Production uses [`IntervalRepaintClock`]; tests script the timestamps.
/// Returning `None` ends the matting loop.
#[async_trait]
pub trait RepaintClock: Send {
    /// Wait for the next repaint tick.
    async fn next_tick(&mut self) -> Option<u64>;
}

/// Supplier of the most recently decoded frame.
///
/// Only consulted for ticks that pass the throttle, so skipped ticks cost
/// nothing.
pub trait FrameSource: Send {
    /// The latest frame, if any has been decoded yet.
    fn latest_frame(&mut self) -> Option<VideoFrame>;
}

/// Destination for matted frames.
pub trait RenderSurface: Send {
    /// Present one matted frame.
    fn present(&mut self, frame: VideoFrame);
}

/// Repaint clock backed by a tokio interval.
pub struct IntervalRepaintClock {
    interval: tokio::time::Interval,
    started: tokio::time::Instant,
}

impl IntervalRepaintClock {
    /// Tick at the given period (a display-like cadence, e.g. 16 ms).
    pub fn new(period_ms: u64) -> Self {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(period_ms.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        Self {
            interval,
            started: tokio::time::Instant::now(),
        }
    }
}

#[async_trait]
impl RepaintClock for IntervalRepaintClock {
    async fn next_tick(&mut self) -> Option<u64> {
        let at = self.interval.tick().await;
        Some(at.duration_since(self.started).as_millis() as u64)
    }
}

/// Create a latest-frame channel between the decoder side and the matting
/// loop. The sink keeps only the newest frame; the source clones it on
/// demand.
pub fn latest_frame_channel() -> (FrameSink, LatestFrameSource) {
    let (tx, rx) = watch::channel(None);
    (FrameSink { tx }, LatestFrameSource { rx })
}

/// Producer half of the latest-frame channel.
#[derive(Clone)]
pub struct FrameSink {
    tx: watch::Sender<Option<VideoFrame>>,
}

impl FrameSink {
    /// Publish a newly decoded frame, replacing any unconsumed one.
    pub fn publish(&self, frame: VideoFrame) {
        let _ = self.tx.send(Some(frame));
    }
}

/// Consumer half of the latest-frame channel.
pub struct LatestFrameSource {
    rx: watch::Receiver<Option<VideoFrame>>,
}

impl FrameSource for LatestFrameSource {
    fn latest_frame(&mut self) -> Option<VideoFrame> {
        self.rx.borrow().clone()
    }
}

/// Counters reported when the matting loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatteStats {
    /// Frames matted and presented
    pub processed: u64,
    /// Ticks skipped by the throttle
    pub skipped_throttle: u64,
    /// Ticks with no decoded frame or degenerate dimensions
    pub skipped_empty: u64,
}

/// Repaint-driven matting loop.
pub struct FrameMatteProcessor {
    throttle: FrameThrottle,
}

impl FrameMatteProcessor {
    /// Create a processor with the given throttle configuration.
    pub fn new(config: MatteConfig) -> Self {
        Self {
            throttle: FrameThrottle::new(config.min_process_interval_ms),
        }
    }

    /// Run until the clock ends, matting the latest frame at most once per
    /// throttle interval and presenting it to the surface.
    pub async fn run<C, S, R>(mut self, clock: &mut C, source: &mut S, surface: &mut R) -> MatteStats
    where
        C: RepaintClock,
        S: FrameSource,
        R: RenderSurface,
    {
        let mut stats = MatteStats::default();

        while let Some(now_ms) = clock.next_tick().await {
            if !self.throttle.should_process(now_ms) {
                stats.skipped_throttle += 1;
                continue;
            }

            let Some(mut frame) = source.latest_frame() else {
                stats.skipped_empty += 1;
                continue;
            };

            // Streams report zero dimensions until the first real frame
            if frame.width == 0 {
                stats.skipped_empty += 1;
                continue;
            }

            match matte_frame(&mut frame.data, frame.width, frame.height) {
                Ok(()) => {
                    surface.present(frame);
                    stats.processed += 1;
                }
                Err(e) => {
                    warn!("dropping malformed frame: {}", e);
                    stats.skipped_empty += 1;
                }
            }
        }

        debug!(
            "matte loop finished: {} processed, {} throttled, {} empty",
            stats.processed, stats.skipped_throttle, stats.skipped_empty
        );
        stats
    }
}

//! Playback time to frame index conversion, plus the fetch throttle used
//! by the on-demand metadata strategy.

use crate::types::FrameIndex;

/// Frame rate assumed when video metadata does not provide a usable one.
pub const DEFAULT_FPS: f64 = 30.0;

/// Default spacing between on-demand metadata fetches, in frames.
pub const DEFAULT_FETCH_INTERVAL: u64 = 5;

/// Frame shown at `seconds` into playback: `floor(seconds * fps)`.
///
/// Negative, NaN, or otherwise unusable products clamp to frame 0.
pub fn frame_at(seconds: f64, fps: f64) -> FrameIndex {
    let product = (seconds * fps).floor();
    if product.is_finite() && product > 0.0 {
        product as FrameIndex
    } else {
        0
    }
}

/// The metadata frame rate if it is positive and finite, otherwise
/// [`DEFAULT_FPS`].
pub fn effective_fps(fps: Option<f64>) -> f64 {
    match fps {
        Some(f) if f.is_finite() && f > 0.0 => f,
        _ => DEFAULT_FPS,
    }
}

/// Decides which frames trigger an on-demand metadata query.
///
/// A frame triggers a query when it differs from the previously observed
/// frame, is greater than zero, and is a multiple of the interval.
#[derive(Debug, Clone)]
pub struct FetchThrottle {
    interval: u64,
    last_frame: Option<FrameIndex>,
}

impl FetchThrottle {
    /// An interval of zero is treated as one (query on every frame change).
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            last_frame: None,
        }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Observe the frame computed for this tick.
    pub fn should_fetch(&mut self, frame: FrameIndex) -> bool {
        let changed = self.last_frame != Some(frame);
        self.last_frame = Some(frame);
        changed && frame > 0 && frame % self.interval == 0
    }

    /// Forget the last observed frame (new video, new camera).
    pub fn reset(&mut self) {
        self.last_frame = None;
    }
}

impl Default for FetchThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_INTERVAL)
    }
}

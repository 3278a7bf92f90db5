//! Media player seam.
//!
//! Decoding and presentation belong to the host's media pipeline. The
//! engine only needs the player's clock, its play state and the intrinsic
//! size of the loaded picture.

use tokio::time::Instant;

use roadwatch_core::geometry::Size;
use roadwatch_core::video_info::VideoInfo;

use crate::source::VideoSource;

pub trait Player: Send {
    /// Assign `source` as the media to play. Resets time to zero.
    fn load(&mut self, source: &VideoSource);

    /// Detach the current media, if any.
    fn unload(&mut self);

    /// Metadata for the loaded media, when the backend provides it.
    fn apply_video_info(&mut self, _info: &VideoInfo) {}

    fn play(&mut self);

    fn pause(&mut self);

    /// `true` when not advancing, including after reaching the end.
    fn is_paused(&self) -> bool;

    fn seek(&mut self, seconds: f64);

    fn set_playback_rate(&mut self, rate: f64);

    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    /// Intrinsic picture size, once known.
    fn intrinsic_size(&self) -> Option<Size>;
}

/// Clock-driven player used where no real media pipeline exists.
///
/// Time advances with the tokio clock at the playback rate while playing.
/// The intrinsic size comes from [`SimulatedPlayer::with_intrinsic_size`]
/// or from the `resolution` of the applied video info.
#[derive(Debug, Clone)]
pub struct SimulatedPlayer {
    loaded: bool,
    declared_size: Option<Size>,
    duration: Option<f64>,
    rate: f64,
    position: f64,
    playing_since: Option<Instant>,
}

impl SimulatedPlayer {
    pub fn new() -> Self {
        Self {
            loaded: false,
            declared_size: None,
            duration: None,
            rate: 1.0,
            position: 0.0,
            playing_since: None,
        }
    }

    pub fn with_intrinsic_size(mut self, size: Size) -> Self {
        self.declared_size = Some(size);
        self
    }

    /// Stop by itself after `seconds` of media.
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    fn raw_position(&self) -> f64 {
        match self.playing_since {
            Some(since) => self.position + since.elapsed().as_secs_f64() * self.rate,
            None => self.position,
        }
    }

    fn clamp(&self, seconds: f64) -> f64 {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        match self.duration {
            Some(d) => seconds.min(d),
            None => seconds,
        }
    }

    /// Fold elapsed time into `position`.
    fn settle(&mut self) {
        self.position = self.clamp(self.raw_position());
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
        }
    }

    fn at_end(&self) -> bool {
        self.duration.is_some_and(|d| self.raw_position() >= d)
    }
}

impl Default for SimulatedPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Player for SimulatedPlayer {
    fn load(&mut self, source: &VideoSource) {
        tracing::debug!(url = %source.url(), size = source.len(), "Player source assigned");
        self.loaded = true;
        self.position = 0.0;
        self.playing_since = None;
    }

    fn unload(&mut self) {
        self.loaded = false;
        self.position = 0.0;
        self.playing_since = None;
    }

    fn apply_video_info(&mut self, info: &VideoInfo) {
        if self.declared_size.is_none() {
            self.declared_size = info.dimensions();
        }
    }

    fn play(&mut self) {
        if !self.loaded || self.playing_since.is_some() {
            return;
        }
        if self.at_end() {
            self.position = 0.0;
        }
        self.playing_since = Some(Instant::now());
    }

    fn pause(&mut self) {
        self.settle();
        self.playing_since = None;
    }

    fn is_paused(&self) -> bool {
        self.playing_since.is_none() || self.at_end()
    }

    fn seek(&mut self, seconds: f64) {
        self.settle();
        self.position = self.clamp(seconds);
    }

    fn set_playback_rate(&mut self, rate: f64) {
        if !(rate.is_finite() && rate > 0.0) {
            tracing::warn!(rate, "Ignoring invalid playback rate");
            return;
        }
        self.settle();
        self.rate = rate;
    }

    fn current_time(&self) -> f64 {
        self.clamp(self.raw_position())
    }

    fn intrinsic_size(&self) -> Option<Size> {
        if self.loaded {
            self.declared_size
        } else {
            None
        }
    }
}

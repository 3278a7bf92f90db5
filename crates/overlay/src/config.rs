use std::str::FromStr;
use std::time::Duration;

use roadwatch_core::error::CoreError;
use roadwatch_core::frame_cache::DEFAULT_CACHE_CAPACITY;
use roadwatch_core::frame_clock::DEFAULT_FETCH_INTERVAL;

/// Default display refresh rate driving [`crate::scheduler::RefreshTicker`].
pub const DEFAULT_REFRESH_HZ: u32 = 60;

/// Default time allowed for the live stop-stream notification.
pub const DEFAULT_STOP_STREAM_GRACE_MS: u64 = 2000;

/// How detections are obtained for the frame being shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MetadataStrategy {
    /// Fetch every detection of the camera once, then index by frame.
    #[default]
    Eager,
    /// Query single frames on demand every `fetch_interval` frames and
    /// keep up to `cache_capacity` of them.
    Lazy {
        fetch_interval: u64,
        cache_capacity: usize,
    },
}

impl MetadataStrategy {
    /// Lazy strategy with the default interval and cache size.
    pub fn lazy() -> Self {
        MetadataStrategy::Lazy {
            fetch_interval: DEFAULT_FETCH_INTERVAL,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MetadataStrategy::Eager => "eager",
            MetadataStrategy::Lazy { .. } => "lazy",
        }
    }
}

/// Overlay engine settings.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub strategy: MetadataStrategy,
    /// Paint-cycle rate used when no host vsync source is supplied.
    pub display_refresh_hz: u32,
    /// Upper bound on the fire-and-forget stop-stream request.
    pub stop_stream_grace: Duration,
    /// Initial state of the overlay toggle.
    pub overlay_enabled: bool,
}

impl OverlayConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default |
    /// |------------------------|---------|
    /// | `METADATA_STRATEGY`    | `eager` |
    /// | `LAZY_FETCH_INTERVAL`  | `5`     |
    /// | `FRAME_CACHE_CAPACITY` | `100`   |
    /// | `DISPLAY_REFRESH_HZ`   | `60`    |
    /// | `STOP_STREAM_GRACE_MS` | `2000`  |
    /// | `OVERLAY_ENABLED`      | `true`  |
    pub fn from_env() -> Result<Self, CoreError> {
        let fetch_interval: u64 = env_or("LAZY_FETCH_INTERVAL", DEFAULT_FETCH_INTERVAL)?;
        let cache_capacity: usize = env_or("FRAME_CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY)?;

        let strategy = match std::env::var("METADATA_STRATEGY")
            .unwrap_or_else(|_| "eager".into())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "eager" => MetadataStrategy::Eager,
            "lazy" => MetadataStrategy::Lazy {
                fetch_interval,
                cache_capacity,
            },
            other => {
                return Err(CoreError::Config(format!(
                    "METADATA_STRATEGY must be 'eager' or 'lazy', got '{other}'"
                )))
            }
        };

        let display_refresh_hz: u32 = env_or("DISPLAY_REFRESH_HZ", DEFAULT_REFRESH_HZ)?;
        if display_refresh_hz == 0 {
            return Err(CoreError::Config("DISPLAY_REFRESH_HZ must be greater than 0".into()));
        }

        let grace_ms: u64 = env_or("STOP_STREAM_GRACE_MS", DEFAULT_STOP_STREAM_GRACE_MS)?;
        let overlay_enabled: bool = env_or("OVERLAY_ENABLED", true)?;

        Ok(Self {
            strategy,
            display_refresh_hz,
            stop_stream_grace: Duration::from_millis(grace_ms),
            overlay_enabled,
        })
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            strategy: MetadataStrategy::Eager,
            display_refresh_hz: DEFAULT_REFRESH_HZ,
            stop_stream_grace: Duration::from_millis(DEFAULT_STOP_STREAM_GRACE_MS),
            overlay_enabled: true,
        }
    }
}

/// Parse `name` from the environment, falling back to `default` when unset.
fn env_or<T: FromStr>(name: &str, default: T) -> Result<T, CoreError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::Config(format!("{name} has an invalid value '{raw}'"))),
        Err(_) => Ok(default),
    }
}

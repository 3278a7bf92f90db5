//! Camera/video metadata records returned by the backend.

use serde::{Deserialize, Serialize};

use crate::frame_clock::effective_fps;
use crate::geometry::Size;
use crate::types::{CameraId, Timestamp};

/// Camera type for uploaded recordings.
pub const CAMERA_TYPE_LOCAL: &str = "local";

/// Camera type for live (YouTube-backed) feeds.
pub const CAMERA_TYPE_YOUTUBE: &str = "youtube";

/// All recognised camera types.
pub const VALID_CAMERA_TYPES: &[&str] = &[CAMERA_TYPE_LOCAL, CAMERA_TYPE_YOUTUBE];

/// Returns `true` if `s` is a recognised camera type.
pub fn is_valid_camera_type(s: &str) -> bool {
    VALID_CAMERA_TYPES.contains(&s)
}

/// Metadata for one camera or uploaded video (`GET cameras/{id}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: CameraId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fps: Option<f64>,
    /// Declared resolution, e.g. `"1920x1080"`.
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

impl VideoInfo {
    /// Frame rate used by the frame clock.
    pub fn effective_fps(&self) -> f64 {
        effective_fps(self.fps)
    }

    /// Dimensions parsed from [`resolution`](Self::resolution).
    pub fn dimensions(&self) -> Option<Size> {
        self.resolution.as_deref().and_then(parse_resolution)
    }
}

/// Parse `"<width>x<height>"` (also accepts `×` and `X`).
pub fn parse_resolution(raw: &str) -> Option<Size> {
    let normalized = raw.trim().replace(['×', 'X'], "x");
    let (w, h) = normalized.split_once('x')?;
    let size = Size::new(w.trim().parse().ok()?, h.trim().parse().ok()?);
    size.is_usable().then_some(size)
}

/// A row in the camera listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSummary {
    pub id: CameraId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub camera_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Paged listing envelope: `{ "items": [...], "total": n }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: Option<u64>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: None,
        }
    }
}

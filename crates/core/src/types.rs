/// Backend identifier of a camera or uploaded video.
pub type CameraId = i64;

/// Discrete frame number derived from playback time and frame rate.
pub type FrameIndex = u64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

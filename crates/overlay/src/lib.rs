//! Video overlay synchronization engine.
//!
//! Aligns a playing video with frame-indexed detection metadata and draws
//! the detections onto a surface laid over the visible picture. The
//! engine is split along the seams a host has to provide:
//!
//! - [`player::Player`]: the media element (time, play state, size).
//! - [`renderer::Surface`]: the 2D drawing surface over the picture.
//! - [`scheduler::FrameScheduler`]: the display's paint cycle.
//! - [`backend::OverlayBackend`]: stream and metadata endpoints.
//!
//! [`viewer::Viewer`] owns one instance of each and runs the playback
//! loop; [`live::LiveCameraSession`] covers live cameras, whose
//! annotations are rendered server-side.

pub mod backend;
pub mod config;
pub mod error;
pub mod live;
pub mod player;
pub mod provider;
pub mod renderer;
pub mod scheduler;
pub mod source;
pub mod viewer;

pub use config::{MetadataStrategy, OverlayConfig};
pub use error::OverlayError;
pub use live::{LiveCameraSession, LiveStatus};
pub use source::{SourceRegistry, VideoSource};
pub use viewer::{LoadState, PlaybackState, Viewer, ViewerHandle, ViewerHost, ViewerStatus};

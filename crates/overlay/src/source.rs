//! Stream acquisition and revocable video sources.
//!
//! [`acquire`] downloads the media payload for one camera and wraps it in
//! a [`VideoSource`]: a local, revocable reference the player can load.
//! Every source is accounted in a [`SourceRegistry`]; it is revoked by
//! [`VideoSource::release`] or, failing that, when it is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use roadwatch_core::types::CameraId;

use crate::backend::OverlayBackend;
use crate::error::OverlayError;

/// Counters for sources created and revoked.
///
/// Cheap to clone; clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicU64,
    released: AtomicU64,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sources created so far.
    pub fn acquired(&self) -> u64 {
        self.counters.acquired.load(Ordering::SeqCst)
    }

    /// Sources revoked so far.
    pub fn released(&self) -> u64 {
        self.counters.released.load(Ordering::SeqCst)
    }

    /// Sources created but not yet revoked.
    pub fn outstanding(&self) -> u64 {
        self.acquired().saturating_sub(self.released())
    }

    /// Wrap a payload in a new registered source.
    pub fn register(&self, camera_id: CameraId, bytes: Vec<u8>, content_type: String) -> VideoSource {
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        let url = format!("blob:roadwatch/{}", uuid::Uuid::new_v4());
        tracing::debug!(camera_id, url = %url, size = bytes.len(), "Video source created");
        VideoSource {
            camera_id,
            url,
            content_type,
            bytes: Arc::from(bytes),
            registry: self.clone(),
            released: false,
        }
    }
}

/// A revocable local reference to downloaded media bytes.
#[derive(Debug)]
pub struct VideoSource {
    camera_id: CameraId,
    url: String,
    content_type: String,
    bytes: Arc<[u8]>,
    registry: SourceRegistry,
    released: bool,
}

impl VideoSource {
    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    /// Local reference handed to the player (`blob:roadwatch/<uuid>`).
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Shared view of the payload.
    pub fn bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Revoke this source.
    pub fn release(mut self) {
        self.revoke();
    }

    fn revoke(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.registry.counters.released.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(camera_id = self.camera_id, url = %self.url, "Video source released");
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        if !self.released {
            tracing::debug!(camera_id = self.camera_id, "Video source revoked on drop");
            self.revoke();
        }
    }
}

/// Download the media for `camera_id` and register it as a source.
///
/// Non-success statuses, network errors, and timeouts are all returned as
/// errors; no source is registered in that case.
pub async fn acquire(
    backend: &dyn OverlayBackend,
    registry: &SourceRegistry,
    camera_id: CameraId,
) -> Result<VideoSource, OverlayError> {
    if camera_id <= 0 {
        return Err(OverlayError::InvalidIdentifier(camera_id));
    }

    let payload = backend.fetch_stream(camera_id).await.map_err(|e| {
        tracing::error!(camera_id, error = %e, "Failed to load video stream");
        e
    })?;

    let source = registry.register(camera_id, payload.bytes, payload.content_type);
    tracing::info!(
        camera_id,
        url = %source.url(),
        content_type = %source.content_type(),
        size = source.len(),
        "Video loaded",
    );
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_is_counted_once() {
        let registry = SourceRegistry::new();
        let source = registry.register(1, vec![0; 8], "video/mp4".into());
        assert_eq!(registry.outstanding(), 1);
        assert!(source.url().starts_with("blob:roadwatch/"));

        source.release();
        assert_eq!(registry.acquired(), 1);
        assert_eq!(registry.released(), 1);
        assert_eq!(registry.outstanding(), 0);
    }

    #[test]
    fn drop_revokes_unreleased_source() {
        let registry = SourceRegistry::new();
        {
            let _source = registry.register(2, vec![1, 2], "video/webm".into());
            assert_eq!(registry.outstanding(), 1);
        }
        assert_eq!(registry.released(), 1);
    }

    #[test]
    fn each_source_gets_a_distinct_url() {
        let registry = SourceRegistry::new();
        let a = registry.register(1, Vec::new(), "video/mp4".into());
        let b = registry.register(1, Vec::new(), "video/mp4".into());
        assert_ne!(a.url(), b.url());
        assert!(a.is_empty());
    }
}

//! Backend seam used by the viewer and metadata providers.
//!
//! [`OverlayBackend`] is the subset of backend operations the engine
//! needs. [`BackendApi`] implements it over HTTP; tests and embedders can
//! supply their own.

use async_trait::async_trait;

use roadwatch_client::api::{AnomalyQuery, MediaPayload, SortOrder};
use roadwatch_client::BackendApi;
use roadwatch_core::detection::Detection;
use roadwatch_core::types::{CameraId, FrameIndex};
use roadwatch_core::video_info::VideoInfo;

use crate::error::OverlayError;

/// Page size requested when draining the per-camera anomaly listing.
const ANOMALY_PAGE_SIZE: u64 = 1000;

/// Upper bound on pages fetched for one camera.
const MAX_ANOMALY_PAGES: u64 = 100;

#[async_trait]
pub trait OverlayBackend: Send + Sync + 'static {
    /// Full media payload for a camera/video.
    async fn fetch_stream(&self, camera_id: CameraId) -> Result<MediaPayload, OverlayError>;

    /// Camera/video metadata (fps, resolution).
    async fn video_info(&self, camera_id: CameraId) -> Result<VideoInfo, OverlayError>;

    /// Every detection of a camera, ascending by frame.
    async fn all_detections(&self, camera_id: CameraId) -> Result<Vec<Detection>, OverlayError>;

    /// Detections for exactly one frame.
    async fn frame_detections(
        &self,
        camera_id: CameraId,
        frame: FrameIndex,
    ) -> Result<Vec<Detection>, OverlayError>;
}

#[async_trait]
impl OverlayBackend for BackendApi {
    async fn fetch_stream(&self, camera_id: CameraId) -> Result<MediaPayload, OverlayError> {
        Ok(BackendApi::fetch_stream(self, camera_id).await?)
    }

    async fn video_info(&self, camera_id: CameraId) -> Result<VideoInfo, OverlayError> {
        Ok(self.get_video_info(camera_id).await?)
    }

    /// Pages through the listing until the reported total is covered, an
    /// empty page arrives, or the page cap is reached. Without a total, a
    /// short page ends the listing.
    async fn all_detections(&self, camera_id: CameraId) -> Result<Vec<Detection>, OverlayError> {
        let mut detections = Vec::new();
        let mut skip = 0u64;

        for _ in 0..MAX_ANOMALY_PAGES {
            let query = AnomalyQuery {
                order: SortOrder::Asc,
                skip: Some(skip),
                limit: Some(ANOMALY_PAGE_SIZE),
                ..Default::default()
            };
            let page = self.list_anomalies(camera_id, &query).await?;
            // The server may cap `limit`; advance by what actually arrived.
            skip += page.received;
            detections.extend(page.items);

            let finished = match page.total {
                Some(total) => page.received == 0 || skip >= total,
                None => page.received < ANOMALY_PAGE_SIZE,
            };
            if finished {
                return Ok(detections);
            }
        }

        tracing::warn!(
            camera_id,
            count = detections.len(),
            "Anomaly listing truncated at page cap"
        );
        Ok(detections)
    }

    async fn frame_detections(
        &self,
        camera_id: CameraId,
        frame: FrameIndex,
    ) -> Result<Vec<Detection>, OverlayError> {
        Ok(self.get_frame_metadata(frame, camera_id).await?)
    }
}

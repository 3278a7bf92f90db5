//! REST client for the Roadwatch backend.
//!
//! Wraps the camera, stream, and anomaly endpoints using [`reqwest`].
//! Every request carries the configured bearer token (if any) and is
//! bounded by the configured request timeout, except the live MJPEG
//! stream which only bounds connection setup.

use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use roadwatch_core::detection::Detection;
use roadwatch_core::types::{CameraId, FrameIndex, Timestamp};
use roadwatch_core::video_info::{CameraSummary, Page, VideoInfo};

use crate::config::ClientConfig;

/// Content type assumed when the stream endpoint does not declare one.
pub const DEFAULT_VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// HTTP client for one backend.
#[derive(Debug, Clone)]
pub struct BackendApi {
    client: reqwest::Client,
    /// Client without a total timeout, for endless live streams.
    stream_client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

/// Full media payload returned by the stream endpoint.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Ordering for anomaly listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Filters for `GET anomalies/camera/{id}`.
#[derive(Debug, Clone, Default)]
pub struct AnomalyQuery {
    pub order: SortOrder,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
}

impl AnomalyQuery {
    fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("order", self.order.as_str().to_string())];
        if let Some(skip) = self.skip {
            params.push(("skip", skip.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(start) = self.start_time {
            params.push(("start_time", start.to_rfc3339()));
        }
        if let Some(end) = self.end_time {
            params.push(("end_time", end.to_rfc3339()));
        }
        params
    }
}

/// Filters for `GET cameras/`.
#[derive(Debug, Clone)]
pub struct CameraQuery {
    pub skip: u64,
    pub limit: u64,
    /// `local` for uploaded recordings, `youtube` for live feeds.
    pub camera_type: Option<String>,
}

impl Default for CameraQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 100,
            camera_type: None,
        }
    }
}

/// One page of the anomaly listing.
#[derive(Debug, Clone, Default)]
pub struct AnomalyPage {
    /// Rows that decoded into detections.
    pub items: Vec<Detection>,
    /// Rows the backend sent, malformed ones included. Use this to
    /// advance `skip`.
    pub received: u64,
    pub total: Option<u64>,
}

/// The frame endpoint answers with either a bare array or a page.
/// Rows are decoded individually by [`decode_detections`].
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DetectionList {
    Bare(Vec<serde_json::Value>),
    Paged(Page<serde_json::Value>),
}

impl DetectionList {
    fn into_rows(self) -> Vec<serde_json::Value> {
        match self {
            DetectionList::Bare(rows) => rows,
            DetectionList::Paged(page) => page.items,
        }
    }
}

/// Decode rows one at a time, dropping the ones that are not detections.
fn decode_detections(camera_id: CameraId, rows: Vec<serde_json::Value>) -> Vec<Detection> {
    rows.into_iter()
        .enumerate()
        .filter_map(|(index, row)| match serde_json::from_value::<Detection>(row) {
            Ok(detection) => Some(detection),
            Err(e) => {
                tracing::warn!(camera_id, index, error = %e, "Skipping malformed detection");
                None
            }
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct StopStreamRequest<'a> {
    session_id: &'a str,
}

/// Errors from the backend REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend API error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A request URL could not be built from the base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// `true` when the request was aborted by the request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Request(e) if e.is_timeout())
    }

    /// HTTP status for [`ApiError::Status`].
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl BackendApi {
    /// Build a client from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let stream_client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            stream_client,
            base_url: config.base_url.clone(),
            access_token: config.access_token.clone(),
        })
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// for both regular requests and live streams.
    pub fn with_client(client: reqwest::Client, base_url: String, access_token: Option<String>) -> Self {
        Self {
            stream_client: client.clone(),
            client,
            base_url,
            access_token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// Join `path` onto the base URL with exactly one separating slash.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// List cameras (`GET cameras/`).
    pub async fn list_cameras(&self, query: &CameraQuery) -> Result<Page<CameraSummary>, ApiError> {
        let mut params = vec![("skip", query.skip.to_string()), ("limit", query.limit.to_string())];
        if let Some(kind) = &query.camera_type {
            params.push(("camera_type", kind.clone()));
        }

        let response = self
            .authorize(self.client.get(self.endpoint("cameras/")))
            .query(&params)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch camera/video metadata (`GET cameras/{id}`).
    pub async fn get_video_info(&self, camera_id: CameraId) -> Result<VideoInfo, ApiError> {
        let response = self
            .authorize(self.client.get(self.endpoint(&format!("cameras/{camera_id}"))))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Download the full media payload (`GET cameras/{id}/stream/`).
    ///
    /// The declared content type is kept so the player can pick a
    /// decoder; [`DEFAULT_VIDEO_CONTENT_TYPE`] is used when absent.
    pub async fn fetch_stream(&self, camera_id: CameraId) -> Result<MediaPayload, ApiError> {
        let response = self
            .authorize(self.client.get(self.endpoint(&format!("cameras/{camera_id}/stream/"))))
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_VIDEO_CONTENT_TYPE)
            .to_string();
        let bytes = response.bytes().await?.to_vec();

        tracing::debug!(camera_id, size = bytes.len(), content_type = %content_type, "Stream payload received");

        Ok(MediaPayload { bytes, content_type })
    }

    /// List detections for a camera (`GET anomalies/camera/{id}`).
    ///
    /// Malformed rows are logged and dropped; the rest of the page is kept.
    pub async fn list_anomalies(
        &self,
        camera_id: CameraId,
        query: &AnomalyQuery,
    ) -> Result<AnomalyPage, ApiError> {
        let response = self
            .authorize(self.client.get(self.endpoint(&format!("anomalies/camera/{camera_id}"))))
            .query(&query.to_params())
            .send()
            .await?;

        let page: Page<serde_json::Value> = Self::parse_response(response).await?;
        let received = page.items.len() as u64;
        Ok(AnomalyPage {
            items: decode_detections(camera_id, page.items),
            received,
            total: page.total,
        })
    }

    /// Detections for exactly one frame (`GET anomalies/frame/{frame}`).
    pub async fn get_frame_metadata(
        &self,
        frame: FrameIndex,
        camera_id: CameraId,
    ) -> Result<Vec<Detection>, ApiError> {
        let response = self
            .authorize(self.client.get(self.endpoint(&format!("anomalies/frame/{frame}"))))
            .query(&[("camera_id", camera_id)])
            .send()
            .await?;

        let list: DetectionList = Self::parse_response(response).await?;
        Ok(decode_detections(camera_id, list.into_rows()))
    }

    /// URL of the live MJPEG stream for one viewing session.
    ///
    /// The token travels in the query string because the stream is
    /// consumed by clients that cannot set headers.
    pub fn live_stream_url(&self, camera_id: CameraId, session_id: &str) -> Result<Url, ApiError> {
        let base = self.endpoint(&format!("cameras/{camera_id}/stream-youtube"));
        let mut params = Vec::with_capacity(2);
        if let Some(token) = &self.access_token {
            params.push(("token", token.as_str()));
        }
        params.push(("session_id", session_id));
        Url::parse_with_params(&base, &params).map_err(|e| ApiError::InvalidUrl(format!("{base}: {e}")))
    }

    /// Open the live stream; the body is read progressively by the caller.
    pub async fn open_live_stream(
        &self,
        camera_id: CameraId,
        session_id: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.live_stream_url(camera_id, session_id)?;
        let response = self.authorize(self.stream_client.get(url)).send().await?;
        Self::ensure_success(response).await
    }

    /// Ask the backend to stop a live session (`POST cameras/{id}/stop-stream`).
    pub async fn stop_stream(&self, camera_id: CameraId, session_id: &str) -> Result<(), ApiError> {
        let response = self
            .authorize(self.client.post(self.endpoint(&format!("cameras/{camera_id}/stop-stream"))))
            .json(&StopStreamRequest { session_id })
            .send()
            .await?;

        Self::check_status(response).await
    }

    // ---- private helpers ----

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApiError::Status`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

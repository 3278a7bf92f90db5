//! Live camera sessions.
//!
//! Live cameras deliver a continuous MJPEG stream with annotations already
//! burnt in by the server, so there is no metadata to synchronise. The
//! session only tracks the connection and tells the server to stop
//! streaming when the viewer goes away.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use roadwatch_client::BackendApi;
use roadwatch_core::types::CameraId;

use crate::error::OverlayError;

/// Connection state shown by the live indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveStatus {
    Connecting,
    Live { bytes_received: u64 },
    /// The server finished the stream.
    Ended { bytes_received: u64 },
    Failed(String),
    /// Closed by the viewer.
    Closed,
}

#[derive(Debug)]
pub struct LiveCameraSession {
    api: Arc<BackendApi>,
    camera_id: CameraId,
    session_id: String,
    grace: Duration,
    status_tx: Arc<watch::Sender<LiveStatus>>,
    status_rx: watch::Receiver<LiveStatus>,
    cancel: CancellationToken,
    closed: bool,
}

impl LiveCameraSession {
    /// Start streaming `camera_id` under a fresh session id.
    ///
    /// `grace` bounds the stop-stream notification sent on close.
    pub fn open(
        api: Arc<BackendApi>,
        camera_id: CameraId,
        grace: Duration,
    ) -> Result<Self, OverlayError> {
        if camera_id <= 0 {
            return Err(OverlayError::InvalidIdentifier(camera_id));
        }

        let session_id = format!("stream_{camera_id}_{}", uuid::Uuid::new_v4().simple());
        let (status_tx, status_rx) = watch::channel(LiveStatus::Connecting);
        let status_tx = Arc::new(status_tx);
        let cancel = CancellationToken::new();

        tracing::info!(camera_id, session_id = %session_id, "Opening live stream");
        tokio::spawn(read_stream(
            Arc::clone(&api),
            camera_id,
            session_id.clone(),
            Arc::clone(&status_tx),
            cancel.clone(),
        ));

        Ok(Self {
            api,
            camera_id,
            session_id,
            grace,
            status_tx,
            status_rx,
            cancel,
            closed: false,
        })
    }

    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn status(&self) -> LiveStatus {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LiveStatus> {
        self.status_rx.clone()
    }

    /// Stop reading and notify the server.
    ///
    /// The notification runs detached; the returned handle may be awaited
    /// but never needs to be.
    pub fn close(mut self) -> Option<JoinHandle<()>> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<JoinHandle<()>> {
        if self.closed {
            return None;
        }
        self.closed = true;
        self.cancel.cancel();
        self.status_tx.send_replace(LiveStatus::Closed);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                camera_id = self.camera_id,
                session_id = %self.session_id,
                "No runtime available, stop-stream not sent",
            );
            return None;
        };

        let api = Arc::clone(&self.api);
        let camera_id = self.camera_id;
        let session_id = self.session_id.clone();
        let grace = self.grace;

        Some(runtime.spawn(async move {
            match tokio::time::timeout(grace, api.stop_stream(camera_id, &session_id)).await {
                Ok(Ok(())) => {
                    tracing::debug!(camera_id, session_id = %session_id, "Live stream stopped");
                }
                Ok(Err(e)) => {
                    tracing::warn!(camera_id, session_id = %session_id, error = %e, "Stop-stream request failed");
                }
                Err(_) => {
                    tracing::warn!(
                        camera_id,
                        session_id = %session_id,
                        grace_ms = grace.as_millis() as u64,
                        "Stop-stream request timed out",
                    );
                }
            }
        }))
    }
}

impl Drop for LiveCameraSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Publish `next` unless the session was already closed.
fn update(status: &watch::Sender<LiveStatus>, next: LiveStatus) {
    status.send_if_modified(|current| {
        if *current == LiveStatus::Closed {
            return false;
        }
        *current = next;
        true
    });
}

async fn read_stream(
    api: Arc<BackendApi>,
    camera_id: CameraId,
    session_id: String,
    status: Arc<watch::Sender<LiveStatus>>,
    cancel: CancellationToken,
) {
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        opened = api.open_live_stream(camera_id, &session_id) => opened,
    };

    let mut response = match opened {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(camera_id, session_id = %session_id, error = %e, "Live stream failed");
            update(&status, LiveStatus::Failed(e.to_string()));
            return;
        }
    };

    let mut bytes_received = 0u64;
    update(&status, LiveStatus::Live { bytes_received });

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            chunk = response.chunk() => chunk,
        };

        match chunk {
            Ok(Some(bytes)) => {
                bytes_received += bytes.len() as u64;
                update(&status, LiveStatus::Live { bytes_received });
            }
            Ok(None) => {
                tracing::info!(camera_id, bytes_received, "Live stream ended");
                update(&status, LiveStatus::Ended { bytes_received });
                return;
            }
            Err(e) => {
                tracing::warn!(camera_id, session_id = %session_id, error = %e, "Live stream interrupted");
                update(&status, LiveStatus::Failed(e.to_string()));
                return;
            }
        }
    }
}

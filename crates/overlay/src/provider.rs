//! Metadata providers: resolve the detections to show for a frame.
//!
//! Both strategies answer synchronously from state they own. Network work
//! runs on spawned tasks tied to a cancellation token; completions come
//! back over a channel and are applied at the start of the next call.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use roadwatch_core::detection::Detection;
use roadwatch_core::frame_cache::FrameCache;
use roadwatch_core::frame_clock::FetchThrottle;
use roadwatch_core::frame_index::FrameDetectionIndex;
use roadwatch_core::types::{CameraId, FrameIndex};

use crate::backend::OverlayBackend;
use crate::config::MetadataStrategy;
use crate::error::OverlayError;

pub trait MetadataProvider: Send {
    /// Detections to display for `frame`. Never blocks.
    fn detections_for(&mut self, frame: FrameIndex) -> Arc<[Detection]>;

    /// Cancel outstanding fetches. Further calls return what is already known.
    fn shutdown(&mut self);

    fn strategy(&self) -> &'static str;
}

/// Build the provider selected by `strategy` for one mounted camera.
///
/// `cancel` should be the mount generation's token: cancelling it stops
/// every fetch the provider has spawned.
pub fn build_provider(
    strategy: MetadataStrategy,
    backend: Arc<dyn OverlayBackend>,
    camera_id: CameraId,
    cancel: CancellationToken,
) -> Box<dyn MetadataProvider> {
    match strategy {
        MetadataStrategy::Eager => Box::new(EagerProvider::spawn(backend, camera_id, cancel)),
        MetadataStrategy::Lazy {
            fetch_interval,
            cache_capacity,
        } => Box::new(LazyProvider::new(
            backend,
            camera_id,
            fetch_interval,
            cache_capacity,
            cancel,
        )),
    }
}

fn no_detections() -> Arc<[Detection]> {
    Arc::from(Vec::new())
}

/* --------------------------------------------------------------------------
Eager
-------------------------------------------------------------------------- */

/// Loads every detection of the camera once and serves frames from the
/// resulting index. Shows nothing until the listing arrives.
pub struct EagerProvider {
    camera_id: CameraId,
    index: FrameDetectionIndex,
    pending: Option<oneshot::Receiver<FrameDetectionIndex>>,
    cancel: CancellationToken,
    empty: Arc<[Detection]>,
}

impl EagerProvider {
    pub fn spawn(
        backend: Arc<dyn OverlayBackend>,
        camera_id: CameraId,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, rx) = oneshot::channel();
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = task_cancel.cancelled() => return,
                result = backend.all_detections(camera_id) => result,
            };

            let index = match result {
                Ok(detections) => {
                    let index = FrameDetectionIndex::build(detections);
                    tracing::info!(
                        camera_id,
                        frames = index.frame_count(),
                        detections = index.detection_count(),
                        "Frame metadata loaded",
                    );
                    index
                }
                Err(e) => {
                    tracing::warn!(camera_id, error = %e, "Failed to load frame metadata");
                    FrameDetectionIndex::empty()
                }
            };
            let _ = tx.send(index);
        });

        Self {
            camera_id,
            index: FrameDetectionIndex::empty(),
            pending: Some(rx),
            cancel,
            empty: no_detections(),
        }
    }

    /// Whether the listing has been received (or given up on).
    pub fn is_ready(&mut self) -> bool {
        self.poll_pending();
        self.pending.is_none()
    }

    fn poll_pending(&mut self) {
        let Some(rx) = self.pending.as_mut() else {
            return;
        };
        match rx.try_recv() {
            Ok(index) => {
                self.index = index;
                self.pending = None;
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
            Err(oneshot::error::TryRecvError::Closed) => {
                tracing::debug!(camera_id = self.camera_id, "Metadata load abandoned");
                self.pending = None;
            }
        }
    }
}

impl MetadataProvider for EagerProvider {
    fn detections_for(&mut self, frame: FrameIndex) -> Arc<[Detection]> {
        self.poll_pending();
        self.index
            .get(frame)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.empty))
    }

    fn shutdown(&mut self) {
        self.cancel.cancel();
        self.pending = None;
    }

    fn strategy(&self) -> &'static str {
        "eager"
    }
}

/* --------------------------------------------------------------------------
Lazy
-------------------------------------------------------------------------- */

type Completion = (FrameIndex, Result<Vec<Detection>, OverlayError>);

/// Queries single frames at throttled frame boundaries and keeps a bounded,
/// insertion-ordered cache of the answers.
///
/// Between fetch points the last resolved set stays on screen. Only the
/// answer for the most recently requested frame replaces it; late answers
/// for older frames are cached but not displayed.
pub struct LazyProvider {
    backend: Arc<dyn OverlayBackend>,
    camera_id: CameraId,
    throttle: FetchThrottle,
    cache: FrameCache<Arc<[Detection]>>,
    displayed: Arc<[Detection]>,
    latest_requested: Option<FrameIndex>,
    in_flight: HashSet<FrameIndex>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    cancel: CancellationToken,
}

impl LazyProvider {
    pub fn new(
        backend: Arc<dyn OverlayBackend>,
        camera_id: CameraId,
        fetch_interval: u64,
        cache_capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            camera_id,
            throttle: FetchThrottle::new(fetch_interval),
            cache: FrameCache::new(cache_capacity),
            displayed: no_detections(),
            latest_requested: None,
            in_flight: HashSet::new(),
            completions_tx,
            completions_rx,
            cancel,
        }
    }

    /// Apply every fetch that has completed since the last call.
    /// Returns the number of completions applied.
    pub fn poll_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok((frame, result)) = self.completions_rx.try_recv() {
            applied += 1;
            self.in_flight.remove(&frame);

            match result {
                Ok(detections) => {
                    let detections: Arc<[Detection]> = Arc::from(detections);
                    if self.latest_requested == Some(frame) {
                        self.displayed = Arc::clone(&detections);
                    }
                    if let Some((evicted, _)) = self.cache.insert(frame, detections) {
                        tracing::trace!(camera_id = self.camera_id, frame = evicted, "Evicted cached frame");
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        camera_id = self.camera_id,
                        frame,
                        error = %e,
                        "Failed to fetch frame metadata",
                    );
                }
            }
        }
        applied
    }

    pub fn cached_frames(&self) -> usize {
        self.cache.len()
    }

    pub fn is_cached(&self, frame: FrameIndex) -> bool {
        self.cache.contains(&frame)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn spawn_fetch(&mut self, frame: FrameIndex) {
        self.in_flight.insert(frame);

        let backend = Arc::clone(&self.backend);
        let camera_id = self.camera_id;
        let tx = self.completions_tx.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = backend.frame_detections(camera_id, frame) => result,
            };
            let _ = tx.send((frame, result));
        });
    }
}

impl MetadataProvider for LazyProvider {
    fn detections_for(&mut self, frame: FrameIndex) -> Arc<[Detection]> {
        self.poll_completions();

        if self.throttle.should_fetch(frame) {
            self.latest_requested = Some(frame);
            if let Some(hit) = self.cache.get(&frame) {
                self.displayed = Arc::clone(hit);
            } else if !self.in_flight.contains(&frame) && !self.cancel.is_cancelled() {
                tracing::debug!(camera_id = self.camera_id, frame, "Fetching frame metadata");
                self.spawn_fetch(frame);
            }
        }

        Arc::clone(&self.displayed)
    }

    fn shutdown(&mut self) {
        self.cancel.cancel();
        self.in_flight.clear();
        self.throttle.reset();
    }

    fn strategy(&self) -> &'static str {
        "lazy"
    }
}

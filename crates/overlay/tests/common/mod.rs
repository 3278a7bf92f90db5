#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use tokio::sync::Notify;

use roadwatch_client::api::MediaPayload;
use roadwatch_client::{BackendApi, ClientConfig};
use roadwatch_core::detection::{Detection, Rgb};
use roadwatch_core::error::CoreError;
use roadwatch_core::geometry::{Rect, Size};
use roadwatch_core::types::{CameraId, FrameIndex};
use roadwatch_core::video_info::VideoInfo;
use roadwatch_overlay::backend::OverlayBackend;
use roadwatch_overlay::player::Player;
use roadwatch_overlay::renderer::{LabelFont, RecordingSurface, Surface};
use roadwatch_overlay::source::VideoSource;
use roadwatch_overlay::OverlayError;

/* --------------------------------------------------------------------------
Backend
-------------------------------------------------------------------------- */

/// In-memory backend serving one detection table for every camera.
pub struct FakeBackend {
    pub detections: Vec<Detection>,
    pub fps: f64,
    pub resolution: &'static str,
    pub failing_streams: HashSet<CameraId>,
    stream_gates: Mutex<HashMap<CameraId, Arc<Notify>>>,
    stream_requests: AtomicUsize,
    frame_requests: AtomicUsize,
}

impl FakeBackend {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            fps: 30.0,
            resolution: "1920x1080",
            failing_streams: HashSet::new(),
            stream_gates: Mutex::new(HashMap::new()),
            stream_requests: AtomicUsize::new(0),
            frame_requests: AtomicUsize::new(0),
        }
    }

    pub fn failing_stream(mut self, camera_id: CameraId) -> Self {
        self.failing_streams.insert(camera_id);
        self
    }

    /// Hold the stream for `camera_id` until the gate is notified.
    pub fn gate_stream(&self, camera_id: CameraId) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.stream_gates
            .lock()
            .unwrap()
            .insert(camera_id, Arc::clone(&gate));
        gate
    }

    pub fn stream_requests(&self) -> usize {
        self.stream_requests.load(Ordering::SeqCst)
    }

    pub fn frame_requests(&self) -> usize {
        self.frame_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OverlayBackend for FakeBackend {
    async fn fetch_stream(&self, camera_id: CameraId) -> Result<MediaPayload, OverlayError> {
        self.stream_requests.fetch_add(1, Ordering::SeqCst);
        let gate = self.stream_gates.lock().unwrap().get(&camera_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.failing_streams.contains(&camera_id) {
            return Err(CoreError::Validation(format!("camera {camera_id} not found")).into());
        }
        Ok(MediaPayload {
            bytes: vec![0u8; 64],
            content_type: "video/mp4".into(),
        })
    }

    async fn video_info(&self, camera_id: CameraId) -> Result<VideoInfo, OverlayError> {
        let info = serde_json::from_value(serde_json::json!({
            "id": camera_id,
            "name": format!("camera {camera_id}"),
            "fps": self.fps,
            "resolution": self.resolution,
            "type": "local",
        }))
        .map_err(|e| CoreError::Validation(e.to_string()))?;
        Ok(info)
    }

    async fn all_detections(&self, _camera_id: CameraId) -> Result<Vec<Detection>, OverlayError> {
        Ok(self.detections.clone())
    }

    async fn frame_detections(
        &self,
        _camera_id: CameraId,
        frame: FrameIndex,
    ) -> Result<Vec<Detection>, OverlayError> {
        self.frame_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .detections
            .iter()
            .filter(|d| d.frame_id == frame)
            .cloned()
            .collect())
    }
}

/* --------------------------------------------------------------------------
Player
-------------------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct PlayerState {
    pub time: f64,
    pub paused: bool,
    pub loaded: Option<String>,
    pub size: Option<Size>,
    pub loads: usize,
}

/// Player whose clock is set by the test.
#[derive(Clone)]
pub struct ScriptedPlayer {
    pub state: Arc<Mutex<PlayerState>>,
}

impl ScriptedPlayer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PlayerState {
                paused: true,
                ..Default::default()
            })),
        }
    }

    pub fn set_time(&self, seconds: f64) {
        self.state.lock().unwrap().time = seconds;
    }

    /// Simulate the media reaching its end.
    pub fn finish(&self) {
        self.state.lock().unwrap().paused = true;
    }

    pub fn is_playing(&self) -> bool {
        !self.state.lock().unwrap().paused
    }

    pub fn loaded(&self) -> Option<String> {
        self.state.lock().unwrap().loaded.clone()
    }
}

impl Player for ScriptedPlayer {
    fn load(&mut self, source: &VideoSource) {
        let mut state = self.state.lock().unwrap();
        state.loaded = Some(source.url().to_string());
        state.time = 0.0;
        state.loads += 1;
    }

    fn unload(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.loaded = None;
        state.size = None;
    }

    fn apply_video_info(&mut self, info: &VideoInfo) {
        self.state.lock().unwrap().size = info.dimensions();
    }

    fn play(&mut self) {
        let mut state = self.state.lock().unwrap();
        if state.loaded.is_some() {
            state.paused = false;
        }
    }

    fn pause(&mut self) {
        self.state.lock().unwrap().paused = true;
    }

    fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }

    fn seek(&mut self, seconds: f64) {
        self.state.lock().unwrap().time = seconds;
    }

    fn set_playback_rate(&mut self, _rate: f64) {}

    fn current_time(&self) -> f64 {
        self.state.lock().unwrap().time
    }

    fn intrinsic_size(&self) -> Option<Size> {
        let state = self.state.lock().unwrap();
        state.loaded.as_ref().and(state.size)
    }
}

/* --------------------------------------------------------------------------
Surface
-------------------------------------------------------------------------- */

/// Recording surface the test can inspect while the viewer owns it.
#[derive(Clone)]
pub struct SharedSurface {
    inner: Arc<Mutex<RecordingSurface>>,
}

impl SharedSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RecordingSurface::new(Size::new(width, height)))),
        }
    }

    pub fn rects(&self) -> Vec<Rect> {
        self.inner.lock().unwrap().rects()
    }

    pub fn is_blank(&self) -> bool {
        self.inner.lock().unwrap().is_blank()
    }
}

impl Surface for SharedSurface {
    fn size(&self) -> Size {
        self.inner.lock().unwrap().size()
    }

    fn resize(&mut self, size: Size) {
        self.inner.lock().unwrap().resize(size);
    }

    fn clear(&mut self) {
        self.inner.lock().unwrap().clear();
    }

    fn stroke_rect(&mut self, rect: Rect, color: Rgb, line_width: f64) {
        self.inner.lock().unwrap().stroke_rect(rect, color, line_width);
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgb) {
        self.inner.lock().unwrap().fill_rect(rect, color);
    }

    fn measure_text(&self, text: &str, font: &LabelFont) -> f64 {
        self.inner.lock().unwrap().measure_text(text, font)
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: Rgb, font: &LabelFont) {
        self.inner.lock().unwrap().fill_text(text, x, y, color, font);
    }
}

/* --------------------------------------------------------------------------
Helpers
-------------------------------------------------------------------------- */

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Run `step` until `done` holds, or panic after two seconds.
pub async fn eventually(mut step: impl FnMut(), mut done: impl FnMut() -> bool) {
    for _ in 0..400 {
        if done() {
            return;
        }
        step();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(done(), "condition not reached in time");
}

/// Serve `router` on an ephemeral localhost port and return the API base
/// URL (`http://127.0.0.1:<port>/api/`).
pub async fn spawn_backend(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/api/")
}

pub fn api_for(base_url: &str) -> Arc<BackendApi> {
    let config = ClientConfig {
        base_url: base_url.to_string(),
        access_token: Some("test-token".into()),
        request_timeout: Duration::from_millis(500),
    };
    Arc::new(BackendApi::new(&config).unwrap())
}

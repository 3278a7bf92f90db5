//! Playback loop controller.
//!
//! A [`Viewer`] is a single task owning the player, drawing surface,
//! renderer, metadata provider and video source of one mounted view. It
//! reacts to three inputs:
//!
//! - commands from its [`ViewerHandle`] (play, pause, seek, resize, ...),
//! - completions of the network work it spawned (stream, video info),
//! - frame signals from its [`FrameScheduler`], only while playing.
//!
//! Each frame signal samples the player clock, resolves the detections
//! for that frame and redraws the overlay. Network work for a mounted
//! camera is tagged with a generation number and tied to a child
//! cancellation token, so switching camera or unmounting discards it.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use roadwatch_core::detection::Detection;
use roadwatch_core::frame_clock::{frame_at, DEFAULT_FPS};
use roadwatch_core::geometry::Size;
use roadwatch_core::types::{CameraId, FrameIndex};
use roadwatch_core::video_info::VideoInfo;

use crate::backend::OverlayBackend;
use crate::config::{MetadataStrategy, OverlayConfig};
use crate::error::OverlayError;
use crate::player::Player;
use crate::provider::{build_provider, MetadataProvider};
use crate::renderer::{DrawReport, OverlayRenderer, Surface};
use crate::scheduler::FrameScheduler;
use crate::source::{acquire, SourceRegistry, VideoSource};

/* --------------------------------------------------------------------------
Status
-------------------------------------------------------------------------- */

/// Loading state of the current camera's media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    /// Acquisition failed; playback cannot start.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Snapshot published after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerStatus {
    pub camera_id: CameraId,
    /// Incremented on every mount, including camera switches.
    pub generation: u64,
    pub strategy: &'static str,
    pub load: LoadState,
    pub playback: PlaybackState,
    /// Frame shown by the last draw.
    pub frame: FrameIndex,
    pub fps: f64,
    pub detections_shown: usize,
    /// Draws performed by the playback loop.
    pub frames_drawn: u64,
    /// Draws outside the loop (resize, overlay toggle, size discovery).
    pub redraws: u64,
    pub last_draw: DrawReport,
}

impl ViewerStatus {
    fn new(camera_id: CameraId, strategy: &'static str) -> Self {
        Self {
            camera_id,
            generation: 0,
            strategy,
            load: LoadState::Loading,
            playback: PlaybackState::Stopped,
            frame: 0,
            fps: DEFAULT_FPS,
            detections_shown: 0,
            frames_drawn: 0,
            redraws: 0,
            last_draw: DrawReport::default(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.load == LoadState::Ready
    }
}

/* --------------------------------------------------------------------------
Handle
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq)]
enum ViewerCommand {
    Play,
    Pause,
    Seek(f64),
    SetPlaybackRate(f64),
    Resize(Size),
    SetOverlay(bool),
    SwitchCamera(CameraId),
}

/// Control handle for a mounted [`Viewer`].
///
/// Dropping the handle unmounts the viewer as well; [`ViewerHandle::unmount`]
/// additionally waits for teardown to finish.
pub struct ViewerHandle {
    commands: mpsc::UnboundedSender<ViewerCommand>,
    status: watch::Receiver<ViewerStatus>,
    lifecycle: CancellationToken,
    task: JoinHandle<()>,
}

impl ViewerHandle {
    pub fn play(&self) -> Result<(), OverlayError> {
        self.send(ViewerCommand::Play)
    }

    pub fn pause(&self) -> Result<(), OverlayError> {
        self.send(ViewerCommand::Pause)
    }

    pub fn seek(&self, seconds: f64) -> Result<(), OverlayError> {
        self.send(ViewerCommand::Seek(seconds))
    }

    pub fn set_playback_rate(&self, rate: f64) -> Result<(), OverlayError> {
        self.send(ViewerCommand::SetPlaybackRate(rate))
    }

    /// The surface now covers `size` pixels.
    pub fn resize(&self, size: Size) -> Result<(), OverlayError> {
        self.send(ViewerCommand::Resize(size))
    }

    pub fn set_overlay(&self, enabled: bool) -> Result<(), OverlayError> {
        self.send(ViewerCommand::SetOverlay(enabled))
    }

    /// Replace the mounted camera, releasing everything held for the old one.
    pub fn switch_camera(&self, camera_id: CameraId) -> Result<(), OverlayError> {
        self.send(ViewerCommand::SwitchCamera(camera_id))
    }

    /// Latest published status.
    pub fn status(&self) -> ViewerStatus {
        self.status.borrow().clone()
    }

    /// Receiver for status updates.
    pub fn subscribe(&self) -> watch::Receiver<ViewerStatus> {
        self.status.clone()
    }

    /// Stop the viewer and wait until its resources are released.
    pub async fn unmount(self) {
        self.lifecycle.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Viewer task failed");
        }
    }

    fn send(&self, command: ViewerCommand) -> Result<(), OverlayError> {
        self.commands
            .send(command)
            .map_err(|_| OverlayError::Cancelled)
    }
}

/* --------------------------------------------------------------------------
Viewer
-------------------------------------------------------------------------- */

/// Host-provided pieces a viewer drives.
pub struct ViewerHost {
    pub player: Box<dyn Player>,
    pub surface: Box<dyn Surface>,
    pub scheduler: Box<dyn FrameScheduler>,
}

enum ViewerEvent {
    SourceLoaded {
        generation: u64,
        result: Result<VideoSource, OverlayError>,
    },
    InfoLoaded {
        generation: u64,
        result: Result<VideoInfo, OverlayError>,
    },
}

pub struct Viewer {
    backend: Arc<dyn OverlayBackend>,
    registry: SourceRegistry,
    strategy: MetadataStrategy,
    camera_id: CameraId,
    generation: u64,

    player: Box<dyn Player>,
    surface: Box<dyn Surface>,
    scheduler: Box<dyn FrameScheduler>,
    renderer: OverlayRenderer,
    provider: Option<Box<dyn MetadataProvider>>,
    source: Option<VideoSource>,
    known_size: Option<Size>,

    lifecycle: CancellationToken,
    mount_token: CancellationToken,
    events_tx: mpsc::UnboundedSender<ViewerEvent>,
    status: ViewerStatus,
    status_tx: watch::Sender<ViewerStatus>,
}

impl Viewer {
    /// Mount a viewer for `camera_id` and start its task.
    ///
    /// Stream acquisition, video info and (eager) metadata loading start
    /// immediately. Playback starts only on [`ViewerHandle::play`].
    pub fn mount(
        backend: Arc<dyn OverlayBackend>,
        registry: SourceRegistry,
        config: &OverlayConfig,
        camera_id: CameraId,
        host: ViewerHost,
    ) -> ViewerHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let status = ViewerStatus::new(camera_id, config.strategy.name());
        let (status_tx, status_rx) = watch::channel(status.clone());
        let lifecycle = CancellationToken::new();

        let viewer = Viewer {
            backend,
            registry,
            strategy: config.strategy,
            camera_id,
            generation: 0,
            player: host.player,
            surface: host.surface,
            scheduler: host.scheduler,
            renderer: OverlayRenderer::new(config.overlay_enabled),
            provider: None,
            source: None,
            known_size: None,
            mount_token: lifecycle.child_token(),
            lifecycle: lifecycle.clone(),
            events_tx,
            status,
            status_tx,
        };

        let task = tokio::spawn(viewer.run(commands_rx, events_rx));

        ViewerHandle {
            commands: commands_tx,
            status: status_rx,
            lifecycle,
            task,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<ViewerCommand>,
        mut events: mpsc::UnboundedReceiver<ViewerEvent>,
    ) {
        let lifecycle = self.lifecycle.clone();
        self.mount_current();
        self.publish();

        loop {
            let playing = self.status.playback == PlaybackState::Playing;

            tokio::select! {
                biased;

                _ = lifecycle.cancelled() => break,

                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },

                Some(event) = events.recv() => self.handle_event(event),

                _ = self.scheduler.next_frame(), if playing => self.tick(),
            }

            self.publish();
        }

        self.unmount_current();
        self.publish();
        tracing::info!(camera_id = self.camera_id, "Viewer unmounted");
    }

    /* ---- mount / unmount ---- */

    fn mount_current(&mut self) {
        self.generation += 1;
        self.mount_token = self.lifecycle.child_token();
        self.known_size = None;

        let camera_id = self.camera_id;
        let generation = self.generation;
        self.status = ViewerStatus {
            frames_drawn: self.status.frames_drawn,
            redraws: self.status.redraws,
            generation,
            ..ViewerStatus::new(camera_id, self.strategy.name())
        };

        if camera_id <= 0 {
            let e = OverlayError::InvalidIdentifier(camera_id);
            tracing::error!(camera_id, error = %e, "Cannot mount viewer");
            self.status.load = LoadState::Failed(e.to_string());
            return;
        }

        tracing::info!(
            camera_id,
            generation,
            strategy = self.strategy.name(),
            "Mounting viewer",
        );

        self.provider = Some(build_provider(
            self.strategy,
            Arc::clone(&self.backend),
            camera_id,
            self.mount_token.child_token(),
        ));

        let backend = Arc::clone(&self.backend);
        let registry = self.registry.clone();
        let cancel = self.mount_token.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = acquire(backend.as_ref(), &registry, camera_id) => result,
            };
            // A failed send drops the source, which revokes it.
            let _ = events.send(ViewerEvent::SourceLoaded { generation, result });
        });

        let backend = Arc::clone(&self.backend);
        let cancel = self.mount_token.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = backend.video_info(camera_id) => result,
            };
            let _ = events.send(ViewerEvent::InfoLoaded { generation, result });
        });
    }

    fn unmount_current(&mut self) {
        self.mount_token.cancel();
        if let Some(mut provider) = self.provider.take() {
            provider.shutdown();
        }
        self.scheduler.cancel_pending();
        self.player.pause();
        self.player.unload();
        if let Some(source) = self.source.take() {
            source.release();
        }
        self.surface.clear();
        self.status.playback = PlaybackState::Stopped;
        self.status.detections_shown = 0;
    }

    /* ---- inputs ---- */

    fn handle_command(&mut self, command: ViewerCommand) {
        match command {
            ViewerCommand::Play => self.play(),
            ViewerCommand::Pause => self.pause(),
            ViewerCommand::Seek(seconds) => self.player.seek(seconds),
            ViewerCommand::SetPlaybackRate(rate) => self.player.set_playback_rate(rate),
            ViewerCommand::Resize(size) => {
                self.surface.resize(size);
                self.redraw();
            }
            ViewerCommand::SetOverlay(enabled) => {
                self.renderer.set_enabled(enabled);
                self.redraw();
            }
            ViewerCommand::SwitchCamera(camera_id) => {
                if camera_id == self.camera_id {
                    return;
                }
                tracing::info!(from = self.camera_id, to = camera_id, "Switching camera");
                self.unmount_current();
                self.camera_id = camera_id;
                self.mount_current();
            }
        }
    }

    fn handle_event(&mut self, event: ViewerEvent) {
        match event {
            ViewerEvent::SourceLoaded { generation, result } => {
                if generation != self.generation {
                    if let Ok(source) = result {
                        tracing::debug!(
                            camera_id = source.camera_id(),
                            generation,
                            "Discarding source of superseded view",
                        );
                        source.release();
                    }
                    return;
                }
                match result {
                    Ok(source) => {
                        self.player.load(&source);
                        self.source = Some(source);
                        self.status.load = LoadState::Ready;
                        self.on_size_change();
                    }
                    Err(e) => {
                        tracing::error!(camera_id = self.camera_id, error = %e, "Video load failed");
                        self.status.load = LoadState::Failed(e.to_string());
                    }
                }
            }
            ViewerEvent::InfoLoaded { generation, result } => {
                if generation != self.generation {
                    return;
                }
                match result {
                    Ok(info) => {
                        self.status.fps = info.effective_fps();
                        self.player.apply_video_info(&info);
                        tracing::debug!(
                            camera_id = self.camera_id,
                            fps = self.status.fps,
                            resolution = ?info.resolution,
                            "Video info loaded",
                        );
                        self.on_size_change();
                    }
                    Err(e) => {
                        tracing::warn!(
                            camera_id = self.camera_id,
                            error = %e,
                            "Failed to load video info, assuming {DEFAULT_FPS} fps",
                        );
                    }
                }
            }
        }
    }

    fn play(&mut self) {
        match (&self.status.load, self.status.playback) {
            (_, PlaybackState::Playing) => {}
            (LoadState::Ready, _) => {
                self.player.play();
                self.status.playback = PlaybackState::Playing;
                tracing::debug!(camera_id = self.camera_id, "Playback started");
            }
            (load, _) => {
                tracing::debug!(camera_id = self.camera_id, ?load, "Play ignored, video not loaded");
            }
        }
    }

    fn pause(&mut self) {
        if self.status.playback != PlaybackState::Playing {
            return;
        }
        self.player.pause();
        self.scheduler.cancel_pending();
        self.status.playback = PlaybackState::Paused;
        tracing::debug!(camera_id = self.camera_id, "Playback paused");
    }

    /* ---- drawing ---- */

    /// One loop iteration: frame, detections, draw.
    fn tick(&mut self) {
        let frame = frame_at(self.player.current_time(), self.status.fps);
        self.draw(frame);
        self.status.frames_drawn += 1;

        if self.player.is_paused() {
            tracing::debug!(camera_id = self.camera_id, frame, "Player stopped by itself");
            self.scheduler.cancel_pending();
            self.status.playback = PlaybackState::Paused;
        }
    }

    /// Redraw the current frame outside the loop.
    fn redraw(&mut self) {
        if self.source.is_none() {
            self.surface.clear();
            return;
        }
        let frame = frame_at(self.player.current_time(), self.status.fps);
        self.draw(frame);
        self.status.redraws += 1;
    }

    /// Redraw once the intrinsic size becomes known or changes.
    fn on_size_change(&mut self) {
        let size = self.player.intrinsic_size();
        if size.is_some() && size != self.known_size {
            self.known_size = size;
            self.redraw();
        }
    }

    fn draw(&mut self, frame: FrameIndex) {
        let detections: Arc<[Detection]> = match self.provider.as_mut() {
            Some(provider) => provider.detections_for(frame),
            None => Arc::from(Vec::new()),
        };
        let report = self
            .renderer
            .draw(self.surface.as_mut(), self.player.intrinsic_size(), &detections);

        self.status.frame = frame;
        self.status.detections_shown = report.drawn;
        self.status.last_draw = report;
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status.clone());
    }
}

//! `roadwatch-viewer` -- headless camera viewer.
//!
//! Mounts one camera against the backend and runs the overlay engine on a
//! recording surface, logging what the overlay would show. Live cameras
//! are opened as a streaming session instead.
//!
//! # Environment variables
//!
//! Client and overlay settings are read by `ClientConfig::from_env` and
//! `OverlayConfig::from_env`. In addition:
//!
//! | Variable         | Required | Default    | Description                       |
//! |------------------|----------|------------|-----------------------------------|
//! | `CAMERA_ID`      | yes      | --         | Camera/video to view              |
//! | `VIEWER_MODE`    | no       | by type    | `recorded` or `live`              |
//! | `PLAY_SECONDS`   | no       | `10`       | How long to play before unmounting |
//! | `SURFACE_WIDTH`  | no       | `1280`     | Overlay surface width in pixels   |
//! | `SURFACE_HEIGHT` | no       | `720`      | Overlay surface height in pixels  |
//!
//! Without `VIEWER_MODE` the mode follows the camera's type: `youtube`
//! cameras are opened live, everything else is played back.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use roadwatch_client::{BackendApi, ClientConfig};
use roadwatch_core::geometry::Size;
use roadwatch_core::types::CameraId;
use roadwatch_core::video_info::{is_valid_camera_type, CAMERA_TYPE_YOUTUBE};
use roadwatch_overlay::backend::OverlayBackend;
use roadwatch_overlay::player::SimulatedPlayer;
use roadwatch_overlay::renderer::RecordingSurface;
use roadwatch_overlay::scheduler::RefreshTicker;
use roadwatch_overlay::{
    LiveCameraSession, LoadState, OverlayConfig, SourceRegistry, Viewer, ViewerHost,
};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PLAY_SECONDS: u64 = 10;
const DEFAULT_SURFACE_WIDTH: f64 = 1280.0;
const DEFAULT_SURFACE_HEIGHT: f64 = 720.0;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roadwatch_viewer=info,roadwatch_overlay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let client_config = ClientConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid client configuration");
        std::process::exit(1);
    });
    let overlay_config = OverlayConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid overlay configuration");
        std::process::exit(1);
    });

    let camera_id: CameraId = std::env::var("CAMERA_ID")
        .unwrap_or_else(|_| {
            tracing::error!("CAMERA_ID environment variable is required");
            std::process::exit(1);
        })
        .parse()
        .unwrap_or_else(|_| {
            tracing::error!("CAMERA_ID must be a valid integer");
            std::process::exit(1);
        });

    let play_for = Duration::from_secs(env_or("PLAY_SECONDS", DEFAULT_PLAY_SECONDS));
    let surface = Size::new(
        env_or("SURFACE_WIDTH", DEFAULT_SURFACE_WIDTH),
        env_or("SURFACE_HEIGHT", DEFAULT_SURFACE_HEIGHT),
    );
    if !surface.is_usable() {
        tracing::error!(width = surface.width, height = surface.height, "Surface size must be positive");
        std::process::exit(1);
    }

    let api = BackendApi::new(&client_config).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build HTTP client");
        std::process::exit(1);
    });
    let api = Arc::new(api);

    let mode = match std::env::var("VIEWER_MODE") {
        Ok(mode) => mode,
        Err(_) => detect_mode(&api, camera_id).await.to_string(),
    };

    tracing::info!(
        camera_id,
        mode = %mode,
        base_url = %api.base_url(),
        authenticated = api.has_token(),
        strategy = overlay_config.strategy.name(),
        "Starting roadwatch-viewer",
    );

    match mode.as_str() {
        "recorded" => run_recorded(api, &overlay_config, camera_id, surface, play_for).await,
        "live" => run_live(api, &overlay_config, camera_id, play_for).await,
        other => {
            tracing::error!(mode = %other, "VIEWER_MODE must be 'recorded' or 'live'");
            std::process::exit(1);
        }
    }
}

async fn run_recorded(
    api: Arc<BackendApi>,
    config: &OverlayConfig,
    camera_id: CameraId,
    surface: Size,
    play_for: Duration,
) {
    let registry = SourceRegistry::new();
    let backend: Arc<dyn OverlayBackend> = api;
    let handle = Viewer::mount(
        backend,
        registry.clone(),
        config,
        camera_id,
        ViewerHost {
            player: Box::new(SimulatedPlayer::new()),
            surface: Box::new(RecordingSurface::new(surface)),
            scheduler: Box::new(RefreshTicker::new(config.display_refresh_hz)),
        },
    );

    let mut status = handle.subscribe();
    let load = match status.wait_for(|s| s.load != LoadState::Loading).await {
        Ok(s) => s.load.clone(),
        Err(_) => LoadState::Failed("viewer stopped".into()),
    };

    if let LoadState::Failed(reason) = load {
        tracing::error!(camera_id, reason = %reason, "Video could not be loaded");
        handle.unmount().await;
        return;
    }

    if let Err(e) = handle.play() {
        tracing::error!(error = %e, "Failed to start playback");
    }

    tokio::select! {
        _ = tokio::time::sleep(play_for) => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
    }

    let status = handle.status();
    tracing::info!(
        camera_id,
        frame = status.frame,
        fps = status.fps,
        frames_drawn = status.frames_drawn,
        redraws = status.redraws,
        detections_shown = status.detections_shown,
        skipped = status.last_draw.skipped,
        "Playback summary",
    );

    handle.unmount().await;
    tracing::info!(
        acquired = registry.acquired(),
        released = registry.released(),
        "Video sources",
    );
}

async fn run_live(
    api: Arc<BackendApi>,
    config: &OverlayConfig,
    camera_id: CameraId,
    play_for: Duration,
) {
    let session = match LiveCameraSession::open(api, camera_id, config.stop_stream_grace) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(camera_id, error = %e, "Cannot open live stream");
            return;
        }
    };

    tokio::select! {
        _ = tokio::time::sleep(play_for) => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
    }

    tracing::info!(
        camera_id,
        session_id = %session.session_id(),
        status = ?session.status(),
        "Closing live stream",
    );

    if let Some(notify) = session.close() {
        let _ = notify.await;
    }
}

/// Pick the viewer mode from the camera's declared type.
async fn detect_mode(api: &BackendApi, camera_id: CameraId) -> &'static str {
    match api.get_video_info(camera_id).await {
        Ok(info) => mode_for_camera_type(info.kind.as_deref()).unwrap_or_else(|| {
            tracing::warn!(camera_id, kind = ?info.kind, "Unknown camera type, playing as recorded");
            "recorded"
        }),
        Err(e) => {
            tracing::warn!(camera_id, error = %e, "Camera type unavailable, playing as recorded");
            "recorded"
        }
    }
}

fn mode_for_camera_type(kind: Option<&str>) -> Option<&'static str> {
    let kind = kind?.trim();
    if !is_valid_camera_type(kind) {
        return None;
    }
    Some(if kind == CAMERA_TYPE_YOUTUBE { "live" } else { "recorded" })
}

/// Parse `name` from the environment, falling back to `default` when
/// unset. Exits on an unparsable value.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    parse_var(name, std::env::var(name).ok(), default).unwrap_or_else(|e| {
        tracing::error!("{e}");
        std::process::exit(1);
    })
}

fn parse_var<T: FromStr>(name: &str, raw: Option<String>, default: T) -> Result<T, String> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("{name} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

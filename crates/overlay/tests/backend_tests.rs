//! Anomaly listing through [`OverlayBackend`] against an in-process mock.

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use roadwatch_overlay::backend::OverlayBackend;
use roadwatch_overlay::provider::{EagerProvider, MetadataProvider};

use common::{api_for, spawn_backend};

/// The mock ignores larger `limit` values, like a bounded query parameter.
const SERVER_LIMIT: usize = 100;

/// 250 rows, one per frame, with a total.
const CAPPED_CAMERA: i64 = 1;
/// Valid rows at frames 30 and 60 surrounded by malformed ones.
const MIXED_CAMERA: i64 = 2;
/// 40 rows and no total.
const UNCOUNTED_CAMERA: i64 = 3;

#[derive(Clone, Default)]
struct MockState {
    skips: Arc<Mutex<Vec<usize>>>,
}

impl MockState {
    fn skips(&self) -> Vec<usize> {
        self.skips.lock().unwrap().clone()
    }
}

fn rows(camera_id: i64) -> Vec<Value> {
    match camera_id {
        CAPPED_CAMERA => (0..250)
            .map(|frame| json!({ "frame_id": frame, "bounding_box": "10,10,50,50" }))
            .collect(),
        MIXED_CAMERA => vec![
            json!({ "frame_id": 30, "bounding_box": "10,10,50,50", "class_name": "car" }),
            json!({ "frame_id": null, "bounding_box": "10,10,50,50" }),
            json!({ "frame_id": -2, "bounding_box": "10,10,50,50" }),
            json!({ "bounding_box": "10,10,50,50" }),
            json!({ "frame_id": 60, "bounding_box": "10,10,50,50", "class_name": "truck" }),
        ],
        _ => (0..40)
            .map(|frame| json!({ "frame_id": frame, "bounding_box": "10,10,50,50" }))
            .collect(),
    }
}

async fn anomalies(
    State(state): State<MockState>,
    Path(id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let skip: usize = params.get("skip").and_then(|v| v.parse().ok()).unwrap_or(0);
    let limit: usize = params
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(SERVER_LIMIT)
        .min(SERVER_LIMIT);
    state.skips.lock().unwrap().push(skip);

    let all = rows(id);
    let total = all.len();
    let items: Vec<Value> = all.into_iter().skip(skip).take(limit).collect();
    if id == UNCOUNTED_CAMERA {
        Json(json!({ "items": items }))
    } else {
        Json(json!({ "items": items, "total": total }))
    }
}

async fn backend() -> (String, MockState) {
    let state = MockState::default();
    let router = Router::new()
        .route("/api/anomalies/camera/{id}", get(anomalies))
        .with_state(state.clone());
    (spawn_backend(router).await, state)
}

#[tokio::test]
async fn listing_follows_total_past_capped_pages() {
    let (base, state) = backend().await;
    let api = api_for(&base);

    let detections = api.all_detections(CAPPED_CAMERA).await.unwrap();

    assert_eq!(detections.len(), 250);
    let frames: Vec<u64> = detections.iter().map(|d| d.frame_id).collect();
    assert_eq!(frames, (0..250).collect::<Vec<u64>>());
    assert_eq!(state.skips(), vec![0, 100, 200]);
}

#[tokio::test]
async fn listing_without_total_stops_on_short_page() {
    let (base, state) = backend().await;
    let api = api_for(&base);

    let detections = api.all_detections(UNCOUNTED_CAMERA).await.unwrap();

    assert_eq!(detections.len(), 40);
    assert_eq!(state.skips(), vec![0]);
}

#[tokio::test]
async fn malformed_rows_do_not_fail_the_listing() {
    let (base, state) = backend().await;
    let api = api_for(&base);

    let detections = api.all_detections(MIXED_CAMERA).await.unwrap();

    let frames: Vec<u64> = detections.iter().map(|d| d.frame_id).collect();
    assert_eq!(frames, vec![30, 60]);
    // Dropped rows still count towards the total.
    assert_eq!(state.skips(), vec![0]);
}

#[tokio::test]
async fn eager_overlay_keeps_valid_rows_next_to_malformed_ones() {
    let (base, _state) = backend().await;
    let backend: Arc<dyn OverlayBackend> = api_for(&base);
    let mut provider = EagerProvider::spawn(backend, MIXED_CAMERA, CancellationToken::new());

    tokio::time::timeout(Duration::from_secs(2), async {
        while !provider.is_ready() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("listing did not load");

    assert_eq!(provider.detections_for(30)[0].display_class(), "car");
    assert_eq!(provider.detections_for(60)[0].display_class(), "truck");
    assert!(provider.detections_for(45).is_empty());
}

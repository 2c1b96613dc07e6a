#![cfg(feature = "api")]

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::util::ServiceExt;

use capacity_planner::api::{AppState, router};
use capacity_planner::runner;

use common::small_config;

fn state() -> Arc<AppState> {
    let mut cfg = small_config(6);
    cfg.sensitivity.enabled = true;
    cfg.sensitivity.co2_limits_mt = vec![100.0, 10.0];
    Arc::new(AppState::new(runner::run(&cfg).expect("scenario solves")))
}

async fn get(state: Arc<AppState>, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn all_endpoints_respond() {
    let state = state();

    let (status, summary) = get(state.clone(), "/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["snapshots"], 6);

    let (status, capacities) = get(state.clone(), "/capacities").await;
    assert_eq!(status, StatusCode::OK);
    let rows = capacities.as_array().unwrap();
    assert!(rows.iter().any(|r| r["component"] == "StorageUnit"));

    let (status, dispatch) = get(state.clone(), "/dispatch").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dispatch.as_array().unwrap().len(), 6);

    let (status, sweep) = get(state, "/sensitivity").await;
    assert_eq!(status, StatusCode::OK);
    let points = sweep["points"].as_array().unwrap();
    assert_eq!(points[0]["co2_limit_mt"], 10.0);
    assert_eq!(points[1]["co2_limit_mt"], 100.0);
}

#[tokio::test]
async fn dispatch_range_past_end_is_empty() {
    let (status, dispatch) = get(state(), "/dispatch?from=50&to=60").await;
    assert_eq!(status, StatusCode::OK);
    assert!(dispatch.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_route_is_404() {
    let req = Request::builder().uri("/state").body(Body::empty()).unwrap();
    let resp = router(state()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

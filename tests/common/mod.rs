//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use capacity_planner::config::ScenarioConfig;

/// Absolute path of a file under `tests/data`.
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Absolute path of a scenario file under `scenarios/`.
pub fn scenario(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(name)
}

/// Quick preset cut to `snapshots` snapshots (6 h each).
pub fn small_config(snapshots: usize) -> ScenarioConfig {
    let mut cfg = ScenarioConfig::quick();
    cfg.model.max_snapshots = Some(snapshots);
    cfg
}

/// Asserts `a` and `b` agree to within `tol` relative to their magnitude.
pub fn assert_close(a: f64, b: f64, tol: f64) {
    let scale = a.abs().max(b.abs()).max(1.0);
    assert!(
        (a - b).abs() <= tol * scale,
        "expected {a} ≈ {b} (tol {tol})"
    );
}

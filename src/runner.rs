//! End-to-end planning run: load inputs, build, solve, summarise, sweep.

use serde::Serialize;
use tracing::info;

use crate::config::ScenarioConfig;
use crate::data::{CostTable, TimeSeries, synthetic};
use crate::error::{DataError, PlannerError};
use crate::model::{OptimizedNetwork, SensitivityTable, Statistics, build_network, co2_sweep, optimize};

/// Everything produced by one planning run.
#[derive(Debug, Clone, Serialize)]
pub struct PlanningRun {
    pub scenario: String,
    pub co2_limit_mt: f64,
    pub transmission_cost: f64,
    pub statistics: Statistics,
    pub result: OptimizedNetwork,
    pub sensitivity: Option<SensitivityTable>,
}

/// Loads the configured cost table, or the embedded one.
///
/// # Errors
///
/// Returns a `DataError` if the file cannot be read or parsed.
pub fn load_costs(cfg: &ScenarioConfig) -> Result<CostTable, DataError> {
    match &cfg.costs.path {
        Some(path) => CostTable::from_path(path),
        None => CostTable::embedded_2030(),
    }
}

/// Loads or synthesises the time series, resampled to the model resolution.
///
/// # Errors
///
/// Returns a `DataError` if the file cannot be read or parsed, or if no
/// snapshots remain.
pub fn load_time_series(cfg: &ScenarioConfig) -> Result<TimeSeries, DataError> {
    let raw = match &cfg.time_series.path {
        Some(path) => TimeSeries::from_csv_path(path)?,
        None => synthetic::generate(&cfg.time_series.synthetic),
    };
    let mut series = raw.resample_first(cfg.model.resolution_hours)?;
    if let Some(n) = cfg.model.max_snapshots {
        series.truncate(n);
    }
    if series.is_empty() {
        return Err(DataError::Invalid("time series has no snapshots".to_string()));
    }
    Ok(series)
}

/// Runs the full pipeline for a validated scenario.
///
/// The sweep runs when `cfg.sensitivity.enabled` is set; its failures are
/// recorded per point and never abort the run.
///
/// # Errors
///
/// Returns a `PlannerError` if inputs cannot be loaded, the network is
/// inconsistent or the main solve fails.
pub fn run(cfg: &ScenarioConfig) -> Result<PlanningRun, PlannerError> {
    let costs = load_costs(cfg)?;
    let series = load_time_series(cfg)?;
    info!(
        scenario = %cfg.name,
        snapshots = series.len(),
        resolution_hours = cfg.model.resolution_hours,
        technologies = costs.len(),
        "inputs loaded"
    );

    let network = build_network(cfg, &costs, &series)?;
    let result = optimize(&network)?;
    let statistics = Statistics::from_results(&result);

    let sensitivity = cfg
        .sensitivity
        .enabled
        .then(|| co2_sweep(&network, &cfg.sensitivity.co2_limits_mt));

    Ok(PlanningRun {
        scenario: cfg.name.clone(),
        co2_limit_mt: cfg.model.co2_limit_mt,
        transmission_cost: cfg.model.transmission_cost,
        statistics,
        result,
        sensitivity,
    })
}

//! CO₂ cap sweep: re-solve the network for a list of limits.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{info, warn};

use super::network::Network;
use super::optimize::optimize;
use super::statistics::system_cost;

const TONNES_PER_MT: f64 = 1e6;

/// Result of one sweep point.
#[derive(Debug, Clone, Serialize)]
pub struct SensitivityPoint {
    pub co2_limit_mt: f64,
    /// bn €/a per carrier; empty when the solve failed.
    pub system_cost_bn: BTreeMap<String, f64>,
    /// Total annualised cost (bn €/a).
    pub total_cost_bn: Option<f64>,
    pub emissions_mt: Option<f64>,
    /// Solver or model error, if the point failed.
    pub error: Option<String>,
}

impl SensitivityPoint {
    pub fn is_solved(&self) -> bool {
        self.error.is_none()
    }
}

/// Sweep results ordered by CO₂ limit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SensitivityTable {
    pub points: Vec<SensitivityPoint>,
}

impl SensitivityTable {
    /// Union of carriers over all solved points, sorted by name.
    pub fn carriers(&self) -> Vec<String> {
        let set: BTreeSet<&String> = self
            .points
            .iter()
            .flat_map(|p| p.system_cost_bn.keys())
            .collect();
        set.into_iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Re-solves `network` once per CO₂ limit (Mt/a).
///
/// The input network is left untouched. Limits are evaluated in ascending
/// order; duplicates are evaluated once. A point that fails is recorded with
/// its error message and the sweep moves on.
pub fn co2_sweep(network: &Network, limits_mt: &[f64]) -> SensitivityTable {
    let mut limits: Vec<f64> = limits_mt.to_vec();
    limits.sort_by(f64::total_cmp);
    limits.dedup();

    let mut net = network.clone();
    let points = limits
        .into_iter()
        .map(|limit| {
            net.set_co2_limit(limit * TONNES_PER_MT);
            match optimize(&net) {
                Ok(result) => {
                    let costs = system_cost(&result);
                    info!(
                        co2_limit_mt = limit,
                        total_cost_bn = result.objective / 1e9,
                        "sensitivity point solved"
                    );
                    SensitivityPoint {
                        co2_limit_mt: limit,
                        system_cost_bn: costs,
                        total_cost_bn: Some(result.objective / 1e9),
                        emissions_mt: Some(result.emissions_t / TONNES_PER_MT),
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(co2_limit_mt = limit, error = %e, "sensitivity point failed");
                    SensitivityPoint {
                        co2_limit_mt: limit,
                        system_cost_bn: BTreeMap::new(),
                        total_cost_bn: None,
                        emissions_mt: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        })
        .collect();

    SensitivityTable { points }
}

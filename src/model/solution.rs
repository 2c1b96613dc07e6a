//! Optimal values extracted from a solved network.

use serde::Serialize;

use super::network::Network;

#[derive(Debug, Clone, Serialize)]
pub struct GeneratorResult {
    pub name: String,
    pub bus: String,
    pub carrier: String,
    /// Optimal capacity (MW).
    pub p_nom_opt: f64,
    /// Output per snapshot (MW).
    pub p: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageResult {
    pub name: String,
    pub bus: String,
    pub carrier: String,
    /// Optimal power capacity (MW).
    pub p_nom_opt: f64,
    pub max_hours: f64,
    /// Charging power per snapshot (MW, >= 0).
    pub p_store: Vec<f64>,
    /// Discharging power per snapshot (MW, >= 0).
    pub p_dispatch: Vec<f64>,
    /// Energy content at the end of each snapshot (MWh).
    pub state_of_charge: Vec<f64>,
}

impl StorageResult {
    /// Optimal energy capacity (MWh).
    pub fn energy_capacity_mwh(&self) -> f64 {
        self.p_nom_opt * self.max_hours
    }

    /// Net injection into the bus per snapshot (MW; negative while charging).
    pub fn net_p(&self) -> Vec<f64> {
        self.p_dispatch
            .iter()
            .zip(&self.p_store)
            .map(|(d, s)| d - s)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LineResult {
    pub name: String,
    pub bus0: String,
    pub bus1: String,
    /// Optimal capacity (MW).
    pub s_nom_opt: f64,
    /// Flow from `bus0` to `bus1` per snapshot (MW).
    pub flow: Vec<f64>,
}

/// A network together with its optimal capacities and dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizedNetwork {
    pub network: Network,
    pub generators: Vec<GeneratorResult>,
    pub storage_units: Vec<StorageResult>,
    pub lines: Vec<LineResult>,
    /// Total annualised system cost (€/a).
    pub objective: f64,
    /// Weighted CO₂ emissions (t).
    pub emissions_t: f64,
}

impl OptimizedNetwork {
    pub fn generator(&self, name: &str) -> Option<&GeneratorResult> {
        self.generators.iter().find(|g| g.name == name)
    }

    pub fn storage_unit(&self, name: &str) -> Option<&StorageResult> {
        self.storage_units.iter().find(|s| s.name == name)
    }

    pub fn line(&self, name: &str) -> Option<&LineResult> {
        self.lines.iter().find(|l| l.name == name)
    }
}

//! API response and query types.
//!
//! Units follow the CSV exports: GW for dispatch, MW and GWh for capacities,
//! bn €/a for costs, Mt/a for emissions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::statistics::BalanceRow;
use crate::runner::PlanningRun;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Headline figures of the run.
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub scenario: String,
    /// Requested CO₂ cap (Mt/a).
    pub co2_limit_mt: f64,
    /// Line capital cost input (€/MW/km/a).
    pub transmission_cost: f64,
    pub snapshots: usize,
    pub weighting_hours: f64,
    /// Total annualised system cost (bn €/a).
    pub total_cost_bn: f64,
    /// Average cost of served demand (€/MWh).
    pub average_cost_eur_per_mwh: f64,
    /// Mt/a.
    pub emissions_mt: f64,
    /// Whether emissions sit on the cap.
    pub co2_binding: bool,
    /// System cost per carrier (bn €/a).
    pub system_cost_bn: BTreeMap<String, f64>,
}

impl From<&PlanningRun> for SummaryResponse {
    fn from(run: &PlanningRun) -> Self {
        let s = &run.statistics;
        Self {
            scenario: run.scenario.clone(),
            co2_limit_mt: run.co2_limit_mt,
            transmission_cost: run.transmission_cost,
            snapshots: s.snapshots,
            weighting_hours: s.weighting_hours,
            total_cost_bn: s.total_cost_eur / 1e9,
            average_cost_eur_per_mwh: s.average_cost_eur_per_mwh(),
            emissions_mt: s.emissions_t / 1e6,
            co2_binding: s.co2_binding,
            system_cost_bn: s.system_cost_bn.clone(),
        }
    }
}

/// One snapshot of the energy balance.
#[derive(Debug, Serialize)]
pub struct DispatchRecord {
    /// Snapshot index.
    pub snapshot: usize,
    /// ISO 8601 timestamp without zone.
    pub timestamp: String,
    /// Net supply per carrier (GW); storage is negative while charging.
    pub supply_gw: BTreeMap<String, f64>,
    pub load_gw: f64,
}

impl DispatchRecord {
    pub fn new(snapshot: usize, row: &BalanceRow) -> Self {
        Self {
            snapshot,
            timestamp: row.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            supply_gw: row.supply_gw.clone(),
            load_gw: row.load_gw,
        }
    }
}

/// Optional range query parameters for the dispatch endpoint.
#[derive(Debug, Deserialize)]
pub struct DispatchQuery {
    /// First snapshot (inclusive).
    pub from: Option<usize>,
    /// Last snapshot (inclusive).
    pub to: Option<usize>,
}

/// Error response body for 4xx errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn dispatch_record_formats_timestamp() {
        let ts = NaiveDate::from_ymd_opt(2015, 3, 1)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .expect("valid timestamp");
        let row = BalanceRow {
            timestamp: ts,
            supply_gw: BTreeMap::from([("solar".to_string(), 4.25)]),
            load_gw: 4.25,
        };
        let record = DispatchRecord::new(7, &row);
        assert_eq!(record.snapshot, 7);
        assert_eq!(record.timestamp, "2015-03-01T08:00:00");
        assert_eq!(record.supply_gw["solar"], 4.25);
    }
}

//! Post-hoc cost, capacity and energy-balance statistics of a solved network.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use super::network::LINE_CARRIER;
use super::solution::OptimizedNetwork;

const EUR_PER_BN: f64 = 1e9;
const MW_PER_GW: f64 = 1e3;

/// Relative slack below which the CO₂ cap counts as binding.
const BINDING_TOLERANCE: f64 = 1e-4;

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Annualised investment per carrier (€/a), fixed capacity included. Lines
/// are reported under `AC`.
pub fn capex(result: &OptimizedNetwork) -> BTreeMap<String, f64> {
    let net = &result.network;
    let mut out: BTreeMap<String, f64> = BTreeMap::new();
    for (g, r) in net.generators.iter().zip(&result.generators) {
        *out.entry(g.carrier.clone()).or_default() += g.capital_cost * r.p_nom_opt;
    }
    for (s, r) in net.storage_units.iter().zip(&result.storage_units) {
        *out.entry(s.carrier.clone()).or_default() += s.capital_cost * r.p_nom_opt;
    }
    for (l, r) in net.lines.iter().zip(&result.lines) {
        *out.entry(LINE_CARRIER.to_string()).or_default() += l.capital_cost * r.s_nom_opt;
    }
    out
}

/// Weighted operating cost per carrier (€/a).
pub fn opex(result: &OptimizedNetwork) -> BTreeMap<String, f64> {
    let net = &result.network;
    let w = net.objective_weighting;
    let mut out: BTreeMap<String, f64> = BTreeMap::new();
    for (g, r) in net.generators.iter().zip(&result.generators) {
        *out.entry(g.carrier.clone()).or_default() +=
            w * g.marginal_cost * r.p.iter().sum::<f64>();
    }
    for (s, r) in net.storage_units.iter().zip(&result.storage_units) {
        *out.entry(s.carrier.clone()).or_default() +=
            w * s.marginal_cost * r.p_dispatch.iter().sum::<f64>();
    }
    out
}

/// Capex plus opex per carrier in bn €/a, rounded to two decimals.
pub fn system_cost(result: &OptimizedNetwork) -> BTreeMap<String, f64> {
    let mut total = capex(result);
    for (carrier, cost) in opex(result) {
        *total.entry(carrier).or_default() += cost;
    }
    total
        .into_iter()
        .map(|(carrier, eur)| (carrier, round2(eur / EUR_PER_BN)))
        .collect()
}

/// Optimal capacity of one component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityRow {
    /// `Generator`, `StorageUnit` or `Line`.
    pub component: &'static str,
    pub name: String,
    pub carrier: String,
    /// Bus, or `bus0-bus1` for lines.
    pub bus: String,
    pub p_nom_opt_mw: f64,
    /// Storage energy capacity (GWh); `None` for other components.
    pub energy_gwh: Option<f64>,
}

/// Optimal capacities of all components in network order.
pub fn capacities(result: &OptimizedNetwork) -> Vec<CapacityRow> {
    let gens = result.generators.iter().map(|g| CapacityRow {
        component: "Generator",
        name: g.name.clone(),
        carrier: g.carrier.clone(),
        bus: g.bus.clone(),
        p_nom_opt_mw: g.p_nom_opt,
        energy_gwh: None,
    });
    let storage = result.storage_units.iter().map(|s| CapacityRow {
        component: "StorageUnit",
        name: s.name.clone(),
        carrier: s.carrier.clone(),
        bus: s.bus.clone(),
        p_nom_opt_mw: s.p_nom_opt,
        energy_gwh: Some(s.energy_capacity_mwh() / MW_PER_GW),
    });
    let lines = result.lines.iter().map(|l| CapacityRow {
        component: "Line",
        name: l.name.clone(),
        carrier: LINE_CARRIER.to_string(),
        bus: format!("{}-{}", l.bus0, l.bus1),
        p_nom_opt_mw: l.s_nom_opt,
        energy_gwh: None,
    });
    gens.chain(storage).chain(lines).collect()
}

/// Supply by carrier in one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceRow {
    pub timestamp: NaiveDateTime,
    /// GW per carrier; storage is signed (negative while charging).
    pub supply_gw: BTreeMap<String, f64>,
    pub load_gw: f64,
}

/// System-wide energy balance per snapshot (GW).
pub fn energy_balance(result: &OptimizedNetwork) -> Vec<BalanceRow> {
    let net = &result.network;
    let load = net.total_load();
    net.snapshots
        .iter()
        .enumerate()
        .map(|(t, ts)| {
            let mut supply: BTreeMap<String, f64> = BTreeMap::new();
            for g in &result.generators {
                *supply.entry(g.carrier.clone()).or_default() += g.p[t] / MW_PER_GW;
            }
            for s in &result.storage_units {
                *supply.entry(s.carrier.clone()).or_default() +=
                    (s.p_dispatch[t] - s.p_store[t]) / MW_PER_GW;
            }
            BalanceRow {
                timestamp: *ts,
                supply_gw: supply,
                load_gw: load[t] / MW_PER_GW,
            }
        })
        .collect()
}

/// Headline figures of a solved network.
#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub snapshots: usize,
    pub weighting_hours: f64,
    /// Total annualised cost (€/a).
    pub total_cost_eur: f64,
    /// Per carrier, bn €/a.
    pub system_cost_bn: BTreeMap<String, f64>,
    /// Annual emissions when the network is annualised (t).
    pub emissions_t: f64,
    pub co2_limit_t: Option<f64>,
    pub co2_binding: bool,
    /// Demand weighted like the objective (MWh/a when annualised).
    pub load_mwh: f64,
    pub capacities: Vec<CapacityRow>,
}

impl Statistics {
    /// Computes all statistics from a solved network.
    pub fn from_results(result: &OptimizedNetwork) -> Self {
        let net = &result.network;
        let co2_limit_t = net.co2_limit();
        let co2_binding = co2_limit_t.is_some_and(|limit| {
            result.emissions_t >= limit - BINDING_TOLERANCE * limit.max(1.0)
        });
        Self {
            snapshots: net.snapshot_count(),
            weighting_hours: net.weighting_hours,
            total_cost_eur: result.objective,
            system_cost_bn: system_cost(result),
            emissions_t: result.emissions_t,
            co2_limit_t,
            co2_binding,
            load_mwh: net.total_load().iter().sum::<f64>() * net.objective_weighting,
            capacities: capacities(result),
        }
    }

    /// Total cost per unit of served demand (€/MWh).
    pub fn average_cost_eur_per_mwh(&self) -> f64 {
        if self.load_mwh > 0.0 {
            self.total_cost_eur / self.load_mwh
        } else {
            0.0
        }
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- System Report ---")?;
        writeln!(
            f,
            "Snapshots:             {} x {:.0} h",
            self.snapshots, self.weighting_hours
        )?;
        writeln!(
            f,
            "Total system cost:     {:.2} bn EUR/a ({:.2} EUR/MWh)",
            self.total_cost_eur / EUR_PER_BN,
            self.average_cost_eur_per_mwh()
        )?;
        match self.co2_limit_t {
            Some(limit) => writeln!(
                f,
                "CO2 emissions:         {:.2} Mt/a (limit {:.2} Mt/a{})",
                self.emissions_t / 1e6,
                limit / 1e6,
                if self.co2_binding { ", binding" } else { "" }
            )?,
            None => writeln!(f, "CO2 emissions:         {:.2} Mt/a", self.emissions_t / 1e6)?,
        }

        writeln!(f, "\nSystem cost by carrier (bn EUR/a):")?;
        for (carrier, cost) in &self.system_cost_bn {
            writeln!(f, "  {carrier:<30} {cost:>8.2}")?;
        }

        writeln!(f, "\nOptimal capacities:")?;
        for row in &self.capacities {
            match row.energy_gwh {
                Some(gwh) => writeln!(
                    f,
                    "  {:<30} {:>12.1} MW {:>10.2} GWh",
                    row.name, row.p_nom_opt_mw, gwh
                )?,
                None => writeln!(f, "  {:<30} {:>12.1} MW", row.name, row.p_nom_opt_mw)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::network::{Generator, Line, Network, StorageUnit};
    use crate::model::solution::{GeneratorResult, LineResult, StorageResult};
    use chrono::NaiveDate;

    fn solved() -> OptimizedNetwork {
        let t0 = NaiveDate::from_ymd_opt(2015, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        let mut net = Network::new(vec![t0, t0 + chrono::TimeDelta::hours(4)], 4.0);
        net.add_bus("a");
        net.add_bus("b");
        net.add_carrier("OCGT", 0.2);
        net.add_carrier("battery storage", 0.0);
        net.add_load("demand", "a", vec![1000.0, 2000.0]);
        net.add_generator(Generator {
            name: "OCGT".into(),
            bus: "a".into(),
            carrier: "OCGT".into(),
            p_nom_extendable: true,
            p_max_pu: vec![1.0, 1.0],
            capital_cost: 50_000.0,
            marginal_cost: 60.0,
            efficiency: 0.4,
            ..Generator::default()
        });
        net.add_storage_unit(StorageUnit {
            name: "battery storage".into(),
            bus: "a".into(),
            carrier: "battery storage".into(),
            p_nom_extendable: true,
            max_hours: 6.0,
            capital_cost: 100_000.0,
            ..StorageUnit::default()
        });
        net.add_line(Line {
            name: "a-b".into(),
            bus0: "a".into(),
            bus1: "b".into(),
            length_km: 10.0,
            s_nom: 0.0,
            s_nom_extendable: true,
            s_nom_min: 0.0,
            capital_cost: 5000.0,
        });
        net.set_co2_limit(2400.0);

        OptimizedNetwork {
            network: net,
            generators: vec![GeneratorResult {
                name: "OCGT".into(),
                bus: "a".into(),
                carrier: "OCGT".into(),
                p_nom_opt: 2000.0,
                p: vec![1500.0, 1500.0],
            }],
            storage_units: vec![StorageResult {
                name: "battery storage".into(),
                bus: "a".into(),
                carrier: "battery storage".into(),
                p_nom_opt: 500.0,
                max_hours: 6.0,
                p_store: vec![500.0, 0.0],
                p_dispatch: vec![0.0, 500.0],
                state_of_charge: vec![2000.0, 0.0],
            }],
            lines: vec![LineResult {
                name: "a-b".into(),
                bus0: "a".into(),
                bus1: "b".into(),
                s_nom_opt: 100.0,
                flow: vec![0.0, 0.0],
            }],
            objective: 100e6 + 50e6 + 0.5e6 + 720_000.0,
            emissions_t: 2400.0,
        }
    }

    #[test]
    fn capex_and_opex_by_carrier() {
        let r = solved();
        let capex = capex(&r);
        assert_eq!(capex.get("OCGT"), Some(&100e6));
        assert_eq!(capex.get("battery storage"), Some(&50e6));
        assert_eq!(capex.get(LINE_CARRIER), Some(&0.5e6));
        let opex = opex(&r);
        // 4 h * 60 EUR/MWh * 3000 MW
        assert_eq!(opex.get("OCGT"), Some(&720_000.0));
    }

    #[test]
    fn fixed_capacity_is_charged_in_capex() {
        let mut r = solved();
        r.network.lines[0].s_nom_extendable = false;
        r.network.lines[0].s_nom = 100.0;
        r.network.generators[0].p_nom_extendable = false;
        r.network.generators[0].p_nom = 2000.0;
        let capex = capex(&r);
        assert_eq!(capex.get(LINE_CARRIER), Some(&0.5e6));
        assert_eq!(capex.get("OCGT"), Some(&100e6));
    }

    #[test]
    fn annualised_network_reports_yearly_opex_and_load() {
        let mut r = solved();
        r.network.annualise(8760.0);
        assert_eq!(r.network.objective_weighting, 4380.0);
        assert_eq!(opex(&r).get("OCGT"), Some(&(4380.0 * 60.0 * 3000.0)));
        let stats = Statistics::from_results(&r);
        assert_eq!(stats.load_mwh, 3000.0 * 4380.0);
        assert_eq!(stats.weighting_hours, 4.0);
    }

    #[test]
    fn system_cost_is_rounded_billions() {
        let costs = system_cost(&solved());
        assert_eq!(costs.get("OCGT"), Some(&0.1));
        assert_eq!(costs.get("battery storage"), Some(&0.05));
        assert_eq!(costs.get(LINE_CARRIER), Some(&0.0));
    }

    #[test]
    fn storage_capacity_in_gwh() {
        let rows = capacities(&solved());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].energy_gwh, Some(3.0));
        assert_eq!(rows[2].bus, "a-b");
    }

    #[test]
    fn balance_signs_storage() {
        let rows = energy_balance(&solved());
        assert_eq!(rows[0].supply_gw.get("battery storage"), Some(&-0.5));
        assert_eq!(rows[1].supply_gw.get("battery storage"), Some(&0.5));
        assert_eq!(rows[1].load_gw, 2.0);
    }

    #[test]
    fn binding_limit_is_detected() {
        let stats = Statistics::from_results(&solved());
        assert!(stats.co2_binding);
        assert_eq!(stats.load_mwh, 12_000.0);
        let report = stats.to_string();
        assert!(report.contains("System Report"));
        assert!(report.contains("binding"));
    }
}

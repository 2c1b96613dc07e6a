//! Linear capacity-expansion and dispatch problem.
//!
//! One LP co-optimises investment and operation over all snapshots:
//!
//! - generators: `0 <= p[g,t] <= p_max_pu[g,t] * p_nom[g]`
//! - storage: `p_store, p_dispatch <= p_nom[s]`, `soc <= max_hours * p_nom[s]`,
//!   `soc[t] = soc[t-1] + w * (eta_store * p_store - p_dispatch / eta_dispatch)`
//! - lines: `-s_nom <= flow <= s_nom` (transport model)
//! - nodal balance: generation + dispatch - store + inflow - outflow = load
//! - CO₂: `sum_t w_obj * sum_g p[g,t] / eff[g] * co2[carrier] <= limit`
//!
//! The objective is annualised capital cost plus marginal cost weighted by
//! `w_obj`, the objective weighting. Storage dynamics use the snapshot
//! length `w`.

use std::time::Instant;

use good_lp::{
    Constraint, Expression, Solution, SolverModel, Variable, constraint, default_solver, variable,
    variables,
};
use tracing::{debug, info};

use crate::error::{PlannerError, SolveError};

use super::network::Network;
use super::solution::{GeneratorResult, LineResult, OptimizedNetwork, StorageResult};

/// Capacity variable fixed at `p_nom`, or bounded by `[p_nom_min, p_nom_max]`
/// when extendable.
fn capacity_variable(
    vars: &mut good_lp::ProblemVariables,
    p_nom: f64,
    extendable: bool,
    p_nom_min: f64,
    p_nom_max: f64,
) -> Variable {
    let def = if !extendable {
        variable().min(p_nom).max(p_nom)
    } else if p_nom_max.is_finite() {
        variable().min(p_nom_min).max(p_nom_max)
    } else {
        variable().min(p_nom_min)
    };
    vars.add(def)
}

struct GeneratorVars {
    p_nom: Variable,
    p: Vec<Variable>,
}

struct StorageVars {
    p_nom: Variable,
    p_store: Vec<Variable>,
    p_dispatch: Vec<Variable>,
    soc: Vec<Variable>,
}

struct LineVars {
    s_nom: Variable,
    flow: Vec<Variable>,
}

/// Emitted tonnes per MWh of electrical output.
fn emission_factor(network: &Network, carrier: &str, efficiency: f64) -> f64 {
    network.carrier_co2(carrier) / efficiency
}

/// Solves the capacity-expansion problem for `network`.
///
/// # Errors
///
/// Returns `PlannerError::Model` if the network fails validation and
/// `PlannerError::Solve` if the LP is infeasible, unbounded or the solver
/// fails.
pub fn optimize(network: &Network) -> Result<OptimizedNetwork, PlannerError> {
    network.validate()?;
    let started = Instant::now();
    let n = network.snapshot_count();
    let w = network.weighting_hours;
    let w_obj = network.objective_weighting;

    let mut vars = variables!();
    let mut objective = Expression::from(0.0);
    let mut constraints: Vec<Constraint> = Vec::new();
    let mut variable_count = 0usize;

    let gen_vars: Vec<GeneratorVars> = network
        .generators
        .iter()
        .map(|g| {
            let p_nom = capacity_variable(
                &mut vars,
                g.p_nom,
                g.p_nom_extendable,
                g.p_nom_min,
                g.p_nom_max,
            );
            let p: Vec<Variable> = (0..n).map(|_| vars.add(variable().min(0.0))).collect();
            variable_count += 1 + n;
            if g.p_nom_extendable {
                objective += g.capital_cost * p_nom;
            }
            for (t, pt) in p.iter().enumerate() {
                objective += w_obj * g.marginal_cost * *pt;
                constraints.push(constraint!(*pt - g.p_max_pu[t] * p_nom <= 0.0));
            }
            GeneratorVars { p_nom, p }
        })
        .collect();

    let storage_vars: Vec<StorageVars> = network
        .storage_units
        .iter()
        .map(|s| {
            let p_nom = capacity_variable(
                &mut vars,
                s.p_nom,
                s.p_nom_extendable,
                s.p_nom_min,
                f64::INFINITY,
            );
            let p_store: Vec<Variable> = (0..n).map(|_| vars.add(variable().min(0.0))).collect();
            let p_dispatch: Vec<Variable> =
                (0..n).map(|_| vars.add(variable().min(0.0))).collect();
            let soc: Vec<Variable> = (0..n).map(|_| vars.add(variable().min(0.0))).collect();
            variable_count += 1 + 3 * n;
            if s.p_nom_extendable {
                objective += s.capital_cost * p_nom;
            }
            for t in 0..n {
                objective += w_obj * s.marginal_cost * p_dispatch[t];
                constraints.push(constraint!(p_store[t] - p_nom <= 0.0));
                constraints.push(constraint!(p_dispatch[t] - p_nom <= 0.0));
                constraints.push(constraint!(soc[t] - s.max_hours * p_nom <= 0.0));

                let inflow = w * s.efficiency_store * p_store[t];
                let outflow = (w / s.efficiency_dispatch) * p_dispatch[t];
                if t > 0 {
                    constraints.push(constraint!(soc[t] - soc[t - 1] - inflow + outflow == 0.0));
                } else if s.cyclic_state_of_charge {
                    constraints.push(constraint!(soc[0] - soc[n - 1] - inflow + outflow == 0.0));
                } else {
                    constraints.push(constraint!(
                        soc[0] - inflow + outflow == s.state_of_charge_initial
                    ));
                }
            }
            StorageVars {
                p_nom,
                p_store,
                p_dispatch,
                soc,
            }
        })
        .collect();

    let line_vars: Vec<LineVars> = network
        .lines
        .iter()
        .map(|l| {
            let s_nom = capacity_variable(
                &mut vars,
                l.s_nom,
                l.s_nom_extendable,
                l.s_nom_min,
                f64::INFINITY,
            );
            let flow: Vec<Variable> = (0..n).map(|_| vars.add(variable())).collect();
            variable_count += 1 + n;
            if l.s_nom_extendable {
                objective += l.capital_cost * s_nom;
            }
            for f in &flow {
                constraints.push(constraint!(*f - s_nom <= 0.0));
                constraints.push(constraint!(*f + s_nom >= 0.0));
            }
            LineVars { s_nom, flow }
        })
        .collect();

    for bus in &network.buses {
        for t in 0..n {
            let mut balance = Expression::from(0.0);
            let mut terms = 0usize;
            for (g, gv) in network.generators.iter().zip(&gen_vars) {
                if g.bus == bus.name {
                    balance += gv.p[t];
                    terms += 1;
                }
            }
            for (s, sv) in network.storage_units.iter().zip(&storage_vars) {
                if s.bus == bus.name {
                    balance += sv.p_dispatch[t];
                    balance -= sv.p_store[t];
                    terms += 1;
                }
            }
            for (l, lv) in network.lines.iter().zip(&line_vars) {
                if l.bus1 == bus.name {
                    balance += lv.flow[t];
                    terms += 1;
                } else if l.bus0 == bus.name {
                    balance -= lv.flow[t];
                    terms += 1;
                }
            }
            let demand: f64 = network
                .loads
                .iter()
                .filter(|l| l.bus == bus.name)
                .map(|l| l.p_set[t])
                .sum();

            if terms == 0 {
                if demand.abs() > 0.0 {
                    debug!(bus = %bus.name, snapshot = t, demand, "bus has demand but no supply");
                    return Err(SolveError::Infeasible.into());
                }
                continue;
            }
            constraints.push(constraint!(balance == demand));
        }
    }

    let mut emitters = 0usize;
    if let Some(limit) = network.co2_limit() {
        let mut emissions = Expression::from(0.0);
        for (g, gv) in network.generators.iter().zip(&gen_vars) {
            let factor = emission_factor(network, &g.carrier, g.efficiency);
            if factor > 0.0 {
                emitters += 1;
                for pt in &gv.p {
                    emissions += w_obj * factor * *pt;
                }
            }
        }
        if emitters > 0 {
            constraints.push(constraint!(emissions <= limit));
        }
    }

    info!(
        snapshots = n,
        variables = variable_count,
        constraints = constraints.len(),
        co2_limit_t = network.co2_limit(),
        "solving capacity expansion"
    );

    let mut model = vars.minimise(objective).using(default_solver);
    for c in constraints {
        model = model.with(c);
    }
    let solution = model.solve().map_err(SolveError::from)?;

    let values = |vs: &[Variable]| -> Vec<f64> { vs.iter().map(|v| solution.value(*v)).collect() };

    let generators: Vec<GeneratorResult> = network
        .generators
        .iter()
        .zip(&gen_vars)
        .map(|(g, gv)| GeneratorResult {
            name: g.name.clone(),
            bus: g.bus.clone(),
            carrier: g.carrier.clone(),
            p_nom_opt: solution.value(gv.p_nom),
            p: values(&gv.p),
        })
        .collect();

    let storage_units: Vec<StorageResult> = network
        .storage_units
        .iter()
        .zip(&storage_vars)
        .map(|(s, sv)| StorageResult {
            name: s.name.clone(),
            bus: s.bus.clone(),
            carrier: s.carrier.clone(),
            p_nom_opt: solution.value(sv.p_nom),
            max_hours: s.max_hours,
            p_store: values(&sv.p_store),
            p_dispatch: values(&sv.p_dispatch),
            state_of_charge: values(&sv.soc),
        })
        .collect();

    let lines: Vec<LineResult> = network
        .lines
        .iter()
        .zip(&line_vars)
        .map(|(l, lv)| LineResult {
            name: l.name.clone(),
            bus0: l.bus0.clone(),
            bus1: l.bus1.clone(),
            s_nom_opt: solution.value(lv.s_nom),
            flow: values(&lv.flow),
        })
        .collect();

    let mut result = OptimizedNetwork {
        network: network.clone(),
        generators,
        storage_units,
        lines,
        objective: 0.0,
        emissions_t: 0.0,
    };
    result.objective = objective_value(&result);
    result.emissions_t = emissions(&result);

    info!(
        objective_eur = result.objective,
        emissions_t = result.emissions_t,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "solved"
    );
    Ok(result)
}

/// Total system cost of the extracted solution (€/a).
///
/// Fixed capacity is a constant in the LP; it is charged here at its capital
/// cost so the total matches the per-carrier statistics.
fn objective_value(result: &OptimizedNetwork) -> f64 {
    let net = &result.network;
    let w = net.objective_weighting;
    let mut total = 0.0;
    for (g, r) in net.generators.iter().zip(&result.generators) {
        total += g.capital_cost * r.p_nom_opt;
        total += w * g.marginal_cost * r.p.iter().sum::<f64>();
    }
    for (s, r) in net.storage_units.iter().zip(&result.storage_units) {
        total += s.capital_cost * r.p_nom_opt;
        total += w * s.marginal_cost * r.p_dispatch.iter().sum::<f64>();
    }
    for (l, r) in net.lines.iter().zip(&result.lines) {
        total += l.capital_cost * r.s_nom_opt;
    }
    total
}

/// Weighted CO₂ emissions of the dispatch (t).
fn emissions(result: &OptimizedNetwork) -> f64 {
    let net = &result.network;
    net.generators
        .iter()
        .zip(&result.generators)
        .map(|(g, r)| {
            emission_factor(net, &g.carrier, g.efficiency)
                * net.objective_weighting
                * r.p.iter().sum::<f64>()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::network::{Generator, Line, StorageUnit};
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

    const TOL: f64 = 1e-3;

    fn snapshots(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2015, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        (0..n).map(|h| start + TimeDelta::hours(h as i64)).collect()
    }

    fn gas(name: &str, bus: &str, n: usize) -> Generator {
        Generator {
            name: name.into(),
            bus: bus.into(),
            carrier: "gas".into(),
            p_nom_extendable: true,
            p_max_pu: vec![1.0; n],
            capital_cost: 1000.0,
            marginal_cost: 50.0,
            efficiency: 0.5,
            ..Generator::default()
        }
    }

    fn gas_only(load: Vec<f64>) -> Network {
        let n = load.len();
        let mut net = Network::new(snapshots(n), 1.0);
        net.add_bus("el");
        net.add_carrier("gas", 0.2);
        net.add_load("demand", "el", load);
        net.add_generator(gas("gas", "el", n));
        net
    }

    #[test]
    fn gas_capacity_matches_peak_load() {
        let result = optimize(&gas_only(vec![100.0, 60.0, 80.0])).expect("solves");
        let g = result.generator("gas").expect("gas result");
        assert!((g.p_nom_opt - 100.0).abs() < TOL);
        assert!((g.p[1] - 60.0).abs() < TOL);
        // 1000 * 100 + 50 * 240
        assert!((result.objective - 112_000.0).abs() < 1.0);
        // 240 MWh / 0.5 * 0.2
        assert!((result.emissions_t - 96.0).abs() < TOL);
    }

    #[test]
    fn zero_co2_limit_without_clean_supply_is_infeasible() {
        let mut net = gas_only(vec![10.0, 10.0]);
        net.set_co2_limit(0.0);
        let err = optimize(&net).expect_err("must be infeasible");
        assert!(matches!(err, PlannerError::Solve(SolveError::Infeasible)));
    }

    #[test]
    fn co2_limit_shifts_supply_to_clean_generator() {
        let mut net = gas_only(vec![10.0, 10.0]);
        net.add_carrier("wind", 0.0);
        net.add_generator(Generator {
            name: "wind".into(),
            bus: "el".into(),
            carrier: "wind".into(),
            p_nom_extendable: true,
            p_max_pu: vec![1.0, 1.0],
            capital_cost: 5000.0,
            ..Generator::default()
        });
        net.set_co2_limit(0.0);
        let result = optimize(&net).expect("solves");
        assert!(result.emissions_t.abs() < TOL);
        let wind = result.generator("wind").expect("wind result");
        assert!((wind.p_nom_opt - 10.0).abs() < TOL);
    }

    #[test]
    fn storage_shifts_energy_between_snapshots() {
        // free solar in the first hour, nothing in the second
        let mut net = Network::new(snapshots(2), 1.0);
        net.add_bus("el");
        net.add_carrier("solar", 0.0);
        net.add_carrier("battery", 0.0);
        net.add_load("demand", "el", vec![0.0, 10.0]);
        net.add_generator(Generator {
            name: "solar".into(),
            bus: "el".into(),
            carrier: "solar".into(),
            p_nom_extendable: true,
            p_max_pu: vec![1.0, 0.0],
            capital_cost: 1.0,
            ..Generator::default()
        });
        net.add_storage_unit(StorageUnit {
            name: "battery".into(),
            bus: "el".into(),
            carrier: "battery".into(),
            p_nom_extendable: true,
            max_hours: 1.0,
            capital_cost: 1.0,
            cyclic_state_of_charge: true,
            ..StorageUnit::default()
        });
        let result = optimize(&net).expect("solves");
        let battery = result.storage_unit("battery").expect("battery result");
        assert!((battery.p_dispatch[1] - 10.0).abs() < TOL);
        assert!((battery.p_store[0] - 10.0).abs() < TOL);
        assert!((battery.state_of_charge[0] - 10.0).abs() < TOL);
        assert!(battery.state_of_charge[1].abs() < TOL);
    }

    #[test]
    fn round_trip_losses_raise_charging() {
        let mut net = Network::new(snapshots(2), 1.0);
        net.add_bus("el");
        net.add_carrier("solar", 0.0);
        net.add_carrier("battery", 0.0);
        net.add_load("demand", "el", vec![0.0, 8.0]);
        net.add_generator(Generator {
            name: "solar".into(),
            bus: "el".into(),
            carrier: "solar".into(),
            p_nom_extendable: true,
            p_max_pu: vec![1.0, 0.0],
            capital_cost: 1.0,
            ..Generator::default()
        });
        net.add_storage_unit(StorageUnit {
            name: "battery".into(),
            bus: "el".into(),
            carrier: "battery".into(),
            p_nom_extendable: true,
            max_hours: 2.0,
            capital_cost: 1.0,
            efficiency_store: 0.8,
            efficiency_dispatch: 0.5,
            cyclic_state_of_charge: true,
            ..StorageUnit::default()
        });
        let result = optimize(&net).expect("solves");
        let battery = result.storage_unit("battery").expect("battery result");
        // 8 MWh out needs 16 MWh stored, which takes 20 MWh in
        assert!((battery.p_store[0] - 20.0).abs() < TOL);
    }

    #[test]
    fn line_carries_cheap_power_to_remote_load() {
        let mut net = Network::new(snapshots(1), 1.0);
        net.add_bus("a");
        net.add_bus("b");
        net.add_carrier("gas", 0.0);
        net.add_load("demand", "b", vec![50.0]);
        let mut cheap = gas("cheap", "a", 1);
        cheap.capital_cost = 10.0;
        net.add_generator(cheap);
        let mut dear = gas("dear", "b", 1);
        dear.capital_cost = 10_000.0;
        net.add_generator(dear);
        net.add_line(Line {
            name: "a-b".into(),
            bus0: "a".into(),
            bus1: "b".into(),
            length_km: 100.0,
            s_nom: 0.0,
            s_nom_extendable: true,
            s_nom_min: 0.0,
            capital_cost: 100.0,
        });
        let result = optimize(&net).expect("solves");
        let line = result.line("a-b").expect("line result");
        assert!((line.s_nom_opt - 50.0).abs() < TOL);
        assert!((line.flow[0] - 50.0).abs() < TOL);
    }

    #[test]
    fn fixed_capacity_is_respected() {
        let mut net = gas_only(vec![30.0]);
        net.generators[0].p_nom_extendable = false;
        net.generators[0].p_nom = 20.0;
        let err = optimize(&net).expect_err("20 MW cannot serve 30 MW");
        assert!(matches!(err, PlannerError::Solve(SolveError::Infeasible)));
    }

    #[test]
    fn extendable_capacity_ignores_p_nom_and_honours_p_nom_min() {
        let mut net = gas_only(vec![10.0]);
        net.generators[0].p_nom = 50.0;
        let result = optimize(&net).expect("solves");
        let g = result.generator("gas").expect("gas result");
        assert!((g.p_nom_opt - 10.0).abs() < TOL);

        net.generators[0].p_nom_min = 30.0;
        let result = optimize(&net).expect("solves");
        let g = result.generator("gas").expect("gas result");
        assert!((g.p_nom_opt - 30.0).abs() < TOL);
    }

    #[test]
    fn objective_weighting_scales_operating_cost_and_emissions() {
        let mut net = gas_only(vec![100.0, 60.0, 80.0]);
        net.objective_weighting = 2.0;
        let result = optimize(&net).expect("solves");
        // 1000 * 100 + 2 * 50 * 240
        assert!((result.objective - 124_000.0).abs() < 1.0);
        assert!((result.emissions_t - 192.0).abs() < TOL);
    }

    #[test]
    fn co2_cap_applies_to_weighted_emissions() {
        let mut net = gas_only(vec![10.0, 10.0]);
        net.add_carrier("wind", 0.0);
        net.add_generator(Generator {
            name: "wind".into(),
            bus: "el".into(),
            carrier: "wind".into(),
            p_nom_extendable: true,
            p_max_pu: vec![1.0, 1.0],
            capital_cost: 5000.0,
            ..Generator::default()
        });
        // unweighted the cap would allow all 20 MWh of gas (8 t)
        net.objective_weighting = 10.0;
        net.set_co2_limit(8.0);
        let result = optimize(&net).expect("solves");
        assert!(result.emissions_t <= 8.0 + TOL);
        let gas = result.generator("gas").expect("gas result");
        assert!((gas.p.iter().sum::<f64>() - 2.0).abs() < TOL);
    }

    #[test]
    fn non_cyclic_storage_starts_from_initial_charge() {
        let mut net = Network::new(snapshots(2), 1.0);
        net.add_bus("el");
        net.add_carrier("battery", 0.0);
        net.add_load("demand", "el", vec![5.0, 5.0]);
        net.add_storage_unit(StorageUnit {
            name: "battery".into(),
            bus: "el".into(),
            carrier: "battery".into(),
            p_nom_extendable: true,
            max_hours: 10.0,
            capital_cost: 1.0,
            cyclic_state_of_charge: false,
            state_of_charge_initial: 10.0,
            ..StorageUnit::default()
        });
        let result = optimize(&net).expect("solves");
        let battery = result.storage_unit("battery").expect("battery result");
        assert!((battery.p_nom_opt - 5.0).abs() < TOL);
        assert!((battery.state_of_charge[0] - 5.0).abs() < TOL);
        assert!(battery.state_of_charge[1].abs() < TOL);

        // a cyclic unit cannot end below where it started
        net.storage_units[0].cyclic_state_of_charge = true;
        let err = optimize(&net).expect_err("no energy source");
        assert!(matches!(err, PlannerError::Solve(SolveError::Infeasible)));
    }

    #[test]
    fn negative_capital_cost_is_unbounded() {
        let mut net = gas_only(vec![10.0]);
        net.generators[0].capital_cost = -1.0;
        let err = optimize(&net).expect_err("capacity pays for itself");
        assert!(matches!(err, PlannerError::Solve(SolveError::Unbounded)));
    }

    #[test]
    fn bus_with_demand_and_no_supply_is_infeasible() {
        let mut net = gas_only(vec![10.0]);
        net.add_bus("island");
        net.add_load("island demand", "island", vec![5.0]);
        let err = optimize(&net).expect_err("island has no supply");
        assert!(matches!(err, PlannerError::Solve(SolveError::Infeasible)));
    }
}

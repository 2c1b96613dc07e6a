//! Assembles a [`Network`] from a scenario, a cost table and time series.

use tracing::{debug, warn};

use crate::config::ScenarioConfig;
use crate::data::{CostTable, TimeSeries};
use crate::error::PlannerError;

use super::network::{Generator, Line, Network, StorageUnit};

/// Energy-to-power ratio of battery storage (h).
pub const BATTERY_MAX_HOURS: f64 = 6.0;
/// Energy-to-power ratio of underground hydrogen storage (h).
pub const HYDROGEN_MAX_HOURS: f64 = 168.0;

/// Hours in the planning year that operating cost and emissions scale to.
pub const HOURS_PER_YEAR: f64 = 8760.0;

const TONNES_PER_MT: f64 = 1e6;

/// Storage parameters combined from several cost-table entries.
struct StorageRecipe {
    max_hours: f64,
    capital_cost: f64,
    efficiency_store: f64,
    efficiency_dispatch: f64,
}

fn storage_recipe(costs: &CostTable, tech: &str) -> Result<StorageRecipe, PlannerError> {
    match tech {
        "battery storage" => {
            let inverter = costs.get("battery inverter")?;
            let storage = costs.get("battery storage")?;
            Ok(StorageRecipe {
                max_hours: BATTERY_MAX_HOURS,
                capital_cost: inverter.capital_cost + BATTERY_MAX_HOURS * storage.capital_cost,
                efficiency_store: inverter.efficiency,
                efficiency_dispatch: inverter.efficiency,
            })
        }
        "hydrogen storage underground" => {
            let electrolysis = costs.get("electrolysis")?;
            let fuel_cell = costs.get("fuel cell")?;
            let cavern = costs.get("hydrogen storage underground")?;
            Ok(StorageRecipe {
                max_hours: HYDROGEN_MAX_HOURS,
                capital_cost: electrolysis.capital_cost
                    + fuel_cell.capital_cost
                    + HYDROGEN_MAX_HOURS * cavern.capital_cost,
                efficiency_store: electrolysis.efficiency,
                efficiency_dispatch: fuel_cell.efficiency,
            })
        }
        other => Err(crate::error::DataError::UnknownTechnology(other.to_string()).into()),
    }
}

/// Component name for a technology in a region. Single-region networks keep
/// the bare technology name.
fn component_name(tech: &str, region: &str, single: bool) -> String {
    if single {
        tech.to_string()
    } else {
        format!("{region} {tech}")
    }
}

/// Clamps capacity factors into `[0, 1]`; returns the number of changed values.
fn clamp_profile(values: &mut [f64]) -> usize {
    let mut changed = 0;
    for v in values.iter_mut() {
        let clamped = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        if clamped != *v {
            changed += 1;
            *v = clamped;
        }
    }
    changed
}

/// Builds the capacity-expansion network for `cfg`.
///
/// Every region becomes a bus with its share of the demand. Each region gets
/// one extendable generator per configured technology (variable when the time
/// series has a profile of that name, otherwise fully available) and one
/// extendable storage unit per configured storage technology. Lines become
/// transport links priced at `transmission_cost * length_km`. The CO₂ cap is
/// set from `model.co2_limit_mt`.
///
/// # Errors
///
/// Returns `PlannerError::Data` if a technology is missing from the cost
/// table, or `PlannerError::Model` if the assembled network is inconsistent.
pub fn build_network(
    cfg: &ScenarioConfig,
    costs: &CostTable,
    series: &TimeSeries,
) -> Result<Network, PlannerError> {
    let mut network = Network::new(series.timestamps.clone(), series.weighting_hours);
    if cfg.model.annualise {
        network.annualise(HOURS_PER_YEAR);
    }
    let single = cfg.regions.len() == 1;

    for tech in cfg.model.generators.iter().chain(&cfg.model.storage) {
        network.add_carrier(tech.as_str(), costs.get(tech)?.co2_intensity);
    }

    let mut clamped = 0;
    for region in &cfg.regions {
        network.add_bus(region.name.as_str());
        network.add_load(
            component_name("demand", &region.name, single),
            region.name.as_str(),
            series.load_mw.iter().map(|p| p * region.load_share).collect(),
        );

        for tech in &cfg.model.generators {
            let c = costs.get(tech)?;
            let availability = region.availability.get(tech).copied().unwrap_or(1.0);
            let p_max_pu = match series.profile(tech) {
                Some(profile) => {
                    let mut values: Vec<f64> = profile.iter().map(|v| v * availability).collect();
                    clamped += clamp_profile(&mut values);
                    values
                }
                None => vec![1.0; series.len()],
            };
            network.add_generator(Generator {
                name: component_name(tech, &region.name, single),
                bus: region.name.clone(),
                carrier: tech.clone(),
                p_nom_extendable: true,
                p_nom_max: region.p_nom_max.get(tech).copied().unwrap_or(f64::INFINITY),
                p_max_pu,
                capital_cost: c.capital_cost,
                marginal_cost: c.marginal_cost,
                efficiency: c.efficiency,
                ..Generator::default()
            });
        }

        for tech in &cfg.model.storage {
            let recipe = storage_recipe(costs, tech)?;
            network.add_storage_unit(StorageUnit {
                name: component_name(tech, &region.name, single),
                bus: region.name.clone(),
                carrier: tech.clone(),
                p_nom_extendable: true,
                max_hours: recipe.max_hours,
                capital_cost: recipe.capital_cost,
                efficiency_store: recipe.efficiency_store,
                efficiency_dispatch: recipe.efficiency_dispatch,
                cyclic_state_of_charge: true,
                ..StorageUnit::default()
            });
        }
    }

    if clamped > 0 {
        warn!(values = clamped, "clamped capacity factors into [0, 1]");
    }

    for line in &cfg.lines {
        network.add_line(Line {
            name: line.name.clone(),
            bus0: line.bus0.clone(),
            bus1: line.bus1.clone(),
            length_km: line.length_km,
            s_nom: line.s_nom,
            s_nom_extendable: line.extendable,
            s_nom_min: if line.extendable { line.s_nom } else { 0.0 },
            capital_cost: cfg.model.transmission_cost * line.length_km,
        });
    }

    network.set_co2_limit(cfg.model.co2_limit_mt * TONNES_PER_MT);
    network.validate()?;

    debug!(
        buses = network.buses.len(),
        generators = network.generators.len(),
        storage_units = network.storage_units.len(),
        lines = network.lines.len(),
        snapshots = network.snapshot_count(),
        "built network"
    );
    Ok(network)
}

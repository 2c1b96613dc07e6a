//! Component model of a single-period power system.
//!
//! Mirrors the usual energy-system-model component set: buses connect loads,
//! generators, storage units and transmission lines; carriers tag energy
//! sources with their CO₂ intensity; a global CO₂ constraint caps the
//! weighted emissions over all snapshots.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::ModelError;

/// Carrier name used for transmission lines in cost reports.
pub const LINE_CARRIER: &str = "AC";

#[derive(Debug, Clone, Serialize)]
pub struct Bus {
    pub name: String,
}

/// Energy carrier with its emission factor (t/MWh of primary energy).
#[derive(Debug, Clone, Serialize)]
pub struct Carrier {
    pub name: String,
    pub co2_emissions: f64,
}

/// Inflexible demand at a bus.
#[derive(Debug, Clone, Serialize)]
pub struct Load {
    pub name: String,
    pub bus: String,
    /// Demand per snapshot (MW).
    pub p_set: Vec<f64>,
}

/// Dispatchable or variable generator.
#[derive(Debug, Clone, Serialize)]
pub struct Generator {
    pub name: String,
    pub bus: String,
    pub carrier: String,
    /// Installed capacity (MW); ignored by the optimiser when extendable.
    pub p_nom: f64,
    pub p_nom_extendable: bool,
    /// Lower bound on capacity (MW) when extendable.
    pub p_nom_min: f64,
    /// Upper bound on capacity (MW) when extendable.
    pub p_nom_max: f64,
    /// Per-unit availability per snapshot.
    pub p_max_pu: Vec<f64>,
    /// Annualised investment (€/MW/a).
    pub capital_cost: f64,
    /// €/MWh_el.
    pub marginal_cost: f64,
    /// Primary-to-electric efficiency, used for emissions.
    pub efficiency: f64,
}

impl Default for Generator {
    fn default() -> Self {
        Self {
            name: String::new(),
            bus: String::new(),
            carrier: String::new(),
            p_nom: 0.0,
            p_nom_extendable: false,
            p_nom_min: 0.0,
            p_nom_max: f64::INFINITY,
            p_max_pu: Vec::new(),
            capital_cost: 0.0,
            marginal_cost: 0.0,
            efficiency: 1.0,
        }
    }
}

/// Storage with a fixed energy-to-power ratio.
#[derive(Debug, Clone, Serialize)]
pub struct StorageUnit {
    pub name: String,
    pub bus: String,
    pub carrier: String,
    /// Power capacity (MW); ignored by the optimiser when extendable.
    pub p_nom: f64,
    pub p_nom_extendable: bool,
    /// Lower bound on power capacity (MW) when extendable.
    pub p_nom_min: f64,
    /// Energy capacity in hours at full power.
    pub max_hours: f64,
    /// Annualised investment per MW of power, energy part included (€/MW/a).
    pub capital_cost: f64,
    /// €/MWh dispatched.
    pub marginal_cost: f64,
    pub efficiency_store: f64,
    pub efficiency_dispatch: f64,
    /// State of charge wraps from the last snapshot to the first.
    pub cyclic_state_of_charge: bool,
    /// Initial state of charge (MWh) for non-cyclic units.
    pub state_of_charge_initial: f64,
}

impl Default for StorageUnit {
    fn default() -> Self {
        Self {
            name: String::new(),
            bus: String::new(),
            carrier: String::new(),
            p_nom: 0.0,
            p_nom_extendable: false,
            p_nom_min: 0.0,
            max_hours: 1.0,
            capital_cost: 0.0,
            marginal_cost: 0.0,
            efficiency_store: 1.0,
            efficiency_dispatch: 1.0,
            cyclic_state_of_charge: false,
            state_of_charge_initial: 0.0,
        }
    }
}

/// Transmission corridor modelled as a controllable transport link.
#[derive(Debug, Clone, Serialize)]
pub struct Line {
    pub name: String,
    pub bus0: String,
    pub bus1: String,
    pub length_km: f64,
    /// Thermal capacity (MW); ignored by the optimiser when extendable.
    pub s_nom: f64,
    pub s_nom_extendable: bool,
    /// Lower bound on capacity (MW) when extendable.
    pub s_nom_min: f64,
    /// Annualised investment (€/MW/a).
    pub capital_cost: f64,
}

/// System-wide constraints.
#[derive(Debug, Clone, Serialize)]
pub enum GlobalConstraint {
    /// Upper bound on total weighted emissions (t).
    Co2Limit { constant_t: f64 },
}

/// Complete model input for one optimisation.
#[derive(Debug, Clone, Serialize)]
pub struct Network {
    pub snapshots: Vec<NaiveDateTime>,
    /// Hours represented by each snapshot.
    pub weighting_hours: f64,
    /// Hours each snapshot counts for in annual totals (operating cost and
    /// emissions). Equal to `weighting_hours` unless the snapshots are
    /// scaled up to a full year.
    pub objective_weighting: f64,
    pub buses: Vec<Bus>,
    pub carriers: Vec<Carrier>,
    pub loads: Vec<Load>,
    pub generators: Vec<Generator>,
    pub storage_units: Vec<StorageUnit>,
    pub lines: Vec<Line>,
    pub global_constraints: Vec<GlobalConstraint>,
}

impl Network {
    /// Creates an empty network over the given snapshots.
    pub fn new(snapshots: Vec<NaiveDateTime>, weighting_hours: f64) -> Self {
        Self {
            snapshots,
            weighting_hours,
            objective_weighting: weighting_hours,
            buses: Vec::new(),
            carriers: Vec::new(),
            loads: Vec::new(),
            generators: Vec::new(),
            storage_units: Vec::new(),
            lines: Vec::new(),
            global_constraints: Vec::new(),
        }
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Scales the objective weighting so the snapshots stand for
    /// `hours_per_year` hours in operating cost and emissions.
    pub fn annualise(&mut self, hours_per_year: f64) {
        let n = self.snapshot_count();
        if n > 0 {
            self.objective_weighting = hours_per_year / n as f64;
        }
    }

    pub fn add_bus(&mut self, name: impl Into<String>) {
        self.buses.push(Bus { name: name.into() });
    }

    pub fn add_carrier(&mut self, name: impl Into<String>, co2_emissions: f64) {
        self.carriers.push(Carrier {
            name: name.into(),
            co2_emissions,
        });
    }

    pub fn add_load(&mut self, name: impl Into<String>, bus: impl Into<String>, p_set: Vec<f64>) {
        self.loads.push(Load {
            name: name.into(),
            bus: bus.into(),
            p_set,
        });
    }

    pub fn add_generator(&mut self, generator: Generator) {
        self.generators.push(generator);
    }

    pub fn add_storage_unit(&mut self, storage: StorageUnit) {
        self.storage_units.push(storage);
    }

    pub fn add_line(&mut self, line: Line) {
        self.lines.push(line);
    }

    /// Sets the CO₂ cap, replacing any previous one.
    pub fn set_co2_limit(&mut self, constant_t: f64) {
        self.global_constraints
            .retain(|c| !matches!(c, GlobalConstraint::Co2Limit { .. }));
        self.global_constraints
            .push(GlobalConstraint::Co2Limit { constant_t });
    }

    /// Current CO₂ cap in tonnes, if any.
    pub fn co2_limit(&self) -> Option<f64> {
        self.global_constraints.iter().find_map(|c| match c {
            GlobalConstraint::Co2Limit { constant_t } => Some(*constant_t),
        })
    }

    /// Emission factor of a carrier, zero when unknown.
    pub fn carrier_co2(&self, carrier: &str) -> f64 {
        self.carriers
            .iter()
            .find(|c| c.name == carrier)
            .map_or(0.0, |c| c.co2_emissions)
    }

    /// Total demand per snapshot across all loads (MW).
    pub fn total_load(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.snapshot_count()];
        for load in &self.loads {
            for (t, p) in load.p_set.iter().enumerate() {
                if let Some(slot) = total.get_mut(t) {
                    *slot += p;
                }
            }
        }
        total
    }

    /// Checks references, series lengths and parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns the first `ModelError` found.
    pub fn validate(&self) -> Result<(), ModelError> {
        let n = self.snapshot_count();
        if n == 0 {
            return Err(ModelError::NoSnapshots);
        }
        if !(self.weighting_hours > 0.0) {
            return Err(ModelError::InvalidParameter {
                component: "Network",
                name: "snapshot weighting".to_string(),
                message: "must be > 0".to_string(),
            });
        }
        if !(self.objective_weighting > 0.0) {
            return Err(ModelError::InvalidParameter {
                component: "Network",
                name: "objective weighting".to_string(),
                message: "must be > 0".to_string(),
            });
        }

        let buses = unique_names("Bus", self.buses.iter().map(|b| b.name.as_str()))?;
        let carriers = unique_names("Carrier", self.carriers.iter().map(|c| c.name.as_str()))?;
        unique_names("Load", self.loads.iter().map(|l| l.name.as_str()))?;
        unique_names("Generator", self.generators.iter().map(|g| g.name.as_str()))?;
        unique_names("StorageUnit", self.storage_units.iter().map(|s| s.name.as_str()))?;
        unique_names("Line", self.lines.iter().map(|l| l.name.as_str()))?;

        let check_bus = |component: &'static str, name: &str, bus: &str| {
            if buses.contains(bus) {
                Ok(())
            } else {
                Err(ModelError::UnknownBus {
                    component,
                    name: name.to_string(),
                    bus: bus.to_string(),
                })
            }
        };
        let check_carrier = |component: &'static str, name: &str, carrier: &str| {
            if carriers.contains(carrier) {
                Ok(())
            } else {
                Err(ModelError::UnknownCarrier {
                    component,
                    name: name.to_string(),
                    carrier: carrier.to_string(),
                })
            }
        };
        let check_len = |component: &'static str, name: &str, actual: usize| {
            if actual == n {
                Ok(())
            } else {
                Err(ModelError::LengthMismatch {
                    component,
                    name: name.to_string(),
                    expected: n,
                    actual,
                })
            }
        };
        let invalid = |component: &'static str, name: &str, message: &str| {
            Err(ModelError::InvalidParameter {
                component,
                name: name.to_string(),
                message: message.to_string(),
            })
        };

        for load in &self.loads {
            check_bus("Load", &load.name, &load.bus)?;
            check_len("Load", &load.name, load.p_set.len())?;
            if load.p_set.iter().any(|p| !p.is_finite()) {
                return invalid("Load", &load.name, "p_set must be finite");
            }
        }

        for g in &self.generators {
            check_bus("Generator", &g.name, &g.bus)?;
            check_carrier("Generator", &g.name, &g.carrier)?;
            check_len("Generator", &g.name, g.p_max_pu.len())?;
            if !(g.efficiency > 0.0 && g.efficiency <= 1.0) {
                return invalid("Generator", &g.name, "efficiency must be in (0, 1]");
            }
            if g.p_max_pu.iter().any(|v| !(0.0..=1.0).contains(v)) {
                return invalid("Generator", &g.name, "p_max_pu must be in [0, 1]");
            }
            if g.p_nom < 0.0 || g.p_nom_min < 0.0 || g.p_nom_max < g.p_nom_min {
                return invalid(
                    "Generator",
                    &g.name,
                    "require p_nom >= 0 and 0 <= p_nom_min <= p_nom_max",
                );
            }
        }

        for s in &self.storage_units {
            check_bus("StorageUnit", &s.name, &s.bus)?;
            check_carrier("StorageUnit", &s.name, &s.carrier)?;
            if !(s.max_hours > 0.0) {
                return invalid("StorageUnit", &s.name, "max_hours must be > 0");
            }
            for eff in [s.efficiency_store, s.efficiency_dispatch] {
                if !(eff > 0.0 && eff <= 1.0) {
                    return invalid("StorageUnit", &s.name, "efficiencies must be in (0, 1]");
                }
            }
            if s.p_nom < 0.0 || s.p_nom_min < 0.0 || s.state_of_charge_initial < 0.0 {
                return invalid(
                    "StorageUnit",
                    &s.name,
                    "p_nom, p_nom_min and initial SoC must be >= 0",
                );
            }
        }

        for line in &self.lines {
            check_bus("Line", &line.name, &line.bus0)?;
            check_bus("Line", &line.name, &line.bus1)?;
            if line.bus0 == line.bus1 {
                return invalid("Line", &line.name, "bus0 and bus1 must differ");
            }
            if line.s_nom < 0.0 || line.s_nom_min < 0.0 || line.length_km < 0.0 {
                return invalid("Line", &line.name, "s_nom, s_nom_min and length must be >= 0");
            }
        }

        Ok(())
    }
}

fn unique_names<'a>(
    component: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<HashSet<&'a str>, ModelError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ModelError::DuplicateName {
                component,
                name: name.to_string(),
            });
        }
    }
    Ok(seen)
}

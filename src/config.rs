//! TOML-based scenario configuration and preset definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::data::SyntheticConfig;

/// Upper end of the accepted CO₂ cap (Mt/a).
pub const MAX_CO2_LIMIT_MT: f64 = 200.0;

/// CO₂ caps swept by default (Mt/a).
pub const DEFAULT_SENSITIVITY_MT: &[f64] = &[0.0, 25.0, 50.0, 100.0, 150.0, 200.0];

/// Storage technologies the network builder knows how to assemble.
pub const STORAGE_TECHNOLOGIES: &[&str] = &["battery storage", "hydrogen storage underground"];

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the `germany` preset. Load from TOML
/// with [`ScenarioConfig::from_toml_file`] or pick a preset with
/// [`ScenarioConfig::from_preset`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Label used in reports.
    pub name: String,
    /// Optimisation parameters.
    pub model: ModelConfig,
    /// Technology cost source.
    pub costs: CostsConfig,
    /// Demand and capacity-factor source.
    pub time_series: TimeSeriesConfig,
    /// Regions, one bus each.
    pub regions: Vec<RegionConfig>,
    /// Transmission corridors between regions.
    pub lines: Vec<LineConfig>,
    /// CO₂ sweep settings.
    pub sensitivity: SensitivityConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self::germany()
    }
}

/// Optimisation parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Cap on annual emissions (Mt CO₂/a).
    pub co2_limit_mt: f64,
    /// Scale operating cost and emissions of the modelled snapshots up to a
    /// full year, matching the annualised capital costs and the annual cap.
    pub annualise: bool,
    /// Annualised transmission expansion cost (€/MW/km/a).
    pub transmission_cost: f64,
    /// Snapshot width after resampling (hours).
    pub resolution_hours: u32,
    /// Optional cap on the number of snapshots after resampling.
    pub max_snapshots: Option<usize>,
    /// Generator technologies; those with a matching profile column are variable.
    pub generators: Vec<String>,
    /// Storage technologies, a subset of [`STORAGE_TECHNOLOGIES`].
    pub storage: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            co2_limit_mt: 50.0,
            annualise: true,
            transmission_cost: 500.0,
            resolution_hours: 4,
            max_snapshots: None,
            generators: ["onwind", "offwind", "solar", "OCGT"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            storage: STORAGE_TECHNOLOGIES.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// Technology cost source.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CostsConfig {
    /// Technology-data CSV; the embedded 2030 table when absent.
    pub path: Option<PathBuf>,
}

/// Demand and capacity-factor source.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeSeriesConfig {
    /// Time-series CSV; synthetic profiles when absent.
    pub path: Option<PathBuf>,
    /// Generator settings used when `path` is absent.
    pub synthetic: SyntheticConfig,
}

/// One region of the network.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegionConfig {
    /// Bus name.
    pub name: String,
    /// Fraction of the national demand located here.
    pub load_share: f64,
    /// Multipliers on the national capacity factors, keyed by technology.
    pub availability: BTreeMap<String, f64>,
    /// Capacity limits (MW), keyed by technology.
    pub p_nom_max: BTreeMap<String, f64>,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            name: "electricity".to_string(),
            load_share: 1.0,
            availability: BTreeMap::new(),
            p_nom_max: BTreeMap::new(),
        }
    }
}

/// Transmission corridor between two regions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LineConfig {
    pub name: String,
    pub bus0: String,
    pub bus1: String,
    pub length_km: f64,
    /// Existing capacity (MW); the floor for expansion when extendable.
    pub s_nom: f64,
    pub extendable: bool,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            bus0: String::new(),
            bus1: String::new(),
            length_km: 0.0,
            s_nom: 0.0,
            extendable: true,
        }
    }
}

/// CO₂ sweep settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensitivityConfig {
    /// Run the sweep after the main solve.
    pub enabled: bool,
    /// Caps to evaluate (Mt CO₂).
    pub co2_limits_mt: Vec<f64>,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            co2_limits_mt: DEFAULT_SENSITIVITY_MT.to_vec(),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"model.co2_limit_mt"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl ScenarioConfig {
    /// Germany as a single copper-plate bus, two weeks of synthetic data.
    pub fn germany() -> Self {
        Self {
            name: "germany".to_string(),
            model: ModelConfig::default(),
            costs: CostsConfig::default(),
            time_series: TimeSeriesConfig::default(),
            regions: vec![RegionConfig::default()],
            lines: Vec::new(),
            sensitivity: SensitivityConfig::default(),
        }
    }

    /// Windy north and sunny, demand-heavy south joined by one expandable line.
    pub fn two_region() -> Self {
        let north = RegionConfig {
            name: "north".to_string(),
            load_share: 0.4,
            availability: BTreeMap::from([
                ("onwind".to_string(), 1.3),
                ("offwind".to_string(), 1.0),
                ("solar".to_string(), 0.85),
            ]),
            p_nom_max: BTreeMap::new(),
        };
        let south = RegionConfig {
            name: "south".to_string(),
            load_share: 0.6,
            availability: BTreeMap::from([
                ("onwind".to_string(), 0.7),
                ("solar".to_string(), 1.15),
            ]),
            // no coastline
            p_nom_max: BTreeMap::from([("offwind".to_string(), 0.0)]),
        };
        Self {
            name: "two_region".to_string(),
            regions: vec![north, south],
            lines: vec![LineConfig {
                name: "north-south".to_string(),
                bus0: "north".to_string(),
                bus1: "south".to_string(),
                length_km: 500.0,
                s_nom: 0.0,
                extendable: true,
            }],
            ..Self::germany()
        }
    }

    /// Three synthetic days at 6-hour resolution for fast checks.
    pub fn quick() -> Self {
        let mut cfg = Self::germany();
        cfg.name = "quick".to_string();
        cfg.model.resolution_hours = 6;
        cfg.time_series.synthetic.days = 3;
        cfg
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["germany", "two_region", "quick"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "germany" => Ok(Self::germany()),
            "two_region" => Ok(Self::two_region()),
            "quick" => Ok(Self::quick()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let m = &self.model;

        if !(0.0..=MAX_CO2_LIMIT_MT).contains(&m.co2_limit_mt) {
            errors.push(ConfigError::new(
                "model.co2_limit_mt",
                format!("must be in [0, {MAX_CO2_LIMIT_MT}]"),
            ));
        }
        if !(m.transmission_cost.is_finite() && m.transmission_cost >= 0.0) {
            errors.push(ConfigError::new(
                "model.transmission_cost",
                "must be a finite value >= 0",
            ));
        }
        if m.resolution_hours == 0 {
            errors.push(ConfigError::new("model.resolution_hours", "must be > 0"));
        }
        if m.max_snapshots == Some(0) {
            errors.push(ConfigError::new("model.max_snapshots", "must be > 0"));
        }
        if m.generators.is_empty() && m.storage.is_empty() {
            errors.push(ConfigError::new(
                "model.generators",
                "at least one technology is required",
            ));
        }
        for tech in &m.storage {
            if !STORAGE_TECHNOLOGIES.contains(&tech.as_str()) {
                errors.push(ConfigError::new(
                    "model.storage",
                    format!(
                        "unknown storage \"{tech}\", available: {}",
                        STORAGE_TECHNOLOGIES.join(", ")
                    ),
                ));
            }
        }

        if self.time_series.path.is_none() && self.time_series.synthetic.days == 0 {
            errors.push(ConfigError::new(
                "time_series.synthetic.days",
                "must be > 0",
            ));
        }

        if self.regions.is_empty() {
            errors.push(ConfigError::new("regions", "at least one region is required"));
        }
        let mut seen = Vec::new();
        for (i, region) in self.regions.iter().enumerate() {
            if region.name.is_empty() {
                errors.push(ConfigError::new(format!("regions[{i}].name"), "must not be empty"));
            } else if seen.contains(&region.name.as_str()) {
                errors.push(ConfigError::new(
                    format!("regions[{i}].name"),
                    format!("duplicate region \"{}\"", region.name),
                ));
            }
            seen.push(region.name.as_str());
            if !(region.load_share >= 0.0) {
                errors.push(ConfigError::new(
                    format!("regions[{i}].load_share"),
                    "must be >= 0",
                ));
            }
            for (tech, factor) in &region.availability {
                if !(*factor >= 0.0) {
                    errors.push(ConfigError::new(
                        format!("regions[{i}].availability.{tech}"),
                        "must be >= 0",
                    ));
                }
            }
            for (tech, limit) in &region.p_nom_max {
                if !(*limit >= 0.0) {
                    errors.push(ConfigError::new(
                        format!("regions[{i}].p_nom_max.{tech}"),
                        "must be >= 0",
                    ));
                }
            }
        }
        if !self.regions.is_empty() && self.regions.iter().map(|r| r.load_share).sum::<f64>() <= 0.0 {
            errors.push(ConfigError::new(
                "regions",
                "load shares must sum to a positive value",
            ));
        }

        for (i, line) in self.lines.iter().enumerate() {
            if line.name.is_empty() {
                errors.push(ConfigError::new(format!("lines[{i}].name"), "must not be empty"));
            }
            for (field, bus) in [("bus0", &line.bus0), ("bus1", &line.bus1)] {
                if !seen.contains(&bus.as_str()) {
                    errors.push(ConfigError::new(
                        format!("lines[{i}].{field}"),
                        format!("unknown region \"{bus}\""),
                    ));
                }
            }
            if line.bus0 == line.bus1 {
                errors.push(ConfigError::new(
                    format!("lines[{i}].bus1"),
                    "must differ from bus0",
                ));
            }
            if !(line.length_km >= 0.0) {
                errors.push(ConfigError::new(
                    format!("lines[{i}].length_km"),
                    "must be >= 0",
                ));
            }
            if !(line.s_nom >= 0.0) {
                errors.push(ConfigError::new(format!("lines[{i}].s_nom"), "must be >= 0"));
            }
        }

        let sweep = &self.sensitivity;
        if sweep.enabled && sweep.co2_limits_mt.is_empty() {
            errors.push(ConfigError::new(
                "sensitivity.co2_limits_mt",
                "must not be empty when the sweep is enabled",
            ));
        }
        if sweep.co2_limits_mt.iter().any(|v| !(*v >= 0.0)) {
            errors.push(ConfigError::new(
                "sensitivity.co2_limits_mt",
                "values must be >= 0",
            ));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        for name in ScenarioConfig::PRESETS {
            let cfg = ScenarioConfig::from_preset(name).expect("preset exists");
            let errors = cfg.validate();
            assert!(errors.is_empty(), "{name} should be valid: {errors:?}");
        }
    }

    #[test]
    fn from_preset_unknown() {
        let err = ScenarioConfig::from_preset("nonexistent").expect_err("must fail");
        assert!(err.message.contains("unknown preset"));
    }

    #[test]
    fn defaults_match_single_bus_setup() {
        let cfg = ScenarioConfig::default();
        assert_eq!(cfg.model.co2_limit_mt, 50.0);
        assert_eq!(cfg.model.transmission_cost, 500.0);
        assert_eq!(cfg.model.resolution_hours, 4);
        assert_eq!(cfg.regions.len(), 1);
        assert_eq!(cfg.regions[0].name, "electricity");
        assert_eq!(cfg.sensitivity.co2_limits_mt, DEFAULT_SENSITIVITY_MT);
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
name = "custom"

[model]
co2_limit_mt = 120
transmission_cost = 250.0
resolution_hours = 3
generators = ["onwind", "solar", "OCGT"]
storage = ["battery storage"]

[time_series.synthetic]
days = 2
start_date = "2015-07-01"
seed = 7

[[regions]]
name = "a"
load_share = 0.5
availability = { solar = 1.2 }

[[regions]]
name = "b"
load_share = 0.5
p_nom_max = { onwind = 1000.0 }

[[lines]]
name = "a-b"
bus0 = "a"
bus1 = "b"
length_km = 300
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).expect("valid TOML should parse");
        assert_eq!(cfg.name, "custom");
        assert_eq!(cfg.model.co2_limit_mt, 120.0);
        assert_eq!(cfg.model.storage, vec!["battery storage".to_string()]);
        assert_eq!(cfg.time_series.synthetic.days, 2);
        assert_eq!(cfg.regions.len(), 2);
        assert_eq!(cfg.regions[0].availability.get("solar"), Some(&1.2));
        assert!(cfg.lines[0].extendable);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = ScenarioConfig::from_toml_str("[model]\nco2_limit_mt = 0\n")
            .expect("partial TOML should parse");
        assert_eq!(cfg.model.co2_limit_mt, 0.0);
        assert_eq!(cfg.model.resolution_hours, 4);
        assert!(cfg.model.annualise);
        assert_eq!(cfg.regions[0].name, "electricity");

        let cfg = ScenarioConfig::from_toml_str("[model]\nannualise = false\n")
            .expect("annualise flag should parse");
        assert!(!cfg.model.annualise);
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = "[model]\nco2_limit_mt = 10\nbogus_field = true\n";
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn validation_catches_co2_out_of_range() {
        let mut cfg = ScenarioConfig::germany();
        cfg.model.co2_limit_mt = 250.0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "model.co2_limit_mt"));
        cfg.model.co2_limit_mt = -1.0;
        assert!(cfg.validate().iter().any(|e| e.field == "model.co2_limit_mt"));
    }

    #[test]
    fn validation_catches_negative_transmission_cost() {
        let mut cfg = ScenarioConfig::two_region();
        cfg.model.transmission_cost = -5.0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "model.transmission_cost"));
    }

    #[test]
    fn validation_catches_unknown_storage() {
        let mut cfg = ScenarioConfig::germany();
        cfg.model.storage.push("flywheel".to_string());
        assert!(cfg.validate().iter().any(|e| e.field == "model.storage"));
    }

    #[test]
    fn validation_catches_line_to_unknown_region() {
        let mut cfg = ScenarioConfig::two_region();
        cfg.lines[0].bus1 = "east".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "lines[0].bus1"));
    }

    #[test]
    fn validation_reports_all_errors_at_once() {
        let mut cfg = ScenarioConfig::germany();
        cfg.model.resolution_hours = 0;
        cfg.model.co2_limit_mt = 500.0;
        cfg.regions[0].load_share = 0.0;
        assert!(cfg.validate().len() >= 3);
    }
}

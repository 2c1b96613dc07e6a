//! Technology cost table in the PyPSA technology-data layout.
//!
//! Raw rows are `technology,parameter,value,unit`. After loading, every
//! technology carries a full parameter set (missing entries filled from
//! [`DEFAULTS`]) plus the derived annualised capital cost and marginal cost.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DataError;

/// Cost table shipped with the crate (technology data, 2030 projections).
const EMBEDDED_2030: &str = include_str!("../../data/costs_2030.csv");

/// Fill values for parameters a technology does not list.
pub const DEFAULTS: &[(&str, f64)] = &[
    ("FOM", 0.0),
    ("VOM", 0.0),
    ("efficiency", 1.0),
    ("fuel", 0.0),
    ("investment", 0.0),
    ("lifetime", 25.0),
    ("CO2 intensity", 0.0),
    ("discount rate", 0.07),
];

/// Technologies that burn gas and inherit its fuel price and emission factor.
const GAS_CONSUMERS: &[&str] = &["OCGT", "CCGT"];

/// Equivalent annual payment factor for an investment.
///
/// `r` is the discount rate, `n` the lifetime in years. A zero rate reduces to
/// straight-line depreciation.
///
/// ```
/// use capacity_planner::data::costs::annuity;
///
/// assert!((annuity(0.0, 20.0) - 0.05).abs() < 1e-12);
/// assert!((annuity(0.07, 25.0) - 0.0858).abs() < 1e-4);
/// ```
pub fn annuity(r: f64, n: f64) -> f64 {
    if r == 0.0 {
        return 1.0 / n;
    }
    r / (1.0 - 1.0 / (1.0 + r).powf(n))
}

#[derive(Debug, Deserialize)]
struct CostRow {
    technology: String,
    parameter: String,
    value: f64,
    #[serde(default)]
    unit: String,
}

/// Fully populated cost parameters of one technology.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnologyCosts {
    /// Fixed operation and maintenance (% of investment per year).
    pub fom: f64,
    /// Variable operation and maintenance (€/MWh).
    pub vom: f64,
    pub efficiency: f64,
    /// Fuel price (€/MWh_th).
    pub fuel: f64,
    /// Overnight investment (€/MW or €/MWh).
    pub investment: f64,
    /// Economic lifetime (years).
    pub lifetime: f64,
    /// Emission factor of the fuel (t/MWh_th).
    pub co2_intensity: f64,
    pub discount_rate: f64,
    /// `VOM + fuel / efficiency` (€/MWh_el).
    pub marginal_cost: f64,
    /// `(annuity + FOM/100) * investment` (€/MW/a).
    pub capital_cost: f64,
}

impl TechnologyCosts {
    fn from_parameters(params: &BTreeMap<String, f64>) -> Self {
        let get = |key: &str| {
            params.get(key).copied().unwrap_or_else(|| {
                DEFAULTS
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map_or(0.0, |(_, v)| *v)
            })
        };

        let mut costs = Self {
            fom: get("FOM"),
            vom: get("VOM"),
            efficiency: get("efficiency"),
            fuel: get("fuel"),
            investment: get("investment"),
            lifetime: get("lifetime"),
            co2_intensity: get("CO2 intensity"),
            discount_rate: get("discount rate"),
            marginal_cost: 0.0,
            capital_cost: 0.0,
        };
        costs.derive();
        costs
    }

    fn derive(&mut self) {
        self.marginal_cost = self.vom + self.fuel / self.efficiency;
        self.capital_cost =
            (annuity(self.discount_rate, self.lifetime) + self.fom / 100.0) * self.investment;
    }
}

/// Cost parameters for every technology in a technology-data file.
#[derive(Debug, Clone, Serialize)]
pub struct CostTable {
    technologies: BTreeMap<String, TechnologyCosts>,
}

impl CostTable {
    /// Returns the cost table compiled into the crate.
    ///
    /// # Errors
    ///
    /// Only fails if the embedded file is malformed.
    pub fn embedded_2030() -> Result<Self, DataError> {
        Self::from_reader(EMBEDDED_2030.as_bytes())
    }

    /// Reads a technology-data CSV from disk.
    ///
    /// # Errors
    ///
    /// Returns a `DataError` if the file cannot be opened or parsed.
    pub fn from_path(path: &Path) -> Result<Self, DataError> {
        let file = File::open(path).map_err(|e| DataError::io(path, e))?;
        Self::from_reader(file)
    }

    /// Reads a technology-data CSV from any reader.
    ///
    /// # Errors
    ///
    /// Returns a `DataError` on malformed rows or duplicated parameters.
    pub fn from_reader(reader: impl Read) -> Result<Self, DataError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut raw: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();

        for record in rdr.deserialize::<CostRow>() {
            let row = record?;
            let value = if row.unit.contains("/kW") {
                row.value * 1e3
            } else {
                row.value
            };
            let params = raw.entry(row.technology.clone()).or_default();
            if params.insert(row.parameter.clone(), value).is_some() {
                return Err(DataError::DuplicateCost {
                    technology: row.technology,
                    parameter: row.parameter,
                });
            }
        }

        inherit_gas_parameters(&mut raw);

        let technologies: BTreeMap<String, TechnologyCosts> = raw
            .iter()
            .map(|(name, params)| (name.clone(), TechnologyCosts::from_parameters(params)))
            .collect();
        debug!(count = technologies.len(), "loaded technology costs");

        Ok(Self { technologies })
    }

    /// Looks up one technology.
    ///
    /// # Errors
    ///
    /// Returns `DataError::UnknownTechnology` if the table has no such entry.
    pub fn get(&self, technology: &str) -> Result<&TechnologyCosts, DataError> {
        self.technologies
            .get(technology)
            .ok_or_else(|| DataError::UnknownTechnology(technology.to_string()))
    }

    /// Iterates technologies in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TechnologyCosts)> {
        self.technologies.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.technologies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.technologies.is_empty()
    }
}

/// Copies the gas fuel price and CO₂ intensity onto gas-fired plants.
fn inherit_gas_parameters(raw: &mut BTreeMap<String, BTreeMap<String, f64>>) {
    let Some(gas) = raw.get("gas").cloned() else {
        return;
    };
    for name in GAS_CONSUMERS {
        if let Some(params) = raw.get_mut(*name) {
            for key in ["fuel", "CO2 intensity"] {
                if let Some(v) = gas.get(key) {
                    params.insert(key.to_string(), *v);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
technology,parameter,value,unit,source,further description
OCGT,investment,400,EUR/kWel,test,
OCGT,efficiency,0.4,per unit,test,
OCGT,VOM,5,EUR/MWh,test,
OCGT,FOM,2,%/year,test,
gas,fuel,20,EUR/MWh_th,test,
gas,CO2 intensity,0.2,tCO2/MWh_th,test,
storage,investment,100,EUR/kWh,test,
";

    #[test]
    fn kw_units_are_scaled_to_mw() {
        let table = CostTable::from_reader(SAMPLE.as_bytes()).expect("sample should parse");
        let ocgt = table.get("OCGT").expect("OCGT present");
        assert!((ocgt.investment - 400_000.0).abs() < 1e-9);
        let storage = table.get("storage").expect("storage present");
        assert!((storage.investment - 100_000.0).abs() < 1e-9);
    }

    #[test]
    fn gas_plants_inherit_fuel_and_emissions() {
        let table = CostTable::from_reader(SAMPLE.as_bytes()).expect("sample should parse");
        let ocgt = table.get("OCGT").expect("OCGT present");
        assert_eq!(ocgt.fuel, 20.0);
        assert_eq!(ocgt.co2_intensity, 0.2);
        // 5 + 20 / 0.4
        assert!((ocgt.marginal_cost - 55.0).abs() < 1e-9);
    }

    #[test]
    fn capital_cost_uses_annuity_and_fom() {
        let table = CostTable::from_reader(SAMPLE.as_bytes()).expect("sample should parse");
        let ocgt = table.get("OCGT").expect("OCGT present");
        let expected = (annuity(0.07, 25.0) + 0.02) * 400_000.0;
        assert!((ocgt.capital_cost - expected).abs() < 1e-6);
    }

    #[test]
    fn missing_parameters_use_defaults() {
        let table = CostTable::from_reader(SAMPLE.as_bytes()).expect("sample should parse");
        let storage = table.get("storage").expect("storage present");
        assert_eq!(storage.efficiency, 1.0);
        assert_eq!(storage.lifetime, 25.0);
        assert_eq!(storage.discount_rate, 0.07);
        assert_eq!(storage.marginal_cost, 0.0);
    }

    #[test]
    fn duplicate_parameter_is_rejected() {
        let csv = "technology,parameter,value,unit\nsolar,FOM,1,%/year\nsolar,FOM,2,%/year\n";
        let err = CostTable::from_reader(csv.as_bytes()).expect_err("duplicate must fail");
        assert!(matches!(err, DataError::DuplicateCost { .. }));
    }

    #[test]
    fn non_numeric_value_is_a_csv_error() {
        let csv = "technology,parameter,value,unit\nsolar,FOM,n/a,%/year\n";
        let err = CostTable::from_reader(csv.as_bytes()).expect_err("bad value must fail");
        assert!(matches!(err, DataError::Csv(_)));
    }

    #[test]
    fn unknown_technology_lookup_fails() {
        let table = CostTable::from_reader(SAMPLE.as_bytes()).expect("sample should parse");
        assert!(matches!(
            table.get("fusion"),
            Err(DataError::UnknownTechnology(_))
        ));
    }

    #[test]
    fn embedded_table_covers_model_technologies() {
        let table = CostTable::embedded_2030().expect("embedded table should parse");
        for tech in [
            "onwind",
            "offwind",
            "solar",
            "OCGT",
            "battery storage",
            "battery inverter",
            "electrolysis",
            "fuel cell",
            "hydrogen storage underground",
        ] {
            let costs = table.get(tech).expect("technology present");
            assert!(costs.capital_cost.is_finite(), "{tech} capital cost");
        }
        assert!(table.get("OCGT").map(|c| c.co2_intensity).unwrap_or(0.0) > 0.0);
    }
}

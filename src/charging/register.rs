//! Reader for the Federal Network Agency's charging-station register
//! (Ladesäulenregister) CSV export.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::DataError;

pub const COL_OPERATOR: &str = "Betreiber";
pub const COL_STREET: &str = "Straße";
pub const COL_HOUSE_NUMBER: &str = "Hausnummer";
pub const COL_LATITUDE: &str = "Breitengrad";
pub const COL_LONGITUDE: &str = "Längengrad";
pub const COL_POWER: &str = "Nennleistung Ladeeinrichtung [kW]";

/// One charging station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargingStation {
    pub operator: String,
    pub street: String,
    pub house_number: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Rated power of the installation (kW), if given.
    pub power_kw: Option<f64>,
}

impl ChargingStation {
    /// `street house_number`, trimmed.
    pub fn address(&self) -> String {
        format!("{} {}", self.street, self.house_number).trim().to_string()
    }
}

/// Parsed register with the number of rows dropped for bad coordinates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChargingRegister {
    pub stations: Vec<ChargingStation>,
    pub skipped: usize,
}

/// Parses a number that may use a decimal comma.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    s.replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite())
}

impl ChargingRegister {
    /// Reads a register export from disk.
    ///
    /// # Errors
    ///
    /// Returns a `DataError` if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, DataError> {
        let text = fs::read_to_string(path).map_err(|e| DataError::io(path, e))?;
        Self::from_csv_str(&text)
    }

    /// Parses a semicolon-separated register export.
    ///
    /// Metadata lines before the column header are skipped. Rows without
    /// parsable coordinates are counted in `skipped`.
    ///
    /// # Errors
    ///
    /// Returns `DataError::MissingColumn` if no header line carries the
    /// coordinate columns, or `DataError::Csv` on malformed records.
    pub fn from_csv_str(text: &str) -> Result<Self, DataError> {
        let text = text.trim_start_matches('\u{feff}');
        let start = text
            .lines()
            .position(|l| l.contains(COL_LATITUDE) && l.contains(COL_LONGITUDE))
            .ok_or_else(|| DataError::MissingColumn(COL_LATITUDE.to_string()))?;
        let body: String = text
            .lines()
            .skip(start)
            .collect::<Vec<_>>()
            .join("\n");

        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(body.as_bytes());
        let headers = rdr.headers()?.clone();
        let col = |name: &str| headers.iter().position(|h| h == name);
        let lat_idx = col(COL_LATITUDE)
            .ok_or_else(|| DataError::MissingColumn(COL_LATITUDE.to_string()))?;
        let lon_idx = col(COL_LONGITUDE)
            .ok_or_else(|| DataError::MissingColumn(COL_LONGITUDE.to_string()))?;
        let operator_idx = col(COL_OPERATOR);
        let street_idx = col(COL_STREET);
        let number_idx = col(COL_HOUSE_NUMBER);
        let power_idx = col(COL_POWER);

        let mut register = Self::default();
        for record in rdr.records() {
            let record = record?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            let text_at = |idx: Option<usize>| {
                idx.and_then(|i| record.get(i))
                    .unwrap_or("")
                    .to_string()
            };
            let lat = record.get(lat_idx).and_then(parse_decimal);
            let lon = record.get(lon_idx).and_then(parse_decimal);
            let (Some(latitude), Some(longitude)) = (lat, lon) else {
                register.skipped += 1;
                continue;
            };
            register.stations.push(ChargingStation {
                operator: text_at(operator_idx),
                street: text_at(street_idx),
                house_number: text_at(number_idx),
                latitude,
                longitude,
                power_kw: power_idx.and_then(|i| record.get(i)).and_then(parse_decimal),
            });
        }

        if register.skipped > 0 {
            warn!(
                rows = register.skipped,
                "skipped charging stations without coordinates"
            );
        }
        debug!(stations = register.stations.len(), "read charging register");
        Ok(register)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

//! Demand and renewable availability time series.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeDelta};
use tracing::debug;

use crate::error::DataError;

/// Demand column name; values are read in GW.
pub const LOAD_COLUMN: &str = "load";

const GW_TO_MW: f64 = 1e3;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Snapshot-indexed demand plus per-technology capacity-factor profiles.
///
/// Profiles are kept as read; the network builder clamps them into `[0, 1]`
/// when turning them into generator availability.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub timestamps: Vec<NaiveDateTime>,
    /// Electricity demand per snapshot (MW).
    pub load_mw: Vec<f64>,
    /// Every other numeric column keyed by header name.
    pub profiles: BTreeMap<String, Vec<f64>>,
    /// Hours represented by one snapshot.
    pub weighting_hours: f64,
}

impl TimeSeries {
    /// Reads a time-series CSV from disk. See [`TimeSeries::from_csv_reader`].
    ///
    /// # Errors
    ///
    /// Returns a `DataError` if the file cannot be opened or parsed.
    pub fn from_csv_path(path: &Path) -> Result<Self, DataError> {
        let file = File::open(path).map_err(|e| DataError::io(path, e))?;
        Self::from_csv_reader(file)
    }

    /// Reads a time-series CSV whose first column is the timestamp index.
    ///
    /// The `load` column is converted from GW to MW. Empty cells in profile
    /// columns become `NaN`; an empty load cell is an error.
    ///
    /// # Errors
    ///
    /// Returns a `DataError` for missing `load`, unparsable cells, or
    /// timestamps that do not strictly increase.
    pub fn from_csv_reader(reader: impl Read) -> Result<Self, DataError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = rdr.headers()?.clone();
        let load_idx = headers
            .iter()
            .position(|h| h == LOAD_COLUMN)
            .ok_or_else(|| DataError::MissingColumn(LOAD_COLUMN.to_string()))?;

        let profile_cols: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(i, _)| *i != load_idx)
            .map(|(i, h)| (i, h.to_string()))
            .collect();

        let mut timestamps = Vec::new();
        let mut load_mw = Vec::new();
        let mut profiles: BTreeMap<String, Vec<f64>> = profile_cols
            .iter()
            .map(|(_, name)| (name.clone(), Vec::new()))
            .collect();

        for record in rdr.records() {
            let record = record?;
            let line = record.position().map_or(0, csv::Position::line);

            let ts = parse_timestamp(record.get(0).unwrap_or(""))
                .ok_or_else(|| DataError::Parse {
                    line,
                    message: format!("invalid timestamp \"{}\"", record.get(0).unwrap_or("")),
                })?;
            if timestamps.last().is_some_and(|prev| *prev >= ts) {
                return Err(DataError::Unordered { line });
            }

            let load_raw = record.get(load_idx).unwrap_or("");
            let load: f64 = load_raw.parse().map_err(|_| DataError::Parse {
                line,
                message: format!("invalid load value \"{load_raw}\""),
            })?;

            for (idx, name) in &profile_cols {
                let raw = record.get(*idx).unwrap_or("");
                let value = if raw.is_empty() {
                    f64::NAN
                } else {
                    raw.parse().map_err(|_| DataError::Parse {
                        line,
                        message: format!("invalid value \"{raw}\" in column `{name}`"),
                    })?
                };
                if let Some(column) = profiles.get_mut(name) {
                    column.push(value);
                }
            }

            timestamps.push(ts);
            load_mw.push(load * GW_TO_MW);
        }

        let weighting_hours = match (timestamps.first(), timestamps.get(1)) {
            (Some(a), Some(b)) => (*b - *a).num_seconds() as f64 / 3600.0,
            _ => 1.0,
        };
        debug!(
            snapshots = timestamps.len(),
            columns = profiles.len(),
            "read time series"
        );

        Ok(Self {
            timestamps,
            load_mw,
            profiles,
            weighting_hours,
        })
    }

    /// Number of snapshots.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Returns the named profile column, if present.
    pub fn profile(&self, name: &str) -> Option<&[f64]> {
        self.profiles.get(name).map(Vec::as_slice)
    }

    /// Checks that every column has one value per timestamp.
    fn check_lengths(&self) -> Result<(), DataError> {
        let n = self.timestamps.len();
        if self.load_mw.len() != n {
            return Err(DataError::Invalid(format!(
                "load has {} values for {n} timestamps",
                self.load_mw.len()
            )));
        }
        for (name, values) in &self.profiles {
            if values.len() != n {
                return Err(DataError::Invalid(format!(
                    "profile `{name}` has {} values for {n} timestamps",
                    values.len()
                )));
            }
        }
        Ok(())
    }

    /// Downsamples to `hours`-wide bins, taking the first non-NaN value of
    /// each column within a bin (NaN only if the whole bin is NaN).
    ///
    /// Bins are aligned to midnight of the first day and labelled with their
    /// start time. The snapshot weighting becomes `hours`, so every bin between
    /// the first and the last row must hold data and `hours` must be a
    /// multiple of the source spacing.
    ///
    /// # Errors
    ///
    /// Returns `DataError::Invalid` if `hours` is zero, finer than or not a
    /// multiple of the source spacing, if the series has a gap spanning a
    /// whole bin, or if column lengths disagree.
    pub fn resample_first(&self, hours: u32) -> Result<Self, DataError> {
        if hours == 0 {
            return Err(DataError::Invalid(
                "resample resolution must be > 0 hours".to_string(),
            ));
        }
        self.check_lengths()?;
        let Some(first) = self.timestamps.first() else {
            return Ok(Self {
                weighting_hours: f64::from(hours),
                ..self.clone()
            });
        };

        let origin = first.date().and_time(chrono::NaiveTime::MIN);
        let width = TimeDelta::hours(i64::from(hours));
        let width_secs = width.num_seconds();

        if self.len() > 1 {
            let spacing_secs = (self.weighting_hours * 3600.0).round() as i64;
            if spacing_secs <= 0 || width_secs < spacing_secs || width_secs % spacing_secs != 0 {
                return Err(DataError::Invalid(format!(
                    "resolution of {hours} h is not a multiple of the {} h source spacing",
                    self.weighting_hours
                )));
            }
        }

        // (bin index, first row, one past last row)
        let mut bins: Vec<(i64, usize, usize)> = Vec::new();
        for (i, ts) in self.timestamps.iter().enumerate() {
            let bin = (*ts - origin).num_seconds().div_euclid(width_secs);
            match bins.last().map(|&(b, _, _)| b) {
                Some(b) if b == bin => {
                    if let Some(last) = bins.last_mut() {
                        last.2 = i + 1;
                    }
                }
                Some(b) if bin > b + 1 => {
                    return Err(DataError::Invalid(format!(
                        "time series has no rows between {} and {ts}",
                        self.timestamps[i - 1]
                    )));
                }
                _ => bins.push((bin, i, i + 1)),
            }
        }

        let first_valid = |values: &[f64], start: usize, end: usize| {
            values[start..end]
                .iter()
                .copied()
                .find(|v| !v.is_nan())
                .unwrap_or(f64::NAN)
        };

        let out = Self {
            timestamps: bins
                .iter()
                .map(|(bin, _, _)| origin + width * *bin as i32)
                .collect(),
            load_mw: bins
                .iter()
                .map(|&(_, start, end)| first_valid(&self.load_mw, start, end))
                .collect(),
            profiles: self
                .profiles
                .iter()
                .map(|(name, values)| {
                    let column = bins
                        .iter()
                        .map(|&(_, start, end)| first_valid(values, start, end))
                        .collect();
                    (name.clone(), column)
                })
                .collect(),
            weighting_hours: f64::from(hours),
        };

        debug!(
            from = self.len(),
            to = out.len(),
            hours,
            "resampled time series"
        );
        Ok(out)
    }

    /// Keeps only the first `n` snapshots.
    pub fn truncate(&mut self, n: usize) {
        self.timestamps.truncate(n);
        self.load_mw.truncate(n);
        for values in self.profiles.values_mut() {
            values.truncate(n);
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hourly_csv(hours: usize) -> String {
        let mut s = String::from(",load,onwind,offwind,solar\n");
        for h in 0..hours {
            let day = 1 + h / 24;
            let hour = h % 24;
            s.push_str(&format!(
                "2015-01-{day:02} {hour:02}:00:00,{},{},0.5,0.0\n",
                50.0 + h as f64,
                h as f64 / 100.0
            ));
        }
        s
    }

    #[test]
    fn load_is_converted_to_mw() {
        let ts = TimeSeries::from_csv_reader(hourly_csv(3).as_bytes()).expect("csv should parse");
        assert_eq!(ts.len(), 3);
        assert_eq!(ts.load_mw[0], 50_000.0);
        assert_eq!(ts.weighting_hours, 1.0);
        assert_eq!(ts.profile("offwind").map(<[f64]>::len), Some(3));
    }

    #[test]
    fn missing_load_column_is_an_error() {
        let csv = "time,onwind\n2015-01-01 00:00:00,0.3\n";
        let err = TimeSeries::from_csv_reader(csv.as_bytes()).expect_err("must fail");
        assert!(matches!(err, DataError::MissingColumn(_)));
    }

    #[test]
    fn unordered_timestamps_are_rejected() {
        let csv = ",load\n2015-01-01 01:00:00,1\n2015-01-01 00:00:00,1\n";
        let err = TimeSeries::from_csv_reader(csv.as_bytes()).expect_err("must fail");
        assert!(matches!(err, DataError::Unordered { .. }));
    }

    #[test]
    fn resample_keeps_first_row_of_each_bin() {
        let ts = TimeSeries::from_csv_reader(hourly_csv(48).as_bytes()).expect("csv should parse");
        let coarse = ts.resample_first(4).expect("resample should succeed");
        assert_eq!(coarse.len(), 12);
        assert_eq!(coarse.weighting_hours, 4.0);
        assert_eq!(coarse.load_mw[1], ts.load_mw[4]);
        assert_eq!(coarse.profile("onwind").map(|p| p[2]), Some(0.08));
    }

    #[test]
    fn resample_skips_missing_values_within_a_bin() {
        let csv = ",load,solar,onwind\n\
                   2015-01-01 00:00:00,1,,\n\
                   2015-01-01 01:00:00,2,0.3,\n\
                   2015-01-01 02:00:00,3,0.4,\n\
                   2015-01-01 03:00:00,4,0.5,\n";
        let ts = TimeSeries::from_csv_reader(csv.as_bytes()).expect("csv should parse");
        let coarse = ts.resample_first(4).expect("resample should succeed");
        assert_eq!(coarse.profile("solar"), Some(&[0.3][..]));
        assert!(coarse.profile("onwind").is_some_and(|p| p[0].is_nan()));
        assert_eq!(coarse.load_mw, vec![1_000.0]);
    }

    #[test]
    fn resample_labels_bin_start() {
        let csv = ",load\n2015-01-01 01:00:00,1\n2015-01-01 02:00:00,2\n2015-01-01 03:00:00,3\n2015-01-01 04:00:00,4\n";
        let ts = TimeSeries::from_csv_reader(csv.as_bytes()).expect("csv should parse");
        let coarse = ts.resample_first(4).expect("resample should succeed");
        assert_eq!(coarse.len(), 2);
        assert_eq!(coarse.timestamps[0].to_string(), "2015-01-01 00:00:00");
        assert_eq!(coarse.timestamps[1].to_string(), "2015-01-01 04:00:00");
        assert_eq!(coarse.load_mw, vec![1_000.0, 4_000.0]);
    }

    #[test]
    fn resample_preserves_weighted_energy() {
        let ts = TimeSeries::from_csv_reader(hourly_csv(48).as_bytes()).expect("csv should parse");
        let coarse = ts.resample_first(6).expect("resample should succeed");
        let span = |t: &TimeSeries| t.len() as f64 * t.weighting_hours;
        assert_eq!(span(&ts), span(&coarse));
    }

    #[test]
    fn resolution_finer_than_source_is_rejected() {
        let csv = ",load\n2015-01-01 00:00:00,10\n2015-01-01 04:00:00,10\n2015-01-01 08:00:00,10\n";
        let ts = TimeSeries::from_csv_reader(csv.as_bytes()).expect("csv should parse");
        assert_eq!(ts.weighting_hours, 4.0);
        assert!(matches!(ts.resample_first(1), Err(DataError::Invalid(_))));
        assert!(matches!(ts.resample_first(6), Err(DataError::Invalid(_))));
        let same = ts.resample_first(4).expect("same resolution is fine");
        assert_eq!(
            same.len() as f64 * same.weighting_hours,
            ts.len() as f64 * ts.weighting_hours
        );
    }

    #[test]
    fn gap_spanning_a_bin_is_rejected() {
        let csv = ",load\n2015-01-01 00:00:00,1\n2015-01-01 01:00:00,2\n2015-01-01 09:00:00,3\n";
        let ts = TimeSeries::from_csv_reader(csv.as_bytes()).expect("csv should parse");
        let err = ts.resample_first(4).expect_err("gap must fail");
        assert!(matches!(err, DataError::Invalid(ref m) if m.contains("no rows")));
    }

    #[test]
    fn mismatched_column_lengths_are_rejected() {
        let mut ts = TimeSeries::from_csv_reader(hourly_csv(4).as_bytes()).expect("csv should parse");
        ts.load_mw.pop();
        assert!(matches!(ts.resample_first(2), Err(DataError::Invalid(_))));

        let mut ts = TimeSeries::from_csv_reader(hourly_csv(4).as_bytes()).expect("csv should parse");
        if let Some(solar) = ts.profiles.get_mut("solar") {
            solar.push(0.0);
        }
        assert!(matches!(ts.resample_first(2), Err(DataError::Invalid(_))));
    }

    #[test]
    fn iso_and_rfc3339_timestamps_parse() {
        let csv = ",load\n2015-01-01T00:00:00,1\n2015-01-01T01:00:00Z,1\n2015-01-01T03:00:00+01:00,1\n";
        let ts = TimeSeries::from_csv_reader(csv.as_bytes()).expect("csv should parse");
        assert_eq!(ts.len(), 3);
        assert_eq!(ts.timestamps[1].to_string(), "2015-01-01 01:00:00");
        assert_eq!(ts.timestamps[2].to_string(), "2015-01-01 02:00:00");
    }

    #[test]
    fn zero_resolution_is_rejected() {
        let ts = TimeSeries::from_csv_reader(hourly_csv(2).as_bytes()).expect("csv should parse");
        assert!(ts.resample_first(0).is_err());
    }

    #[test]
    fn empty_profile_cells_become_nan() {
        let csv = ",load,solar\n2015-01-01 00:00:00,1,\n";
        let ts = TimeSeries::from_csv_reader(csv.as_bytes()).expect("csv should parse");
        assert!(ts.profile("solar").is_some_and(|p| p[0].is_nan()));
    }
}

//! Seeded synthetic demand and renewable profiles.
//!
//! Used when a scenario has no time-series file, so the planner runs offline
//! and reproducibly. Shapes are coarse stand-ins for German hourly data:
//! a winter-peaking demand with daily and weekly cycles, a seasonal solar
//! bell with AR(1) cloud cover, and AR(1) wind with a winter maximum.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use chrono::{Datelike, NaiveDate, TimeDelta};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Deserialize;

use super::timeseries::TimeSeries;

/// Day of year with the longest daylight.
const SUMMER_SOLSTICE_DOY: f64 = 172.0;

/// Parameters of the synthetic profile generator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyntheticConfig {
    /// Number of simulated days (hourly resolution).
    pub days: usize,
    /// First day of the series.
    pub start_date: NaiveDate,
    /// Mean demand (GW).
    pub mean_load_gw: f64,
    /// Relative amplitude of the daily demand cycle.
    pub daily_amplitude: f64,
    /// Relative demand reduction on weekends.
    pub weekend_dip: f64,
    /// Relative winter/summer demand swing.
    pub seasonal_amplitude: f64,
    /// Demand noise standard deviation (GW).
    pub load_noise_gw: f64,
    /// Mean onshore wind capacity factor.
    pub onwind_mean: f64,
    /// Mean offshore wind capacity factor.
    pub offwind_mean: f64,
    /// AR(1) persistence of wind and clouds (0..1).
    pub persistence: f64,
    /// Innovation standard deviation of the AR(1) processes.
    pub noise_std: f64,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            days: 14,
            start_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default(),
            mean_load_gw: 55.0,
            daily_amplitude: 0.15,
            weekend_dip: 0.12,
            seasonal_amplitude: 0.08,
            load_noise_gw: 1.0,
            onwind_mean: 0.25,
            offwind_mean: 0.42,
            persistence: 0.9,
            noise_std: 0.35,
            seed: 42,
        }
    }
}

/// Gaussian noise via Box-Muller.
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.random::<f64>().clamp(1e-9, 1.0);
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos() * std_dev
}

/// First-order autoregressive process clamped into `[lo, hi]`.
struct Ar1 {
    alpha: f64,
    noise_std: f64,
    lo: f64,
    hi: f64,
    state: f64,
    rng: StdRng,
}

impl Ar1 {
    fn new(alpha: f64, noise_std: f64, lo: f64, hi: f64, start: f64, seed: u64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            noise_std: noise_std.max(0.0),
            lo,
            hi,
            state: start,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn step(&mut self, mean: f64) -> f64 {
        let eps = mean + gaussian_noise(&mut self.rng, self.noise_std);
        self.state = (self.alpha * self.state + (1.0 - self.alpha) * eps).clamp(self.lo, self.hi);
        self.state
    }
}

/// Seasonal position in `[-1, 1]`: 1 at the summer solstice, -1 in mid-winter.
fn summerness(day_of_year: f64) -> f64 {
    (2.0 * PI * (day_of_year - SUMMER_SOLSTICE_DOY) / 365.0).cos()
}

/// Fraction of peak irradiance at `hour` for a day with the given seasonality.
fn solar_bell(hour: f64, season: f64) -> f64 {
    let daylight = 12.0 + 4.0 * season;
    let sunrise = 12.5 - daylight / 2.0;
    let x = (hour - sunrise) / daylight;
    if !(0.0..=1.0).contains(&x) {
        return 0.0;
    }
    let peak = 0.6 + 0.25 * season;
    peak * (PI * x).sin()
}

/// Generates an hourly series with `load`, `onwind`, `offwind` and `solar`.
///
/// Output is fully determined by `cfg`.
pub fn generate(cfg: &SyntheticConfig) -> TimeSeries {
    let hours = cfg.days * 24;
    let start = cfg.start_date.and_time(chrono::NaiveTime::MIN);

    let mut load_rng = StdRng::seed_from_u64(cfg.seed);
    let mut clouds = Ar1::new(
        cfg.persistence,
        cfg.noise_std,
        0.2,
        1.0,
        0.8,
        cfg.seed.wrapping_add(1),
    );
    let mut onwind = Ar1::new(
        cfg.persistence,
        cfg.noise_std,
        0.0,
        1.0,
        cfg.onwind_mean,
        cfg.seed.wrapping_add(2),
    );
    let mut offwind = Ar1::new(
        cfg.persistence,
        cfg.noise_std,
        0.0,
        1.0,
        cfg.offwind_mean,
        cfg.seed.wrapping_add(3),
    );

    let mut timestamps = Vec::with_capacity(hours);
    let mut load_mw = Vec::with_capacity(hours);
    let mut solar = Vec::with_capacity(hours);
    let mut on = Vec::with_capacity(hours);
    let mut off = Vec::with_capacity(hours);

    for h in 0..hours {
        let ts = start + TimeDelta::hours(h as i64);
        let hour = (h % 24) as f64;
        let doy = f64::from(ts.date().ordinal());
        let season = summerness(doy);
        let weekday = ts.date().weekday().num_days_from_monday();

        let daily = (2.0 * PI * (hour - 6.0) / 24.0).sin();
        let weekly = if weekday >= 5 { 1.0 - cfg.weekend_dip } else { 1.0 };
        let seasonal = 1.0 - cfg.seasonal_amplitude * season;
        let load_gw = (cfg.mean_load_gw * seasonal * weekly * (1.0 + cfg.daily_amplitude * daily)
            + gaussian_noise(&mut load_rng, cfg.load_noise_gw))
        .max(0.0);

        // winter is windier
        let wind_shift = -0.08 * season;
        let cloud = clouds.step(0.8);

        timestamps.push(ts);
        load_mw.push(load_gw * 1e3);
        solar.push((solar_bell(hour, season) * cloud).clamp(0.0, 1.0));
        on.push(onwind.step(cfg.onwind_mean + wind_shift));
        off.push(offwind.step(cfg.offwind_mean + wind_shift));
    }

    let mut profiles = BTreeMap::new();
    profiles.insert("onwind".to_string(), on);
    profiles.insert("offwind".to_string(), off);
    profiles.insert("solar".to_string(), solar);

    TimeSeries {
        timestamps,
        load_mw,
        profiles,
        weighting_hours: 1.0,
    }
}

//! Capacity-expansion planning for a low-carbon electricity system, plus an
//! analysis of existing EV charging infrastructure.

#[cfg(feature = "api")]
pub mod api;
/// Charging-station register, district geometry and proximity analysis.
pub mod charging;
pub mod config;
/// Cost assumptions and demand/renewable time series.
pub mod data;
pub mod error;
pub mod io;
pub mod logging;
/// Network model, LP formulation, statistics and CO₂ sweep.
pub mod model;
pub mod runner;

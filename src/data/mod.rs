//! Input data: technology costs and demand/renewable time series.

pub mod costs;
pub mod synthetic;
pub mod timeseries;

pub use costs::{CostTable, TechnologyCosts};
pub use synthetic::SyntheticConfig;
pub use timeseries::TimeSeries;

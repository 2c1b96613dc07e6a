//! Network model, LP formulation and result statistics.

pub mod builder;
pub mod network;
pub mod optimize;
pub mod sensitivity;
pub mod solution;
pub mod statistics;

pub use builder::build_network;
pub use network::Network;
pub use optimize::optimize;
pub use sensitivity::{SensitivityTable, co2_sweep};
pub use solution::OptimizedNetwork;
pub use statistics::Statistics;

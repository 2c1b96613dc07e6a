//! Analysis of public EV charging infrastructure from the national register.

pub mod analysis;
pub mod geo;
pub mod register;

pub use analysis::{ChargingAnalysis, ChargingQuery, analyze};
pub use geo::{Districts, TrafficNode};
pub use register::{ChargingRegister, ChargingStation};

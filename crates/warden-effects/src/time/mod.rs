//! Time effect handlers

mod real;
mod simulated;

pub use real::RealTimeHandler;
pub use simulated::SimulatedTimeHandler;

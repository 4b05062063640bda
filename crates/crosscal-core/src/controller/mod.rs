//! # Controller Module
//!
//! The cross-calibration stage controller and the results it reports.

mod stage;

pub use stage::*;

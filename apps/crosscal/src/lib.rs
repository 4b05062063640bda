//! # crosscal
//!
//! Command-line front end of the cross-calibration stage. The binary in
//! `main.rs` only sets up logging and maps errors to an exit status; the
//! commands live in [`cli`] so they can be driven from tests.

pub mod cli;

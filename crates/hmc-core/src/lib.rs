//! Regression harness for HMC lattice-simulation test executables.
//!
//! A run looks up the reference row in `{test_name}_expected.txt`, executes
//! the simulation binary, extracts plaquette and checkpoint checksums from
//! its captured log and compares them for exact equality.

pub mod cleanup;
pub mod comparison;
pub mod domain;
pub mod expectations;
pub mod output;
pub mod report;
pub mod runner;
pub mod suite;

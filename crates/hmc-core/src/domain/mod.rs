pub mod errors;

pub use errors::{HarnessError, HarnessErrorCategory, HarnessResult};

use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Whether the simulation ran on an accelerator build or a plain CPU build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionMode {
    #[default]
    Cpu,
    Gpu,
}

impl ExecutionMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Gpu => "GPU",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "CPU" => Some(Self::Cpu),
            "GPU" => Some(Self::Gpu),
            _ => None,
        }
    }
}

impl Display for ExecutionMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Key selecting one row of an expectations file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpectationKey {
    /// Basic layout, matched on the leading `grid mpi` fields.
    Configuration { grid: String, mpi: String },
    /// Extended layout, matched on the leading line index.
    Line { index: usize },
}

impl ExpectationKey {
    pub fn configuration(grid: impl Into<String>, mpi: impl Into<String>) -> Self {
        Self::Configuration {
            grid: grid.into(),
            mpi: mpi.into(),
        }
    }

    pub const fn line(index: usize) -> Self {
        Self::Line { index }
    }
}

impl Display for ExpectationKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration { grid, mpi } => write!(f, "grid={} mpi={}", grid, mpi),
            Self::Line { index } => write!(f, "line={}", index),
        }
    }
}

/// Run parameters only the extended expectations layout records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExpectedRunParameters {
    pub threads: u32,
    pub md_steps: u32,
    pub trajectory_length: f64,
    pub mode: ExecutionMode,
}

/// The three observables every run is compared on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedValues {
    pub plaquette: f64,
    pub checksum_rng: String,
    pub checksum_lat: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpectationRow {
    pub key: ExpectationKey,
    pub grid: String,
    pub mpi: String,
    pub parameters: Option<ExpectedRunParameters>,
    pub values: ExtractedValues,
    pub source_line: usize,
}

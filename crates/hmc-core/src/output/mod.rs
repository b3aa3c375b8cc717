//! Extraction of regression observables from a captured simulation log.

mod parser;

pub use parser::{
    ACCELERATOR_MARKER, CHECKSUM_MARKER, MD_STEPS_MARKER, NERSC_WRITE_MARKER, OutputLine,
    TRAJECTORY_LENGTH_MARKER, classify_line, reports_accelerator,
};

use crate::domain::{ExecutionMode, ExpectedRunParameters, ExtractedValues, HarnessError};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SAVE_INTERVAL_HINT: &str = "Make sure you compile the test with CPparams.saveInterval=1 in order to produce the required output.";

#[derive(Debug, thiserror::Error)]
pub enum OutputScanError {
    #[error("failed to read captured output '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(
        "error reading values from output file '{}': missing {}. {}",
        path.display(),
        missing.join(", "),
        SAVE_INTERVAL_HINT
    )]
    Incomplete {
        path: PathBuf,
        missing: Vec<&'static str>,
    },
    #[error("run configuration does not match expectation: {}", mismatches.join("; "))]
    ConfigurationMismatch { mismatches: Vec<String> },
}

impl From<OutputScanError> for HarnessError {
    fn from(error: OutputScanError) -> Self {
        let message = error.to_string();
        match error {
            OutputScanError::Read { .. } => HarnessError::io_system("IO.OUTPUT_READ", message),
            OutputScanError::Incomplete { .. } => {
                HarnessError::computation("RUN.INCOMPLETE_OUTPUT", message)
            }
            OutputScanError::ConfigurationMismatch { .. } => {
                HarnessError::computation("RUN.CONFIGURATION_MISMATCH", message)
            }
        }
    }
}

/// Values found in the log. Each field is filled by the first line that
/// carries it; later duplicates are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputRecord {
    pub plaquette: Option<f64>,
    pub checksum_rng: Option<String>,
    pub checksum_lat: Option<String>,
    pub md_steps: Option<u32>,
    pub trajectory_length: Option<f64>,
    pub accelerator_seen: bool,
}

impl OutputRecord {
    pub fn mode(&self) -> ExecutionMode {
        if self.accelerator_seen {
            ExecutionMode::Gpu
        } else {
            ExecutionMode::Cpu
        }
    }

    fn absorb(&mut self, line: OutputLine) {
        match line {
            OutputLine::RngChecksum(checksum) => {
                fill_once(&mut self.checksum_rng, checksum, "rng checksum")
            }
            OutputLine::LatticeChecksum {
                checksum,
                plaquette,
            } => {
                fill_once(&mut self.checksum_lat, checksum, "lat checksum");
                fill_once(&mut self.plaquette, plaquette, "plaquette");
            }
            OutputLine::MdSteps(steps) => fill_once(&mut self.md_steps, steps, "MD steps"),
            OutputLine::TrajectoryLength(length) => {
                fill_once(&mut self.trajectory_length, length, "trajectory length")
            }
            OutputLine::Unrecognized(_) => {}
        }
    }
}

fn fill_once<T: std::fmt::Debug>(slot: &mut Option<T>, value: T, what: &str) {
    if let Some(existing) = slot {
        debug!(field = what, ?existing, ignored = ?value, "duplicate value in output");
        return;
    }
    *slot = Some(value);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnrecognizedLine {
    pub line_number: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputScan {
    pub path: PathBuf,
    pub record: OutputRecord,
    pub unrecognized_lines: Vec<UnrecognizedLine>,
}

impl OutputScan {
    pub fn unrecognized_count(&self) -> usize {
        self.unrecognized_lines.len()
    }

    /// Plaquette and both checksums, or an error naming what is missing.
    pub fn require_values(&self) -> Result<ExtractedValues, OutputScanError> {
        let record = &self.record;
        match (
            record.plaquette,
            record.checksum_rng.as_ref(),
            record.checksum_lat.as_ref(),
        ) {
            (Some(plaquette), Some(checksum_rng), Some(checksum_lat)) => Ok(ExtractedValues {
                plaquette,
                checksum_rng: checksum_rng.clone(),
                checksum_lat: checksum_lat.clone(),
            }),
            _ => {
                let mut missing = Vec::new();
                if record.plaquette.is_none() {
                    missing.push("plaquette");
                }
                if record.checksum_rng.is_none() {
                    missing.push("rng checksum");
                }
                if record.checksum_lat.is_none() {
                    missing.push("lat checksum");
                }
                Err(OutputScanError::Incomplete {
                    path: self.path.clone(),
                    missing,
                })
            }
        }
    }

    /// Checks MD steps, trajectory length and execution mode reported by the
    /// run against the extended expectation row. A value the log never
    /// reported counts as a mismatch.
    pub fn verify_configuration(
        &self,
        expected: &ExpectedRunParameters,
    ) -> Result<(), OutputScanError> {
        let record = &self.record;
        let mut mismatches = Vec::new();

        match record.md_steps {
            Some(steps) if steps == expected.md_steps => {}
            Some(steps) => mismatches.push(format!(
                "MD steps actual={} , expected={}",
                steps, expected.md_steps
            )),
            None => mismatches.push(format!(
                "MD steps not reported (expected={})",
                expected.md_steps
            )),
        }

        match record.trajectory_length {
            Some(length) if length == expected.trajectory_length => {}
            Some(length) => mismatches.push(format!(
                "trajectory length actual={} , expected={}",
                length, expected.trajectory_length
            )),
            None => mismatches.push(format!(
                "trajectory length not reported (expected={})",
                expected.trajectory_length
            )),
        }

        if record.mode() != expected.mode {
            mismatches.push(format!(
                "execution mode actual={} , expected={}",
                record.mode(),
                expected.mode
            ));
        }

        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(OutputScanError::ConfigurationMismatch { mismatches })
        }
    }
}

pub fn scan_output(path: impl AsRef<Path>) -> Result<OutputScan, OutputScanError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| OutputScanError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(scan_output_text(path, &String::from_utf8_lossy(&bytes)))
}

pub fn scan_output_text(path: impl Into<PathBuf>, content: &str) -> OutputScan {
    let path = path.into();
    let mut record = OutputRecord::default();
    let mut unrecognized_lines = Vec::new();

    for (index, line) in content.lines().enumerate() {
        record.accelerator_seen |= reports_accelerator(line);
        let Some(classified) = classify_line(line) else {
            continue;
        };

        if let OutputLine::Unrecognized(text) = &classified {
            warn!(
                path = %path.display(),
                line = index + 1,
                "picked wrong line: {}",
                text
            );
            unrecognized_lines.push(UnrecognizedLine {
                line_number: index + 1,
                text: text.clone(),
            });
        }
        record.absorb(classified);
    }

    OutputScan {
        path,
        record,
        unrecognized_lines,
    }
}

//! Reference values for regression runs.
//!
//! Each test executable has a sibling `{test_name}_expected.txt` holding one
//! whitespace-separated row per run configuration. Rows are looked up either
//! by their leading `grid mpi` pair (basic layout) or by their leading line
//! index (extended layout, which also records threads, MD steps, trajectory
//! length and execution mode).

mod parser;

pub use parser::{ExpectationFormat, parse_expectation_line};

use crate::domain::{ExpectationKey, ExpectationRow, HarnessError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const EXPECTATIONS_FILE_SUFFIX: &str = "_expected.txt";

#[derive(Debug, thiserror::Error)]
pub enum ExpectationError {
    #[error("failed to read expectations file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no expectation row for {key} in '{}'", path.display())]
    NotFound { path: PathBuf, key: ExpectationKey },
    #[error("malformed expectation row at '{}' line {line}: {message}", path.display())]
    MalformedRow {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

impl From<ExpectationError> for HarnessError {
    fn from(error: ExpectationError) -> Self {
        let message = error.to_string();
        match error {
            ExpectationError::Read { .. } => {
                HarnessError::io_system("IO.EXPECTATIONS_READ", message)
            }
            ExpectationError::NotFound { .. } => {
                HarnessError::input_validation("INPUT.EXPECTATION_NOT_FOUND", message)
            }
            ExpectationError::MalformedRow { .. } => {
                HarnessError::input_validation("INPUT.EXPECTATION_ROW", message)
            }
        }
    }
}

pub fn expectations_path(dir: impl AsRef<Path>, test_name: &str) -> PathBuf {
    dir.as_ref().join(format!("{test_name}{EXPECTATIONS_FILE_SUFFIX}"))
}

/// Returns the first row of `path` whose leading fields equal `key`.
pub fn read_expected(
    path: impl AsRef<Path>,
    key: &ExpectationKey,
) -> Result<ExpectationRow, ExpectationError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ExpectationError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    find_expected(&content, key).map_err(|failure| match failure {
        LookupFailure::NotFound => ExpectationError::NotFound {
            path: path.to_path_buf(),
            key: key.clone(),
        },
        LookupFailure::Malformed { line, message } => ExpectationError::MalformedRow {
            path: path.to_path_buf(),
            line,
            message,
        },
    })
}

enum LookupFailure {
    NotFound,
    Malformed { line: usize, message: String },
}

fn find_expected(content: &str, key: &ExpectationKey) -> Result<ExpectationRow, LookupFailure> {
    for (index, line) in content.lines().enumerate() {
        if parser::is_skippable(line) {
            continue;
        }

        let fields = line.split_whitespace().collect::<Vec<_>>();
        if !parser::key_matches(&fields, key) {
            continue;
        }

        let line_number = index + 1;
        debug!(line = line_number, %key, "matched expectation row");
        return parse_expectation_line(line, key, line_number).map_err(|message| {
            LookupFailure::Malformed {
                line: line_number,
                message,
            }
        });
    }

    Err(LookupFailure::NotFound)
}

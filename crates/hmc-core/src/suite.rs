//! Manifest-driven runs: several regression cases executed one after another
//! in soft-check mode, with a single aggregate report.

use crate::cleanup::normalize_path;
use crate::domain::{ExpectationKey, HarnessError, HarnessResult};
use crate::report::{current_unix_timestamp_seconds, write_report_file};
use crate::runner::{RunConfig, RunReport, run_regression_case};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct SuiteConfig {
    pub manifest_path: PathBuf,
    pub work_dir: PathBuf,
    pub report_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuiteManifest {
    #[serde(default)]
    pub cases: Vec<SuiteCase>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuiteCase {
    #[serde(rename = "testName")]
    pub test_name: String,
    #[serde(default)]
    pub grid: Option<String>,
    #[serde(default)]
    pub mpi: Option<String>,
    #[serde(default)]
    pub line: Option<usize>,
    #[serde(default)]
    pub threads: Option<u32>,
}

impl SuiteCase {
    pub fn key(&self) -> Option<ExpectationKey> {
        match (self.line, &self.grid, &self.mpi) {
            (Some(line), _, _) => Some(ExpectationKey::line(line)),
            (None, Some(grid), Some(mpi)) => Some(ExpectationKey::configuration(grid, mpi)),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    #[error("failed to read suite manifest '{}': {source}", path.display())]
    ReadManifest {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse suite manifest '{}': {source}", path.display())]
    ParseManifest {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("suite case {index} ('{test_name}') needs either 'line' or both 'grid' and 'mpi'")]
    IncompleteCase { index: usize, test_name: String },
}

impl From<SuiteError> for HarnessError {
    fn from(error: SuiteError) -> Self {
        let message = error.to_string();
        match error {
            SuiteError::ReadManifest { .. } => {
                HarnessError::io_system("IO.SUITE_MANIFEST", message)
            }
            SuiteError::ParseManifest { .. } | SuiteError::IncompleteCase { .. } => {
                HarnessError::input_validation("INPUT.SUITE_MANIFEST", message)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseFailure {
    pub category: String,
    pub placeholder: String,
    pub message: String,
}

impl From<&HarnessError> for CaseFailure {
    fn from(error: &HarnessError) -> Self {
        Self {
            category: error.category().as_str().to_string(),
            placeholder: error.placeholder().to_string(),
            message: error.message().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub test_name: String,
    pub key: ExpectationKey,
    pub passed: bool,
    pub error: Option<CaseFailure>,
    pub run: Option<RunReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub generated_at_unix_seconds: u64,
    pub passed: bool,
    pub manifest_path: String,
    pub case_count: usize,
    pub passed_case_count: usize,
    pub failed_case_count: usize,
    pub cases: Vec<CaseReport>,
}

pub fn load_manifest(manifest_path: &Path) -> Result<SuiteManifest, SuiteError> {
    let content = fs::read_to_string(manifest_path).map_err(|source| SuiteError::ReadManifest {
        path: manifest_path.to_path_buf(),
        source,
    })?;
    let manifest: SuiteManifest =
        serde_json::from_str(&content).map_err(|source| SuiteError::ParseManifest {
            path: manifest_path.to_path_buf(),
            source,
        })?;

    for (index, case) in manifest.cases.iter().enumerate() {
        if case.key().is_none() {
            return Err(SuiteError::IncompleteCase {
                index,
                test_name: case.test_name.clone(),
            });
        }
    }
    Ok(manifest)
}

/// Runs every manifest case. A fatal error in one case is recorded in its
/// report and does not stop the remaining cases.
pub fn run_suite(config: &SuiteConfig) -> HarnessResult<SuiteReport> {
    let manifest = load_manifest(&config.manifest_path)?;

    let mut cases = Vec::with_capacity(manifest.cases.len());
    for case in &manifest.cases {
        let Some(key) = case.key() else {
            continue;
        };
        let run_config = RunConfig::new(&case.test_name, &config.work_dir, key.clone())
            .with_threads(case.threads);

        let report = match run_regression_case(&run_config) {
            Ok(run) => CaseReport {
                test_name: case.test_name.clone(),
                key,
                passed: run.passed,
                error: None,
                run: Some(run),
            },
            Err(error) => {
                warn!(test = %case.test_name, %key, "{}", error.diagnostic_line());
                CaseReport {
                    test_name: case.test_name.clone(),
                    key,
                    passed: false,
                    error: Some(CaseFailure::from(&error)),
                    run: None,
                }
            }
        };
        cases.push(report);
    }

    let case_count = cases.len();
    let passed_case_count = cases.iter().filter(|case| case.passed).count();
    let failed_case_count = case_count.saturating_sub(passed_case_count);
    info!(case_count, failed_case_count, "suite finished");

    let report = SuiteReport {
        generated_at_unix_seconds: current_unix_timestamp_seconds(),
        passed: failed_case_count == 0,
        manifest_path: normalize_path(&config.manifest_path),
        case_count,
        passed_case_count,
        failed_case_count,
        cases,
    };

    if let Some(report_path) = &config.report_path {
        write_report_file(report_path, &report)?;
    }
    Ok(report)
}

pub fn render_suite_summary(report: &SuiteReport) -> String {
    let mut lines = Vec::new();
    let status = if report.passed { "PASS" } else { "FAIL" };
    lines.push(format!("Suite status: {}", status));
    lines.push(format!(
        "Cases: {} total ({} passed, {} failed)",
        report.case_count, report.passed_case_count, report.failed_case_count
    ));

    for case in &report.cases {
        let case_status = if case.passed { "PASS" } else { "FAIL" };
        lines.push(format!("Case {} [{}]: {}", case.test_name, case.key, case_status));

        if let Some(error) = &case.error {
            lines.push(format!("  [{}] {}", error.placeholder, error.message));
        }
        if let Some(run) = &case.run {
            for message in run.failure_messages() {
                lines.push(format!("  {}", message));
            }
        }
    }

    lines.join("\n")
}

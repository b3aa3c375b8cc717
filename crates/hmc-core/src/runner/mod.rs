//! One regression case: look up the expectation, run the simulation binary,
//! extract and compare its observables, then clean up after it.

use crate::cleanup::{ArtifactPaths, CleanupOutcome, cleanup_artifacts, normalize_path};
use crate::comparison::{ComparisonPolicy, ComparisonReport, compare_values};
use crate::domain::{
    ExecutionMode, ExpectationKey, ExpectationRow, ExtractedValues, HarnessError, HarnessResult,
};
use crate::expectations::{expectations_path, read_expected};
use crate::output::{OutputScan, UnrecognizedLine, scan_output};
use crate::report::{current_unix_timestamp_seconds, write_report_file};
use serde::Serialize;
use std::fs::File;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, info, warn};

pub const THERMALIZATIONS: u32 = 0;
pub const TRAJECTORIES: u32 = 1;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub test_name: String,
    pub work_dir: PathBuf,
    pub executable: PathBuf,
    pub expectations_path: PathBuf,
    pub key: ExpectationKey,
    /// Overrides the thread count of an extended expectation row.
    pub threads: Option<u32>,
    pub artifacts: ArtifactPaths,
    pub policy: ComparisonPolicy,
    pub report_path: Option<PathBuf>,
}

impl RunConfig {
    /// Conventional layout: `./{test_name}` next to
    /// `{test_name}_expected.txt`, with artifacts written into `work_dir`.
    pub fn new(
        test_name: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        key: ExpectationKey,
    ) -> Self {
        let test_name = test_name.into();
        let work_dir = work_dir.into();
        Self {
            executable: work_dir.join(&test_name),
            expectations_path: expectations_path(&work_dir, &test_name),
            artifacts: ArtifactPaths::in_dir(&work_dir),
            test_name,
            work_dir,
            key,
            threads: None,
            policy: ComparisonPolicy::SoftCheck,
            report_path: None,
        }
    }

    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_expectations_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.expectations_path = path.into();
        self
    }

    pub fn with_capture_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifacts.capture = path.into();
        self
    }

    pub fn with_threads(mut self, threads: Option<u32>) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_policy(mut self, policy: ComparisonPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_report_path(mut self, path: Option<PathBuf>) -> Self {
        self.report_path = path;
        self
    }
}

/// Grid, MPI layout and thread count actually passed to the binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub grid: String,
    pub mpi: String,
    pub threads: Option<u32>,
}

impl Invocation {
    pub fn resolve(config: &RunConfig, row: &ExpectationRow) -> Self {
        let threads = config
            .threads
            .or_else(|| row.parameters.map(|parameters| parameters.threads));
        Self {
            grid: row.grid.clone(),
            mpi: row.mpi.clone(),
            threads,
        }
    }

    pub fn arguments(&self) -> Vec<String> {
        let mut arguments = vec![
            "--grid".to_string(),
            self.grid.clone(),
            "--mpi".to_string(),
            self.mpi.clone(),
            "--Thermalizations".to_string(),
            THERMALIZATIONS.to_string(),
            "--Trajectories".to_string(),
            TRAJECTORIES.to_string(),
        ];
        if let Some(threads) = self.threads {
            arguments.push("--threads".to_string());
            arguments.push(threads.to_string());
        }
        arguments
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("failed to resolve executable path '{}': {source}", path.display())]
    ResolveExecutable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create capture file '{}': {source}", path.display())]
    CreateCapture {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to execute '{}': {source}", program.display())]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
}

impl From<RunnerError> for HarnessError {
    fn from(error: RunnerError) -> Self {
        let message = error.to_string();
        match error {
            RunnerError::ResolveExecutable { .. } => {
                HarnessError::input_validation("INPUT.EXECUTABLE_PATH", message)
            }
            RunnerError::CreateCapture { .. } => {
                HarnessError::io_system("IO.CAPTURE_FILE", message)
            }
            RunnerError::Spawn { .. } => HarnessError::io_system("IO.EXECUTABLE_SPAWN", message),
        }
    }
}

pub fn build_command(config: &RunConfig, invocation: &Invocation) -> Result<Command, RunnerError> {
    let program =
        std::path::absolute(&config.executable).map_err(|source| RunnerError::ResolveExecutable {
            path: config.executable.clone(),
            source,
        })?;

    let mut command = Command::new(program);
    command
        .current_dir(&config.work_dir)
        .args(invocation.arguments());
    Ok(command)
}

/// Human-readable command line, for logs and reports.
pub fn render_command_line(config: &RunConfig, invocation: &Invocation) -> String {
    std::iter::once(normalize_path(&config.executable))
        .chain(invocation.arguments())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutionStatus {
    pub success: bool,
    pub exit_code: Option<i32>,
}

impl From<ExitStatus> for ExecutionStatus {
    fn from(status: ExitStatus) -> Self {
        Self {
            success: status.success(),
            exit_code: status.code(),
        }
    }
}

/// Runs the binary to completion with stdout and stderr both redirected to
/// the capture file. A non-zero exit is returned, not raised: whether the
/// run produced usable output is decided by extraction.
pub fn execute_binary(
    config: &RunConfig,
    invocation: &Invocation,
) -> Result<ExecutionStatus, RunnerError> {
    let capture_path = &config.artifacts.capture;
    let capture_error = |source: std::io::Error| RunnerError::CreateCapture {
        path: capture_path.clone(),
        source,
    };
    let stdout = File::create(capture_path).map_err(capture_error)?;
    let stderr = stdout.try_clone().map_err(capture_error)?;

    let mut command = build_command(config, invocation)?;
    command.stdout(Stdio::from(stdout)).stderr(Stdio::from(stderr));
    debug!(command = %render_command_line(config, invocation), "spawning simulation");

    // TODO: bound the wait with a timeout so a hung binary cannot block the harness.
    let status = command.status().map_err(|source| RunnerError::Spawn {
        program: config.executable.clone(),
        source,
    })?;

    let status = ExecutionStatus::from(status);
    if !status.success {
        warn!(
            test = %config.test_name,
            exit_code = ?status.exit_code,
            "simulation exited unsuccessfully"
        );
    }
    Ok(status)
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at_unix_seconds: u64,
    pub test_name: String,
    pub passed: bool,
    pub key: ExpectationKey,
    pub expectation_line: usize,
    pub invocation: Invocation,
    pub command_line: String,
    pub execution: ExecutionStatus,
    pub mode: ExecutionMode,
    pub expected: ExtractedValues,
    pub actual: ExtractedValues,
    pub comparison: ComparisonReport,
    pub unrecognized_lines: Vec<UnrecognizedLine>,
    pub cleanup: CleanupOutcome,
}

impl RunReport {
    pub fn failure_messages(&self) -> Vec<String> {
        self.comparison
            .failures()
            .filter_map(|comparison| comparison.failure_message())
            .collect()
    }
}

/// Runs one regression case end to end. Fatal conditions (no expectation
/// row, incomplete output, configuration mismatch) are returned as errors
/// after cleanup has run; value mismatches are reported in the
/// `RunReport` with `passed == false`.
pub fn run_regression_case(config: &RunConfig) -> HarnessResult<RunReport> {
    let row = read_expected(&config.expectations_path, &config.key)?;
    let invocation = Invocation::resolve(config, &row);
    info!(
        test = %config.test_name,
        key = %config.key,
        grid = %invocation.grid,
        mpi = %invocation.mpi,
        "running regression case"
    );

    let execution = match execute_binary(config, &invocation) {
        Ok(execution) => execution,
        Err(error) => {
            cleanup_artifacts(&config.artifacts, false);
            return Err(error.into());
        }
    };

    let (scan, actual) = match extract_checked(config, &row) {
        Ok(extracted) => extracted,
        Err(error) => {
            cleanup_artifacts(&config.artifacts, false);
            return Err(error);
        }
    };

    let comparison = compare_values(&actual, &row.values, config.policy);
    let cleanup = cleanup_artifacts(&config.artifacts, comparison.passed);
    info!(
        test = %config.test_name,
        passed = comparison.passed,
        unrecognized_lines = scan.unrecognized_count(),
        "regression case finished"
    );

    let report = RunReport {
        generated_at_unix_seconds: current_unix_timestamp_seconds(),
        test_name: config.test_name.clone(),
        passed: comparison.passed,
        key: config.key.clone(),
        expectation_line: row.source_line,
        command_line: render_command_line(config, &invocation),
        invocation,
        execution,
        mode: scan.record.mode(),
        expected: row.values,
        actual,
        comparison,
        unrecognized_lines: scan.unrecognized_lines,
        cleanup,
    };

    if let Some(report_path) = &config.report_path {
        write_report_file(report_path, &report)?;
    }
    Ok(report)
}

fn extract_checked(
    config: &RunConfig,
    row: &ExpectationRow,
) -> HarnessResult<(OutputScan, ExtractedValues)> {
    let scan = scan_output(&config.artifacts.capture)?;
    let actual = scan.require_values()?;
    if let Some(parameters) = &row.parameters {
        scan.verify_configuration(parameters)?;
    }
    Ok((scan, actual))
}

pub fn render_human_summary(report: &RunReport) -> String {
    let mut lines = vec![format!("Running {}", report.test_name)];
    lines.extend(report.failure_messages());
    if !report.unrecognized_lines.is_empty() {
        lines.push(format!(
            "Unrecognized output lines: {}",
            report.unrecognized_lines.len()
        ));
    }
    lines.push(if report.passed {
        "All tests passed!".to_string()
    } else {
        "Some tests failed...".to_string()
    });
    lines.join("\n")
}

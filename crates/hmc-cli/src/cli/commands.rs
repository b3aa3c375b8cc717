use super::CliError;
use super::helpers::{
    RunSettings, build_run_config, current_working_dir, emit_report, resolve_cli_path,
};
use hmc_core::comparison::ComparisonPolicy;
use hmc_core::domain::ExpectationKey;
use hmc_core::runner::{render_human_summary, run_regression_case};
use hmc_core::suite::{SuiteConfig, render_suite_summary, run_suite};
use std::path::PathBuf;
use tracing::debug;

#[derive(clap::Args)]
pub(super) struct CheckArgs {
    /// File name of the test executable
    test_name: String,

    /// Grid configuration, e.g. 8.8.8.8
    grid: String,

    /// MPI configuration, e.g. 1.1.1.1
    mpi: String,

    /// Thread count passed to the executable
    #[arg(long, default_value_t = 1)]
    threads: u32,

    #[command(flatten)]
    run: RunFlags,
}

#[derive(clap::Args)]
pub(super) struct CheckLineArgs {
    /// File name of the test executable
    test_name: String,

    /// Line index of the extended expectations row
    line: usize,

    /// Override the thread count recorded in the expectations row
    #[arg(long)]
    threads: Option<u32>,

    #[command(flatten)]
    run: RunFlags,
}

#[derive(clap::Args)]
pub(super) struct SuiteArgs {
    /// Suite manifest path
    #[arg(long)]
    manifest: PathBuf,

    /// Directory holding the test executables and expectation files
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,

    /// JSON report output path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Print the JSON report instead of the human summary
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
pub(super) struct RunFlags {
    /// Stop comparing at the first failing field
    #[arg(short, long)]
    stop: bool,

    /// Directory holding the executable, expectations and run artifacts
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,

    /// Executable path [default: <work-dir>/<test_name>]
    #[arg(long)]
    executable: Option<PathBuf>,

    /// Expectations file [default: <work-dir>/<test_name>_expected.txt]
    #[arg(long)]
    expectations: Option<PathBuf>,

    /// Capture file for the executable's output [default: <work-dir>/output.txt]
    #[arg(long)]
    capture: Option<PathBuf>,

    /// JSON report output path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Print the JSON report instead of the human summary
    #[arg(long)]
    json: bool,
}

impl RunFlags {
    fn into_settings(
        self,
        test_name: String,
        key: ExpectationKey,
        threads: Option<u32>,
    ) -> RunSettings {
        RunSettings {
            test_name,
            key,
            threads,
            policy: if self.stop {
                ComparisonPolicy::StopOnFailure
            } else {
                ComparisonPolicy::SoftCheck
            },
            work_dir: self.work_dir,
            executable: self.executable,
            expectations: self.expectations,
            capture: self.capture,
            report: self.report,
            json: self.json,
        }
    }
}

pub(super) fn run_check_command(args: CheckArgs) -> Result<i32, CliError> {
    let key = ExpectationKey::configuration(args.grid, args.mpi);
    let settings = args.run.into_settings(args.test_name, key, Some(args.threads));
    run_single_case(settings)
}

pub(super) fn run_check_line_command(args: CheckLineArgs) -> Result<i32, CliError> {
    let key = ExpectationKey::line(args.line);
    let settings = args.run.into_settings(args.test_name, key, args.threads);
    run_single_case(settings)
}

fn run_single_case(settings: RunSettings) -> Result<i32, CliError> {
    let json = settings.json;
    let working_dir = current_working_dir()?;
    let config = build_run_config(settings, &working_dir);
    debug!(
        test = %config.test_name,
        key = %config.key,
        executable = %config.executable.display(),
        "resolved run configuration"
    );

    let report = run_regression_case(&config)?;
    if json {
        emit_report(&report)?;
    } else {
        println!("{}", render_human_summary(&report));
        if let Some(report_path) = &config.report_path {
            println!("JSON report: {}", report_path.display());
        }
    }

    if report.passed { Ok(0) } else { Ok(1) }
}

pub(super) fn run_suite_command(args: SuiteArgs) -> Result<i32, CliError> {
    let working_dir = current_working_dir()?;
    let config = SuiteConfig {
        manifest_path: resolve_cli_path(&working_dir, &args.manifest),
        work_dir: resolve_cli_path(&working_dir, &args.work_dir),
        report_path: args.report.map(|path| resolve_cli_path(&working_dir, &path)),
    };

    let report = run_suite(&config)?;
    if args.json {
        emit_report(&report)?;
    } else {
        println!("{}", render_suite_summary(&report));
        if let Some(report_path) = &config.report_path {
            println!("JSON report: {}", report_path.display());
        }
    }

    if report.passed { Ok(0) } else { Ok(1) }
}

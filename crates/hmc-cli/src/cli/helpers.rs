use super::CliError;
use anyhow::Context;
use hmc_core::comparison::ComparisonPolicy;
use hmc_core::domain::{ExpectationKey, HarnessError, HarnessResult};
use hmc_core::runner::RunConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Parsed single-case options before paths are resolved.
pub(super) struct RunSettings {
    pub(super) test_name: String,
    pub(super) key: ExpectationKey,
    pub(super) threads: Option<u32>,
    pub(super) policy: ComparisonPolicy,
    pub(super) work_dir: PathBuf,
    pub(super) executable: Option<PathBuf>,
    pub(super) expectations: Option<PathBuf>,
    pub(super) capture: Option<PathBuf>,
    pub(super) report: Option<PathBuf>,
    pub(super) json: bool,
}

pub(super) fn current_working_dir() -> HarnessResult<PathBuf> {
    std::env::current_dir().map_err(|source| {
        HarnessError::io_system(
            "IO.CLI_CURRENT_DIR",
            format!("failed to read current working directory: {}", source),
        )
    })
}

pub(super) fn resolve_cli_path(working_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir.join(path)
    }
}

pub(super) fn build_run_config(settings: RunSettings, working_dir: &Path) -> RunConfig {
    let work_dir = resolve_cli_path(working_dir, &settings.work_dir);
    let mut config = RunConfig::new(settings.test_name, &work_dir, settings.key)
        .with_threads(settings.threads)
        .with_policy(settings.policy)
        .with_report_path(settings.report.map(|path| resolve_cli_path(working_dir, &path)));

    if let Some(executable) = settings.executable {
        config = config.with_executable(resolve_cli_path(working_dir, &executable));
    }
    if let Some(expectations) = settings.expectations {
        config = config.with_expectations_path(resolve_cli_path(working_dir, &expectations));
    }
    if let Some(capture) = settings.capture {
        config = config.with_capture_path(resolve_cli_path(working_dir, &capture));
    }
    config
}

pub(super) fn emit_report<T: Serialize>(report: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize JSON report")?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{RunSettings, build_run_config};
    use hmc_core::comparison::ComparisonPolicy;
    use hmc_core::domain::ExpectationKey;
    use std::path::{Path, PathBuf};

    fn settings() -> RunSettings {
        RunSettings {
            test_name: "Test_hmc_Sp_WilsonFundFermionGauge".to_string(),
            key: ExpectationKey::configuration("8.8.8.8", "1.1.1.1"),
            threads: Some(1),
            policy: ComparisonPolicy::SoftCheck,
            work_dir: PathBuf::from("runs"),
            executable: None,
            expectations: None,
            capture: None,
            report: None,
            json: false,
        }
    }

    #[test]
    fn defaults_are_resolved_inside_the_work_dir() {
        let config = build_run_config(settings(), Path::new("/home/lattice"));

        assert_eq!(config.work_dir, Path::new("/home/lattice/runs"));
        assert_eq!(
            config.executable,
            Path::new("/home/lattice/runs/Test_hmc_Sp_WilsonFundFermionGauge")
        );
        assert_eq!(
            config.expectations_path,
            Path::new("/home/lattice/runs/Test_hmc_Sp_WilsonFundFermionGauge_expected.txt")
        );
        assert_eq!(
            config.artifacts.capture,
            Path::new("/home/lattice/runs/output.txt")
        );
        assert_eq!(
            config.artifacts.checkpoint_lat,
            Path::new("/home/lattice/runs/ckpoint_lat.1")
        );
    }

    #[test]
    fn explicit_paths_resolve_against_the_process_directory() {
        let mut settings = settings();
        settings.executable = Some(PathBuf::from("build/Test_hmc"));
        settings.capture = Some(PathBuf::from("/tmp/capture.log"));
        settings.report = Some(PathBuf::from("reports/run.json"));

        let config = build_run_config(settings, Path::new("/home/lattice"));
        assert_eq!(config.executable, Path::new("/home/lattice/build/Test_hmc"));
        assert_eq!(config.artifacts.capture, Path::new("/tmp/capture.log"));
        assert_eq!(
            config.report_path.as_deref(),
            Some(Path::new("/home/lattice/reports/run.json"))
        );
    }
}

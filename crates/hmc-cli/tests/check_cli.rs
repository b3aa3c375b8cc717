use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Mutex;
use tempfile::TempDir;

// Scripts written while another test forks can fail to exec with ETXTBSY.
static SPAWN_LOCK: Mutex<()> = Mutex::new(());

const TEST_NAME: &str = "Test_hmc_Sp_WilsonFundFermionGauge";
const RNG_LINE: &str =
    "Grid : Message : 9.8 s : Written NERSC RNG file ckpoint_rng.1 checksum 922c392f";
const LAT_LINE: &str = "Grid : Message : 9.9 s : Written NERSC Configuration on ckpoint_lat.1 checksum d1e4cc1c plaquette 0.0256253844";

#[cfg(unix)]
#[test]
fn check_command_passes_and_removes_artifacts() {
    let _guard = SPAWN_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let temp = TempDir::new().expect("tempdir should be created");
    write_expectations(
        temp.path(),
        "8.8.8.8 1.1.1.1 0.0256253844 922c392f d1e4cc1c\n",
    );
    write_fake_simulation(temp.path(), &[RNG_LINE, LAT_LINE]);

    let output = run_cli(
        temp.path(),
        &["check", TEST_NAME, "8.8.8.8", "1.1.1.1", "--work-dir", "."],
    );

    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("Running {TEST_NAME}")));
    assert!(stdout.contains("All tests passed!"));
    assert!(!temp.path().join("output.txt").exists());
    assert!(!temp.path().join("ckpoint_rng.1").exists());
    assert!(!temp.path().join("ckpoint_lat.1").exists());
}

#[cfg(unix)]
#[test]
fn lattice_checksum_mismatch_exits_with_one_and_keeps_capture() {
    let _guard = SPAWN_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let temp = TempDir::new().expect("tempdir should be created");
    write_expectations(
        temp.path(),
        "8.8.8.8 1.1.1.1 0.0256253844 922c392f d1e4cc1d\n",
    );
    write_fake_simulation(temp.path(), &[RNG_LINE, LAT_LINE]);

    let output = run_cli(temp.path(), &["check", TEST_NAME, "8.8.8.8", "1.1.1.1"]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(
        "Checksum LAT file comparison failed: actual=d1e4cc1c , expected=d1e4cc1d"
    ));
    assert!(stdout.contains("Some tests failed..."));
    assert!(temp.path().join("output.txt").exists());
    assert!(!temp.path().join("ckpoint_lat.1").exists());
}

#[cfg(unix)]
#[test]
fn stop_flag_reports_only_the_first_failure() {
    let _guard = SPAWN_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let temp = TempDir::new().expect("tempdir should be created");
    write_expectations(
        temp.path(),
        "8.8.8.8 1.1.1.1 0.5 00000000 00000000\n",
    );
    write_fake_simulation(temp.path(), &[RNG_LINE, LAT_LINE]);

    let output = run_cli(
        temp.path(),
        &["check", TEST_NAME, "8.8.8.8", "1.1.1.1", "-s"],
    );

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("plaquette comparison failed"));
    assert!(!stdout.contains("Checksum RNG file comparison failed"));
}

#[cfg(unix)]
#[test]
fn incomplete_output_is_fatal_with_computation_exit_code() {
    let _guard = SPAWN_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let temp = TempDir::new().expect("tempdir should be created");
    write_expectations(
        temp.path(),
        "8.8.8.8 1.1.1.1 0.0256253844 922c392f d1e4cc1c\n",
    );
    write_fake_simulation(temp.path(), &[RNG_LINE]);

    let output = run_cli(temp.path(), &["check", TEST_NAME, "8.8.8.8", "1.1.1.1"]);

    assert_eq!(output.status.code(), Some(4));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: [RUN.INCOMPLETE_OUTPUT]"));
    assert!(stderr.contains("FATAL EXIT CODE: 4"));
    assert!(!temp.path().join("ckpoint_rng.1").exists());
}

#[test]
fn missing_expectation_row_is_an_input_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_expectations(
        temp.path(),
        "8.8.8.8 1.1.1.1 0.0256253844 922c392f d1e4cc1c\n",
    );

    let output = run_cli(temp.path(), &["check", TEST_NAME, "4.4.4.4", "1.1.1.1"]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: [INPUT.EXPECTATION_NOT_FOUND]"));
    assert!(stderr.contains("FATAL EXIT CODE: 2"));
}

#[cfg(unix)]
#[test]
fn check_line_detects_configuration_mismatch() {
    let _guard = SPAWN_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let temp = TempDir::new().expect("tempdir should be created");
    write_expectations(
        temp.path(),
        "# line grid mpi threads steps length mode plaquette rng lat\n\
         3 8.8.8.8 1.1.1.1 1 10 1.0 CPU 0.0256253844 922c392f d1e4cc1c\n",
    );
    write_fake_simulation(
        temp.path(),
        &[
            "Grid : Integrator : 0.2 s : [Integrator] Trajectory length  : 2",
            "Grid : Integrator : 0.2 s : [Integrator] Number of MD steps : 10",
            RNG_LINE,
            LAT_LINE,
        ],
    );

    let output = run_cli(temp.path(), &["check-line", TEST_NAME, "3"]);

    assert_eq!(output.status.code(), Some(4));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: [RUN.CONFIGURATION_MISMATCH]"));
    assert!(stderr.contains("trajectory length actual=2 , expected=1"));
}

#[cfg(unix)]
#[test]
fn json_flag_prints_the_run_report() {
    let _guard = SPAWN_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let temp = TempDir::new().expect("tempdir should be created");
    write_expectations(
        temp.path(),
        "8.8.8.8 1.1.1.1 0.0256253844 922c392f d1e4cc1c\n",
    );
    write_fake_simulation(
        temp.path(),
        &["Grid : Message : 0.1 s : Written NERSC header", RNG_LINE, LAT_LINE],
    );

    let report_path = temp.path().join("reports/run.json");
    let output = run_cli(
        temp.path(),
        &[
            "check",
            TEST_NAME,
            "8.8.8.8",
            "1.1.1.1",
            "--json",
            "--report",
            "reports/run.json",
        ],
    );

    assert_eq!(output.status.code(), Some(0));
    let printed: Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be a JSON report");
    assert_eq!(printed["passed"], Value::Bool(true));
    assert_eq!(printed["test_name"], Value::from(TEST_NAME));
    assert_eq!(printed["unrecognized_lines"].as_array().map(Vec::len), Some(1));

    let written: Value = serde_json::from_str(
        &fs::read_to_string(&report_path).expect("report file should be written"),
    )
    .expect("report file should parse");
    assert_eq!(written["comparison"]["passed"], Value::Bool(true));
}

#[cfg(unix)]
#[test]
fn suite_command_runs_every_case_and_writes_report() {
    let _guard = SPAWN_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let temp = TempDir::new().expect("tempdir should be created");
    write_expectations(
        temp.path(),
        "8.8.8.8 1.1.1.1 0.0256253844 922c392f d1e4cc1c\n\
         4.4.4.4 1.1.1.1 0.0256253844 922c392f 00000000\n",
    );
    write_fake_simulation(temp.path(), &[RNG_LINE, LAT_LINE]);
    write_file(
        &temp.path().join("suite.json"),
        &format!(
            r#"
            {{
              "cases": [
                {{ "testName": "{TEST_NAME}", "grid": "8.8.8.8", "mpi": "1.1.1.1" }},
                {{ "testName": "{TEST_NAME}", "grid": "4.4.4.4", "mpi": "1.1.1.1" }}
              ]
            }}
            "#
        ),
    );

    let output = run_cli(
        temp.path(),
        &[
            "suite",
            "--manifest",
            "suite.json",
            "--report",
            "reports/suite.json",
        ],
    );

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Suite status: FAIL"));
    assert!(stdout.contains("Cases: 2 total (1 passed, 1 failed)"));

    let parsed: Value = serde_json::from_str(
        &fs::read_to_string(temp.path().join("reports/suite.json"))
            .expect("suite report should be written"),
    )
    .expect("suite report should parse");
    assert_eq!(parsed["passed_case_count"], Value::from(1));
    assert_eq!(parsed["cases"][1]["passed"], Value::Bool(false));
}

#[test]
fn missing_positional_arguments_are_a_usage_error() {
    let temp = TempDir::new().expect("tempdir should be created");

    let output = run_cli(temp.path(), &["check", TEST_NAME, "8.8.8.8"]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: [INPUT.CLI_USAGE]"));
}

#[test]
fn help_exits_successfully() {
    let temp = TempDir::new().expect("tempdir should be created");

    let output = run_cli(temp.path(), &["check", "--help"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("--stop"));
}

fn run_cli(working_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hmc-regress"))
        .args(args)
        .current_dir(working_dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("hmc-regress should run")
}

fn write_expectations(work_dir: &Path, content: &str) {
    write_file(&work_dir.join(format!("{TEST_NAME}_expected.txt")), content);
}

#[cfg(unix)]
fn write_fake_simulation(work_dir: &Path, log_lines: &[&str]) {
    use std::os::unix::fs::PermissionsExt;

    let body = log_lines
        .iter()
        .map(|line| format!("echo '{}'\n", line))
        .collect::<String>();
    let script = format!("#!/bin/sh\n{}touch ckpoint_rng.1 ckpoint_lat.1\n", body);
    let path = work_dir.join(TEST_NAME);
    write_file(&path, &script);
    let mut permissions = fs::metadata(&path)
        .expect("script metadata should be readable")
        .permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).expect("script should be made executable");
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent dir should be created");
    }
    fs::write(path, content).expect("file should be written");
}

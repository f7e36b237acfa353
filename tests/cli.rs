//! Integration tests for CLI commands.
use itertools::Itertools;
use std::fs;
use tempfile::tempdir;

mod common;
use common::{assert_gridcase_fails, assert_gridcase_runs, get_gridcase_stdout, simple_case_path};

const EXAMPLE_NAME: &str = "simple";

/// Test the `run` command
#[test]
fn check_run_command() {
    // Save results to non-existent directory to check that directory creation works
    let tempdir = tempdir().unwrap();
    let output_dir = tempdir.path().join("results");
    let case_path = simple_case_path();
    assert_gridcase_runs(&[
        "run",
        &case_path.to_string_lossy(),
        "--output-dir",
        &output_dir.to_string_lossy(),
    ]);

    for file_name in [
        "simple.xlsx",
        "simple.json",
        "simple_case_results.csv",
        "simple_time_results.csv",
        "metadata.toml",
        "gridcase_info.log",
    ] {
        assert!(output_dir.join(file_name).is_file(), "Missing {file_name}");
    }

    // Running again fails unless overwriting is allowed
    let args = [
        "run",
        &case_path.to_string_lossy(),
        "--output-dir",
        &output_dir.to_string_lossy(),
    ];
    assert_gridcase_fails(&args);
    let mut args = args.to_vec();
    args.push("--overwrite");
    assert_gridcase_runs(&args);
}

/// Test the `validate` command
#[test]
fn check_validate_command() {
    assert_gridcase_runs(&["validate", &simple_case_path().to_string_lossy()]);
}

#[test]
fn check_validate_command_bad_file() {
    let tmp = tempdir().unwrap();
    let case_path = tmp.path().join("case.csv");
    fs::write(&case_path, "COMPONENT_DATA\nEND_COMPONENT_DATA\n").unwrap();
    assert_gridcase_fails(&["validate", &case_path.to_string_lossy()]);
}

/// Test the `example list` command
#[test]
fn check_example_list_command() {
    let stdout = get_gridcase_stdout(&["example", "list"]);
    let lines = stdout.lines().collect_vec();
    assert!(lines.contains(&EXAMPLE_NAME));
}

/// Test the `example info` command
#[test]
fn check_example_info_command() {
    assert!(!get_gridcase_stdout(&["example", "info", EXAMPLE_NAME]).is_empty());
}

/// Test the `example extract` command
#[test]
fn check_example_extract_command() {
    let tmp = tempdir().unwrap();
    let output_dir = tmp.path().join("out");
    assert_gridcase_runs(&[
        "example",
        "extract",
        EXAMPLE_NAME,
        &output_dir.to_string_lossy(),
    ]);
    assert!(output_dir.join("case.csv").is_file());
}

/// Test the `settings show-default` command
#[test]
fn check_settings_show_default_command() {
    let stdout = get_gridcase_stdout(&["settings", "show-default"]);
    assert!(stdout.contains("# log_level = \"info\""));
}

/// Test the `--markdown-help` flag
#[test]
fn check_markdown_help() {
    assert!(get_gridcase_stdout(&["--markdown-help"]).contains("gridcase run"));
}

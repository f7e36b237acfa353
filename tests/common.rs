use assert_cmd::cargo_bin_cmd;
use std::path::PathBuf;

/// The case file of the bundled `simple` example
pub fn simple_case_path() -> PathBuf {
    [env!("CARGO_MANIFEST_DIR"), "demos", "simple", "case.csv"]
        .iter()
        .collect()
}

pub fn assert_gridcase_runs(args: &[&str]) {
    cargo_bin_cmd!("gridcase")
        .env("GRIDCASE_USE_DEFAULT_SETTINGS", "1")
        .args(args)
        .assert()
        .success();
}

pub fn assert_gridcase_fails(args: &[&str]) {
    cargo_bin_cmd!("gridcase")
        .env("GRIDCASE_USE_DEFAULT_SETTINGS", "1")
        .args(args)
        .assert()
        .failure();
}

/// Run gridcase and return what it printed to stdout
#[allow(dead_code)]
pub fn get_gridcase_stdout(args: &[&str]) -> String {
    let output = cargo_bin_cmd!("gridcase")
        .env("GRIDCASE_USE_DEFAULT_SETTINGS", "1")
        .args(args)
        .output()
        .unwrap();
    assert!(output.status.success());

    String::from_utf8(output.stdout).unwrap()
}

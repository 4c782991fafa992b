//! Command-line behaviour of the `framesplit` binary.

mod common;

use std::process::{Command, Output};

use common::{png_files, solid, write_tiff};

fn framesplit(arguments: &[&std::ffi::OsStr]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_framesplit"))
        .args(arguments)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run framesplit")
}

#[test]
fn missing_arguments_print_usage() {
    let output = framesplit(&[]);
    assert_eq!(output.status.code(), Some(255));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("ERROR: "), "{stdout}");
    assert!(stdout.contains("<INPUTFILE>"), "{stdout}");
}

#[test]
fn splits_and_echoes_arguments() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let input = directory.path().join("scan.tif");
    write_tiff(
        &input,
        &[solid(2, 2, [1, 1, 1, 255]), solid(2, 2, [2, 2, 2, 255])],
    );
    let basename = directory.path().join("scan");

    let output = framesplit(&[input.as_os_str(), basename.as_os_str()]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("input: {}", input.display())), "{stdout}");
    assert!(stdout.contains(&format!("basename: {}", basename.display())), "{stdout}");
    assert!(!stdout.contains("ERROR"), "{stdout}");
    assert_eq!(png_files(directory.path()), vec!["scan-0.png", "scan-1.png"]);
}

#[test]
fn unreadable_input_fails() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let input = directory.path().join("nothing.tif");
    let basename = directory.path().join("out");

    let output = framesplit(&[input.as_os_str(), basename.as_os_str()]);
    assert!(!output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ERROR: Could not decode image"), "{stdout}");
}

#[test]
fn frame_failures_still_exit_zero() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let input = directory.path().join("scan.tif");
    write_tiff(&input, &[solid(1, 1, [0, 0, 0, 255])]);
    let basename = directory.path().join("absent").join("scan");

    let output = framesplit(&[input.as_os_str(), basename.as_os_str()]);
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ERROR: Could not write PNG to "), "{stdout}");
}

#[test]
fn json_report() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let input = directory.path().join("scan.tif");
    write_tiff(&input, &[solid(1, 1, [0, 0, 0, 255])]);
    let basename = directory.path().join("scan");

    let output = framesplit(&[
        input.as_os_str(),
        basename.as_os_str(),
        std::ffi::OsStr::new("--json"),
    ]);
    assert!(output.status.success());

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(report["success"], true);
    assert_eq!(report["frame_count"], 1);
    assert_eq!(report["written"].as_array().map(Vec::len), Some(1));
    assert_eq!(report["diagnostics"].as_array().map(Vec::len), Some(0));
}

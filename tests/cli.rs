mod common;

use std::ffi::OsStr;
use std::fs;
use std::process::{Command, Output};

use common::CogBuilder;

fn run_pog<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Command::new(env!("CARGO_BIN_EXE_pog"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("pog should run")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_validate_exit_codes() {
    let dir = tempfile::tempdir().unwrap();
    let valid = dir.path().join("valid.tif");
    let broken = dir.path().join("broken.tif");
    fs::write(&valid, CogBuilder::new().build().bytes).unwrap();
    fs::write(&broken, CogBuilder::new().declared_size_delta(10).build().bytes).unwrap();

    let output = run_pog([OsStr::new("validate"), valid.as_os_str()]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("is a valid cloud optimized GeoTIFF"));

    let output = run_pog([OsStr::new("validate"), broken.as_os_str()]);
    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert!(text.starts_with("The following errors were found:\n"), "{text}");
    assert!(text.contains("The offset of the main IFD should be"), "{text}");

    let output = run_pog([OsStr::new("validate"), OsStr::new("-q"), broken.as_os_str()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());

    let missing = dir.path().join("missing.tif");
    let output = run_pog([OsStr::new("validate"), missing.as_os_str()]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_levels_table() {
    let output = run_pog(["levels"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert_eq!(text.lines().count(), 12);
    assert!(text.contains("1440 x 720"), "{text}");
    assert!(text.contains("2 4 8"), "{text}");
}

#[test]
fn test_batch_reports_failures() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.tif");
    let output = run_pog([
        OsStr::new("batch"),
        OsStr::new("-j"),
        OsStr::new("2"),
        missing.as_os_str(),
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("0 of 1 files converted"));
}

//! Binary smoke tests.

use assert_cmd::Command;

#[test]
fn help_lists_the_pipeline_stages() {
    let output = Command::cargo_bin("mjsrecon")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("discovery"));
    assert!(stdout.contains("--independent"));
}

#[test]
fn missing_target_fails_with_a_usable_message() {
    let output = Command::cargo_bin("mjsrecon")
        .unwrap()
        .arg("discovery")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("target"));
}

#[test]
fn unknown_stage_names_the_valid_set() {
    let output = Command::cargo_bin("mjsrecon")
        .unwrap()
        .args(["enumeration", "-t", "example.com"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("repo-scan"));
}

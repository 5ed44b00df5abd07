mod common;

use std::fs;

use assert_cmd::Command;
use serde_json::Value;
use tempfile::tempdir;

fn facegate() -> Command {
    Command::new(env!("CARGO_BIN_EXE_facegate"))
}

#[test]
fn help_lists_gate_options() {
    let output = facegate().arg("--help").output().expect("run --help");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in [
        "--input",
        "--detector-model",
        "--classifier-model",
        "--timeout-ms",
        "--fail-closed",
        "--json",
    ] {
        assert!(stdout.contains(flag), "help output is missing {flag}");
    }
}

#[test]
fn missing_input_path_fails() {
    facegate()
        .args(["--input", "definitely/not/here.png"])
        .assert()
        .failure();
}

#[test]
fn missing_models_fail_before_processing() {
    let dir = tempdir().expect("tempdir");
    let image = dir.path().join("face.png");
    common::write_test_image(&image).expect("write image");
    let json = dir.path().join("out.json");

    let output = facegate()
        .args([
            "--input",
            image.to_str().unwrap(),
            "--detector-model",
            dir.path().join("missing_detector.onnx").to_str().unwrap(),
            "--json",
            json.to_str().unwrap(),
        ])
        .output()
        .expect("execute CLI");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("detector model not found"),
        "unexpected stderr: {stderr}"
    );
    assert!(!json.exists());
}

#[test]
fn empty_directory_fails() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("readme.txt"), "no images here").expect("write");
    let output = facegate()
        .args(["--input", dir.path().to_str().unwrap()])
        .output()
        .expect("execute CLI");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no images found"));
}

#[test]
fn invalid_config_file_fails() {
    let dir = tempdir().expect("tempdir");
    let image = dir.path().join("face.png");
    common::write_test_image(&image).expect("write image");
    let config = dir.path().join("settings.json");
    fs::write(&config, "{ not json").expect("write config");

    facegate()
        .args([
            "--input",
            image.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
        ])
        .assert()
        .failure();
}

#[test]
fn write_config_saves_effective_settings() {
    let dir = tempdir().expect("tempdir");
    let image = dir.path().join("face.png");
    common::write_test_image(&image).expect("write image");
    let saved = dir.path().join("effective.json");

    // The models are absent, so the run itself fails after the settings are saved.
    facegate()
        .args([
            "--input",
            image.to_str().unwrap(),
            "--detector-model",
            dir.path().join("missing_detector.onnx").to_str().unwrap(),
            "--timeout-ms",
            "2000",
            "--fail-closed",
            "--write-config",
            saved.to_str().unwrap(),
        ])
        .assert()
        .failure();

    let settings: Value =
        serde_json::from_str(&fs::read_to_string(&saved).expect("read settings")).expect("parse");
    assert_eq!(settings["budgets"]["total_ms"], 2000);
    assert_eq!(settings["budgets"]["decode_checkpoint_ms"], 1400);
    assert_eq!(settings["timeout_policy"], "fail_closed");
}

#[test]
fn gate_single_image_writes_json_record() {
    let (models, temp_dir, input_path) = cli_test_setup!();
    let json_path = temp_dir.path().join("verdicts.json");

    let output = facegate()
        .args([
            "--input",
            input_path.to_str().unwrap(),
            "--detector-model",
            models.detector.to_str().unwrap(),
            "--classifier-model",
            models.classifier.to_str().unwrap(),
            "--json",
            json_path.to_str().unwrap(),
        ])
        .output()
        .expect("execute CLI");
    assert_cli_success!(output, "CLI should succeed with both models present");

    let records: Value =
        serde_json::from_str(&fs::read_to_string(&json_path).expect("read json")).expect("parse");
    let records = records.as_array().expect("array of records");
    assert_eq!(records.len(), 1);
    let verdict = records[0]["verdict"].as_str().expect("verdict string");
    assert!(verdict == "BLOCK" || verdict == "ALLOW");
    assert!(records[0]["elapsed_ms"].as_f64().is_some());
}

#[test]
fn unreachable_threshold_allows_with_no_faces() {
    let (models, _temp_dir, input_path) = cli_test_setup!();

    let output = facegate()
        .args([
            "--input",
            input_path.to_str().unwrap(),
            "--detector-model",
            models.detector.to_str().unwrap(),
            "--classifier-model",
            models.classifier.to_str().unwrap(),
            "--score-threshold",
            "2.0",
        ])
        .output()
        .expect("execute CLI");
    assert_cli_success!(output, "CLI should succeed with an unreachable threshold");

    let records: Value = serde_json::from_slice(&output.stdout).expect("stdout JSON");
    assert_eq!(records[0]["verdict"], "ALLOW");
    assert_eq!(records[0]["reason"], "no faces detected");
    assert_eq!(records[0]["faces_detected"], 0);
}

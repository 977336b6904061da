#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn synth(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("synth").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("SYNTH_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &TempDir, yaml: &str) {
    std::fs::write(dir.path().join("synth.yaml"), yaml).unwrap();
}

/// One kitchen sensor reading 10, 20, 10 and then ending; log sink.
const KITCHEN: &str = r#"
agent:
  name: kitchen-heating
actuator:
  sink: log
  input: { twin_id: did:radiator, input_id: switch }
subscription:
  program: sh
  args: ["-c", "printf '{\"sensor_reading\": 10}\\n{\"sensor_reading\": 20}\\n{\"sensor_reading\": 10}\\n'"]
streams:
  - name: kitchen
    feed: { twin_id: did:kitchen, feed_id: temperature }
    label: sensor_reading
    when: { op: le, threshold: 15 }
"#;

// ---------------------------------------------------------------------------
// synth validate
// ---------------------------------------------------------------------------

#[test]
fn validate_accepts_good_config() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, KITCHEN);
    synth(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

#[test]
fn validate_json_lists_no_warnings() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, KITCHEN);
    let output = synth(&dir).args(["validate", "--json"]).output().unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["warnings"], serde_json::json!([]));
}

#[test]
fn validate_rejects_config_without_streams() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        "actuator:\n  sink: log\n  input: { twin_id: did:radiator, input_id: switch }\n",
    );
    synth(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] no streams configured"))
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn missing_config_file_fails() {
    let dir = TempDir::new().unwrap();
    synth(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn config_path_can_come_from_env() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.yaml");
    std::fs::write(&path, KITCHEN).unwrap();
    synth(&dir)
        .env("SYNTH_CONFIG", &path)
        .arg("validate")
        .assert()
        .success();
}

// ---------------------------------------------------------------------------
// synth run
// ---------------------------------------------------------------------------

#[test]
fn run_sends_only_on_edges_then_fails_when_streams_end() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, KITCHEN);
    let output = synth(&dir).arg("run").output().unwrap();

    assert!(!output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            r#"{"turn_on":true}"#,
            r#"{"turn_on":false}"#,
            r#"{"turn_on":true}"#
        ]
    );
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("all streams ended after 3 cycles"));
}

#[test]
fn run_refuses_invalid_config() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        "actuator:\n  input: { twin_id: did:radiator, input_id: switch }\n",
    );
    synth(&dir)
        .args(["run", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"));
}

#[test]
fn run_with_http_sink_needs_token() {
    let dir = TempDir::new().unwrap();
    let yaml = KITCHEN.replace("  sink: log\n", "")
        + "host: { url: http://127.0.0.1:9, token_env: SYNTH_TEST_TOKEN_UNSET }\n"
        + "follower_twin: did:thermostat\n";
    write_config(&dir, &yaml);
    synth(&dir)
        .env_remove("SYNTH_TEST_TOKEN_UNSET")
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("SYNTH_TEST_TOKEN_UNSET is not set"));
}

// ---------------------------------------------------------------------------
// synth discover
// ---------------------------------------------------------------------------

#[test]
fn discover_without_queries_reports_nothing() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, KITCHEN);
    synth(&dir)
        .arg("discover")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to discover"));
}

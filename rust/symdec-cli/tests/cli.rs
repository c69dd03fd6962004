//! End-to-end tests for the bundled scenarios and the `symdec` binary.

use std::path::PathBuf;
use std::process::Command;

use symdec_cli::{run, Scenario};
use symdec_dec::{BackendKind, DecisionConfig};

fn scenario_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(name)
}

fn symdec() -> Command {
    Command::new(env!("CARGO_BIN_EXE_symdec"))
}

// =============================================================================
// Bundled scenarios
// =============================================================================

#[test]
fn linked_list_expectations_hold() {
    let scenario = Scenario::load(&scenario_path("linked_list.toml")).unwrap();
    let report = run(&scenario, &DecisionConfig::default()).unwrap();
    assert_eq!(report.queries.len(), 6);
    assert_eq!(report.mismatches(), 0, "{:#?}", report.queries);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn bounds_expectations_hold() {
    let scenario = Scenario::load(&scenario_path("bounds.toml")).unwrap();
    assert_eq!(scenario.name.as_deref(), Some("bounds"));
    let report = run(&scenario, &DecisionConfig::default()).unwrap();
    assert_eq!(report.queries.len(), 4);
    assert_eq!(report.exit_code(), 0, "{:#?}", report.queries);
}

#[test]
fn always_sat_misses_the_numeric_conflicts() {
    let scenario = Scenario::load(&scenario_path("bounds.toml")).unwrap();
    let config = DecisionConfig {
        backend: BackendKind::AlwaysSat,
        ..DecisionConfig::default()
    };
    let report = run(&scenario, &config).unwrap();
    assert!(report.queries.iter().all(|q| q.verdict == Some(true)));
    assert_eq!(report.mismatches(), 2);
}

// =============================================================================
// Binary
// =============================================================================

#[test]
fn init_prints_a_parseable_template() {
    let output = symdec().arg("init").output().unwrap();
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    assert_eq!(
        DecisionConfig::from_str(&text).unwrap(),
        DecisionConfig::default()
    );
}

#[test]
fn check_emits_json_and_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("symdec.toml");
    std::fs::write(&config, "[decision]\nbackend = \"builtin\"\n").unwrap();

    let output = symdec()
        .arg("check")
        .arg(scenario_path("linked_list.toml"))
        .arg("--config")
        .arg(&config)
        .arg("--json")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["backend"], "builtin");
    assert_eq!(report["queries"].as_array().map(Vec::len), Some(6));
}

#[test]
fn failed_expectation_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("symdec.toml");
    std::fs::write(&config, "[decision]\nbackend = \"always-sat\"\n").unwrap();
    let status = symdec()
        .arg("check")
        .arg(scenario_path("bounds.toml"))
        .arg("--config")
        .arg(&config)
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
}

#[test]
fn bad_config_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("symdec.toml");
    std::fs::write(&config, "[decision]\nbackend = \"nope\"\n").unwrap();
    let output = symdec()
        .arg("check")
        .arg(scenario_path("bounds.toml"))
        .arg("--config")
        .arg(&config)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown backend"));
}

#[test]
fn backends_lists_the_builtins() {
    let output = symdec().arg("backends").output().unwrap();
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    assert!(text.contains("always-sat"));
    assert!(text.contains("* builtin"));
}

//! Runs the `colony` binary against scenario files

use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;

const HAMLET: &str = r#"
[[agents]]
id = 1
name = "Ada"
skills = { construction = 3 }

[[agents]]
id = 2
name = "Bo"
skills = { construction = 3 }

[[tasks]]
key = "gather"
name = "Gather timber"
kind = "generic"
duration = 1.0

[[tasks]]
key = "hut"
name = "Build hut"
kind = "construction"
duration = 2.0
max_assignees = 2
requires = [{ skill = "construction", level = 1 }]
after = ["gather"]
"#;

fn write_scenario(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn colony(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_colony"))
        .args(args)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn validate_accepts_good_scenario() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(&dir, "hamlet.toml", HAMLET);

    let output = colony(&["validate", path.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("All 2 task(s) valid"));
}

#[test]
fn validate_rejects_bad_definition() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "broken.toml",
        r#"
        [[tasks]]
        key = "never"
        kind = "generic"
        duration = -1.0
        "#,
    );

    let output = colony(&["validate", path.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("✗ never"));
}

#[test]
fn validate_rejects_unknown_key() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(
        &dir,
        "dangling.toml",
        r#"
        [[tasks]]
        key = "roof"
        kind = "construction"
        after = ["walls"]
        "#,
    );

    let output = colony(&["validate", path.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("walls"));
}

#[test]
fn plan_prints_order_and_critical_path() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(&dir, "hamlet.toml", HAMLET);

    let output = colony(&["plan", path.to_str().unwrap()]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("1. gather"));
    assert!(text.contains("2. hut"));
    assert!(text.contains("READY NOW: gather"));
    assert!(text.contains("gather -> hut"));
}

#[test]
fn simulate_json_completes_everything() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(&dir, "hamlet.toml", HAMLET);

    let output = colony(&["simulate", path.to_str().unwrap(), "--ticks", "20", "--json"]);
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["tasks"]["total"], 2);
    assert_eq!(report["tasks"]["completion_rate"], 1.0);
    assert_eq!(report["collaboration"]["completed_groups"], 1);
}

#[test]
fn config_file_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(&dir, "hamlet.toml", HAMLET);
    let config = write_scenario(
        &dir,
        "colony.toml",
        r#"
        [work]
        skill_divisor = 0.0
        "#,
    );

    // a zero divisor is rejected while loading
    let output = colony(&[
        "--config",
        config.to_str().unwrap(),
        "simulate",
        scenario.to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("skill_divisor"));
}

#[test]
fn demo_is_deterministic() {
    let first = colony(&["demo", "--seed", "7", "--agents", "5", "--ticks", "30"]);
    let second = colony(&["demo", "--seed", "7", "--agents", "5", "--ticks", "30"]);
    assert!(first.status.success());
    assert_eq!(stdout(&first), stdout(&second));
    assert!(stdout(&first).contains("Demo colony: seed 7, 5 settlers, 6 tasks"));
}

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const CONFIG: &str = r#"
[tasks]
fmt = "true"

[groups.test]
depends_on = ["fmt"]

[groups.test.tasks.unit]
command = "true"

[tasks.release]
command = "true"
depends_on = ["test"]
"#;

fn write_config(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("shut.toml");
    fs::write(&path, content).unwrap();
    path
}

fn shut(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_shut"))
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .unwrap()
}

fn json_ids(output: &Output) -> Vec<String> {
    assert!(output.status.success(), "{:?}", output);
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_plan_all() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), CONFIG);

    let output = shut(&config, &["plan", "--json"]);
    assert_eq!(json_ids(&output), vec!["fmt", "test:unit", "release"]);
}

#[test]
fn test_plan_selection() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), CONFIG);

    let output = shut(&config, &["plan", "test", "--json"]);
    assert_eq!(json_ids(&output), vec!["fmt", "test:unit"]);

    let output = shut(&config, &["plan", "nope"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope"));
}

#[test]
fn test_list_json() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), CONFIG);

    let output = shut(&config, &["list", "--json"]);
    assert!(output.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 3);

    let unit = rows.iter().find(|r| r["id"] == "test:unit").unwrap();
    assert_eq!(unit["group"], "test");
    assert_eq!(unit["dependencies"], serde_json::json!(["fmt"]));

    let fmt = rows.iter().find(|r| r["id"] == "fmt").unwrap();
    assert!(fmt["group"].is_null());
}

#[test]
fn test_run_success() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), CONFIG);

    let output = shut(&config, &["run", "--no-progress"]);
    assert!(output.status.success(), "{:?}", output);
}

#[test]
fn test_run_failure_exit_code() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        r#"
[tasks]
broken = "false"

[tasks.after]
command = "touch after.txt"
depends_on = ["broken"]
"#,
    );

    let output = shut(&config, &["run", "--no-progress"]);
    assert_eq!(output.status.code(), Some(1));
    // Dependants still run by default.
    assert!(dir.path().join("after.txt").exists());

    fs::remove_file(dir.path().join("after.txt")).unwrap();
    let output = shut(&config, &["run", "--no-progress", "--on-failure", "halt"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!dir.path().join("after.txt").exists());
}

#[test]
fn test_missing_config() {
    let dir = TempDir::new().unwrap();
    let output = shut(&dir.path().join("shut.toml"), &["list"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Config file not found"));
}

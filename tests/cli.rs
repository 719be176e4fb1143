//! Command-line behaviour of the `chunkgraph` binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn chunkgraph(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("chunkgraph").unwrap();
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    cmd
}

fn initialized() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    chunkgraph(&dir).arg("init").assert().success();
    dir
}

#[test]
fn test_init_writes_manifest() {
    let dir = tempfile::tempdir().unwrap();
    chunkgraph(&dir)
        .arg("init")
        .assert()
        .success()
        .stderr(predicate::str::contains("Created chunkgraph.toml"));
    assert!(dir.path().join("chunkgraph.toml").exists());
}

#[test]
fn test_init_refuses_to_overwrite() {
    let dir = initialized();
    chunkgraph(&dir)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    chunkgraph(&dir).args(["init", "--force"]).assert().success();
}

#[test]
fn test_build_prints_summary() {
    let dir = initialized();
    chunkgraph(&dir)
        .arg("build")
        .assert()
        .success()
        .stderr(predicate::str::contains("Sealed 5 module(s) into 3 chunk(s)"))
        .stderr(predicate::str::contains("./src/settings.js"));
}

#[test]
fn test_build_json() {
    let dir = initialized();
    let output = chunkgraph(&dir).args(["build", "--json"]).output().unwrap();
    assert!(output.status.success());

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["project"], "my-app");
    let chunks = result["chunks"].as_array().unwrap();
    assert_eq!(chunks.len(), 3);

    let settings = chunks.iter().find(|c| c["id"] == "settings").unwrap();
    assert_eq!(settings["modules"], serde_json::json!(["./src/settings.js"]));
    assert_eq!(settings["initial"], false);

    let admin = result["entrypoints"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["name"] == "admin")
        .unwrap();
    assert_eq!(admin["runtime_chunk"], "main");
}

#[test]
fn test_build_is_reproducible() {
    let dir = initialized();
    let hash = || {
        let output = chunkgraph(&dir).args(["build", "--json"]).output().unwrap();
        let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        result["full_hash"].as_str().unwrap().to_string()
    };
    assert_eq!(hash(), hash());
}

#[test]
fn test_max_chunks_merges() {
    let dir = initialized();
    let output = chunkgraph(&dir)
        .args(["build", "--json", "--max-chunks", "1"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    // the two entry chunks can never be merged
    assert_eq!(result["chunks"].as_array().unwrap().len(), 2);
}

#[test]
fn test_missing_manifest() {
    let dir = tempfile::tempdir().unwrap();
    chunkgraph(&dir)
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn test_invalid_entry_configuration() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("chunkgraph.toml"),
        r#"
[project]
name = "broken"

[entrypoints.a]
import = ["./a.js"]
depend_on = ["b"]

[entrypoints.b]
import = ["./b.js"]
depend_on = ["a"]

[[modules]]
id = "./a.js"

[[modules]]
id = "./b.js"
"#,
    )
    .unwrap();
    chunkgraph(&dir)
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("circular"));
}

// Copyright 2025 The Drasi Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Integration tests for the `druid-eks` binary.
//!
//! These tests verify that the commands:
//! - Synthesize a manifest for a valid release
//! - Exit non-zero printing `<Kind>: <identifier>` on errors
//! - Still write the partial manifest when some units fail

mod test_support;

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;
use test_support::fixtures::write_documents;

const INVOCATION: &str = r#"
context:
  deployment:eks:druid:release: analytics
  deployment:account: "000000000000"
tags:
  deployment:tags:
    team: data
release: conf.yaml
output: out
logLevel: warn
"#;

/// Run the binary against an invocation file and capture output
fn run(config: &Path, args: &[&str]) -> (bool, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_druid-eks"))
        .args(args)
        .arg("--config")
        .arg(config)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute druid-eks");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (output.status.success(), stdout, stderr)
}

fn setup(invocation: &str) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    write_documents(temp_dir.path());
    fs::write(temp_dir.path().join("deployment.yaml"), invocation).unwrap();
    temp_dir
}

#[test]
fn test_synth_writes_manifest() {
    let temp_dir = setup(INVOCATION);

    let (success, stdout, stderr) = run(&temp_dir.path().join("deployment.yaml"), &["synth"]);

    assert!(success, "synth should succeed: {stderr}");
    assert!(stdout.contains("druid-analytics"), "stdout: {stdout}");

    let manifest: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(temp_dir.path().join("out/manifest.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(manifest["stack"], "druid-analytics");
    assert_eq!(manifest["units"].as_array().unwrap().len(), 11);
    assert_eq!(manifest["failures"].as_array().unwrap().len(), 0);
    assert_eq!(manifest["dependencies"][0]["unit"], "cluster");
    assert_eq!(manifest["dependencies"][0]["dependsOn"], "network");
}

#[test]
fn test_validate_prints_summary_without_writing() {
    let temp_dir = setup(INVOCATION);

    let (success, stdout, _) = run(
        &temp_dir.path().join("deployment.yaml"),
        &["validate", "--show-resolved"],
    );

    assert!(success, "validate should succeed: {stdout}");
    assert!(stdout.contains("[OK] Release is valid"));
    assert!(stdout.contains("Units: 11/11 registered"));
    assert!(stdout.contains("deployment:eks:druid:release = analytics"));
    assert!(!temp_dir.path().join("out").exists());
}

#[test]
fn test_cli_context_overrides_file() {
    let temp_dir = setup(INVOCATION);

    let (success, stdout, stderr) = run(
        &temp_dir.path().join("deployment.yaml"),
        &["graph", "--context", "deployment:eks:druid:release=events"],
    );

    assert!(success, "graph should succeed: {stderr}");
    assert!(stdout.contains("cluster -> network"));
    assert!(stdout.contains("1. network"));
}

#[test]
fn test_missing_release_parameter_exits_non_zero() {
    let invocation = INVOCATION.replace("  deployment:eks:druid:release: analytics\n", "");
    let temp_dir = setup(&invocation);

    let (success, _, stderr) = run(&temp_dir.path().join("deployment.yaml"), &["synth"]);

    assert!(!success);
    assert!(
        stderr.contains("MissingRequiredParameter: deployment:eks:druid:release"),
        "stderr: {stderr}"
    );
}

#[test]
fn test_malformed_tag_exits_non_zero() {
    let temp_dir = setup(INVOCATION);

    let (success, _, stderr) = run(
        &temp_dir.path().join("deployment.yaml"),
        &["validate", "--tag", "team"],
    );

    assert!(!success);
    assert!(
        stderr.contains("MalformedTagSpecification: team"),
        "stderr: {stderr}"
    );
}

#[test]
fn test_partial_failure_still_writes_manifest() {
    let temp_dir = setup(INVOCATION);
    fs::remove_file(temp_dir.path().join("druid/secrets.yaml")).unwrap();

    let (success, _, stderr) = run(&temp_dir.path().join("deployment.yaml"), &["synth"]);

    assert!(!success);
    assert!(
        stderr.contains("DocumentNotFound: druid/secrets.yaml"),
        "stderr: {stderr}"
    );
    assert!(stderr.contains("CompositionAborted: druid"));

    let manifest: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(temp_dir.path().join("out/manifest.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(manifest["units"].as_array().unwrap().len(), 9);
    assert_eq!(manifest["failures"].as_array().unwrap().len(), 2);
    assert_eq!(manifest["failures"][1]["state"], "aborted");
}

//! Profile and input integration tests.
//!
//! Loads profiles and inputs from disk and runs them end to end against
//! fixture files.

use crate::mocks::{watcher_enabled, WATCHER_ID};
use infra_verify::guard::StaticGuardSource;
use infra_verify::profile::inputs::Inputs;
use infra_verify::profile::{builtin, Profile};
use infra_verify::resource::Value;
use infra_verify::{run_profile, Cause, Status, VerifyConfig, VerifyError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("profiles/fixtures/network_watcher.json")
}

fn watcher_inputs() -> Inputs {
    Inputs::new()
        .with("resource_group", "rg1")
        .with("network_watcher_name", vec!["nw1"])
        .with("network_watcher_id", vec![WATCHER_ID])
}

#[tokio::test]
async fn test_builtin_profile_against_bundled_fixture() {
    let config = VerifyConfig {
        fixture: Some(fixture_path()),
        inputs: watcher_inputs(),
        ..Default::default()
    };

    let report = run_profile(&config, Arc::new(watcher_enabled()), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.profile(), "azurerm-network-watcher");
    assert_eq!(report.provider(), "fixture");
    assert_eq!(report.outcomes().len(), 7);
    assert!(report.outcomes().iter().all(|o| o.status == Status::Passed));
}

#[tokio::test]
async fn test_builtin_profile_without_flag_or_inputs_is_skipped() {
    let config = VerifyConfig {
        fixture: Some(fixture_path()),
        ..Default::default()
    };

    let report = run_profile(&config, Arc::new(StaticGuardSource::new()), CancellationToken::new())
        .await
        .unwrap();

    assert!(report
        .outcomes()
        .iter()
        .all(|o| o.status == Status::Skipped && o.cause == Some(Cause::GuardNotSatisfied)));
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn test_builtin_profile_with_flag_but_no_inputs_fails_unbound() {
    let config = VerifyConfig {
        fixture: Some(fixture_path()),
        ..Default::default()
    };

    let report = run_profile(&config, Arc::new(watcher_enabled()), CancellationToken::new())
        .await
        .unwrap();

    let first = &report.outcomes()[0];
    assert_eq!(first.cause, Some(Cause::UnboundInput));
    assert!(first.message.contains("network_watcher_name"));
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_input_file_and_command_line_precedence() {
    let dir = TempDir::new().unwrap();
    let inputs = dir.path().join("inputs.toml");
    fs::write(
        &inputs,
        format!(
            "resource_group = \"rg-from-file\"\nnetwork_watcher_name = [\"nw1\"]\nnetwork_watcher_id = [\"{}\"]\n",
            WATCHER_ID
        ),
    )
    .unwrap();

    let config = VerifyConfig {
        fixture: Some(fixture_path()),
        input_files: vec![inputs],
        inputs: Inputs::new().with("resource_group", "rg1"),
        ..Default::default()
    };

    let resolved = config.resolve_inputs().unwrap();
    assert_eq!(resolved.get("resource_group"), Some(&Value::from("rg1")));
    assert_eq!(resolved.get("network_watcher_name"), Some(&Value::from(vec!["nw1"])));

    let report = run_profile(&config, Arc::new(watcher_enabled()), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn test_custom_profile_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("groups.toml");
    fs::write(
        &path,
        r#"
title = "Resource groups"

[inputs.group]
default = "rg1"

[[controls]]
id = "group-present"

[[controls.describe]]
resource = "azurerm_resource_group"
keys = { name = "${group}" }
expect = [
  { matcher = "exists" },
  { matcher = "equals", property = "location", value = "eastus" },
  { matcher = "not_equals", property = "location", value = "westus" },
]

[[controls]]
id = "group-absent"

[[controls.describe]]
resource = "azurerm_resource_group"
keys = { name = "${group}-old" }
expect = [{ matcher = "not_exists" }]
"#,
    )
    .unwrap();

    let profile = Profile::from_file(&path).unwrap();
    assert_eq!(profile.name(), "groups");
    assert_eq!(profile.title(), Some("Resource groups"));

    let config = VerifyConfig {
        profile: path.display().to_string(),
        fixture: Some(fixture_path()),
        ..Default::default()
    };
    let report = run_profile(&config, Arc::new(StaticGuardSource::new()), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.summary().passed, 4);
    assert_eq!(report.summary().controls, 2);
    assert_eq!(
        report.outcomes()[3].subject,
        "azurerm_resource_group(name: \"rg1-old\")"
    );
}

#[test]
fn test_malformed_profile_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[[controls]]\nid = \"a\"\n[[controls.describe]]\nresource = \"azurerm_resource_group\"\nkeys = { name = \"${undeclared}\" }\n").unwrap();

    let config = VerifyConfig {
        profile: path.display().to_string(),
        ..Default::default()
    };
    match config.load_controls() {
        Err(VerifyError::Profile { message, .. }) => assert!(message.contains("undeclared input")),
        other => panic!("expected profile error, got {:?}", other.map(|(p, _)| p.name().to_string())),
    }
}

#[test]
fn test_builtin_names_resolve() {
    for name in builtin::names() {
        let config = VerifyConfig {
            profile: name.to_string(),
            ..Default::default()
        };
        assert!(config.load_profile().is_ok(), "{}", name);
    }
}

//! Full run integration tests.
//!
//! Tests for complete control runs, including guards, fault isolation,
//! ordering under parallel execution, cancellation and fail-fast.

use crate::mocks::{
    network_watcher_fixture, watcher_enabled, BlockingProvider, CountingGuardSource,
    DelayedProvider, PanickingProvider, WATCHER_ID,
};
use infra_verify::control::{Control, Expectation};
use infra_verify::engine::runner::{ControlRunner, RunnerConfig};
use infra_verify::guard::{Guard, GuardSource, StaticGuardSource};
use infra_verify::profile::builtin::network_watcher_control;
use infra_verify::provider::{FixtureProvider, ProviderClient};
use infra_verify::resource::resolver::Resolver;
use infra_verify::resource::{ResourceDescriptor, Value};
use infra_verify::{Cause, Report, Status, VerifyError};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn watcher(group: &str, name: &str) -> ResourceDescriptor {
    ResourceDescriptor::new("azurerm_network_watcher")
        .key("resource_group", group)
        .key("name", name)
}

async fn run_with(
    provider: Arc<dyn ProviderClient>,
    guards: Arc<dyn GuardSource>,
    config: RunnerConfig,
    controls: &[Control],
) -> Report {
    ControlRunner::new(config, provider, guards)
        .run(controls, CancellationToken::new())
        .await
        .unwrap()
}

fn statuses(report: &Report) -> Vec<Status> {
    report.outcomes().iter().map(|o| o.status).collect()
}

#[tokio::test]
async fn test_network_watcher_all_pass() {
    // exists, id, name, type, provisioning state, fake name, bogus group
    let provider = Arc::new(network_watcher_fixture());
    let controls = vec![network_watcher_control("rg1", "nw1", WATCHER_ID)];

    let report = run_with(
        provider.clone(),
        Arc::new(watcher_enabled()),
        RunnerConfig::default(),
        &controls,
    )
    .await;

    assert_eq!(statuses(&report), vec![Status::Passed; 7]);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.summary().controls, 1);
    assert_eq!(provider.query_count(), 3);
}

#[tokio::test]
async fn test_missing_resource_group_is_not_a_provider_error() {
    let provider = Arc::new(network_watcher_fixture());
    let controls = vec![Control::new("c").describe(
        watcher("does-not-exist", "nw1"),
        vec![Expectation::not_exists(), Expectation::its("name").equals("nw1")],
    )];

    let report = run_with(provider, Arc::new(StaticGuardSource::new()), RunnerConfig::default(), &controls).await;
    let outcomes = report.outcomes();
    assert_eq!(outcomes[0].status, Status::Passed);
    assert_eq!(outcomes[1].status, Status::Failed);
    assert_eq!(outcomes[1].cause, Some(Cause::PropertyNotFound));
    assert_eq!(report.summary().errors, 0);
}

#[tokio::test]
async fn test_guard_unset_skips_everything_without_resolving() {
    let provider = Arc::new(network_watcher_fixture());
    let guards = Arc::new(CountingGuardSource::new(StaticGuardSource::new()));
    let controls = vec![network_watcher_control("rg1", "nw1", WATCHER_ID)];

    let report = run_with(provider.clone(), guards.clone(), RunnerConfig::default(), &controls).await;

    assert_eq!(statuses(&report), vec![Status::Skipped; 7]);
    assert!(report
        .outcomes()
        .iter()
        .all(|o| o.cause == Some(Cause::GuardNotSatisfied)));
    assert_eq!(report.exit_code(), 0);
    assert_eq!(provider.query_count(), 0);
    assert_eq!(guards.calls(), 1);
}

#[tokio::test]
async fn test_guard_evaluated_once_per_control() {
    let guards = Arc::new(CountingGuardSource::new(watcher_enabled()));
    let controls = vec![
        network_watcher_control("rg1", "nw1", WATCHER_ID),
        network_watcher_control("rg1", "nw1", WATCHER_ID),
    ];
    run_with(
        Arc::new(network_watcher_fixture()),
        guards.clone(),
        RunnerConfig::default(),
        &controls,
    )
    .await;
    assert_eq!(guards.calls(), 2);
}

#[tokio::test]
async fn test_wrong_provisioning_state_fails_one_expectation() {
    let provider = Arc::new(FixtureProvider::new().with_resource(
        "azurerm_network_watcher",
        &[("resource_group", "rg1"), ("name", "nw1")],
        json!({
            "id": WATCHER_ID,
            "name": "nw1",
            "type": "Microsoft.Network/networkWatchers",
            "properties": { "provisioningState": "Failed" }
        }),
    ));
    let controls = vec![network_watcher_control("rg1", "nw1", WATCHER_ID)];
    let report = run_with(provider, Arc::new(watcher_enabled()), RunnerConfig::default(), &controls).await;

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].expectation, "its 'provisioning_state' should eq \"Succeeded\"");
    assert_eq!(failures[0].cause, Some(Cause::ValueMismatch));
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_provider_error_isolated_to_its_describe() {
    let provider = Arc::new(network_watcher_fixture().with_failure("rg-broken", "connection reset"));
    let controls = vec![
        Control::new("mixed")
            .describe(watcher("rg-broken", "nw1"), vec![Expectation::exists(), Expectation::its("name").equals("nw1")])
            .describe(watcher("rg1", "nw1"), vec![Expectation::exists()]),
        Control::new("other").describe(watcher("rg1", "fake"), vec![Expectation::not_exists()]),
    ];

    let report = run_with(provider, Arc::new(StaticGuardSource::new()), RunnerConfig::default(), &controls).await;
    let outcomes = report.outcomes();

    assert_eq!(outcomes[0].cause, Some(Cause::ProviderError));
    assert_eq!(outcomes[1].cause, Some(Cause::ProviderError));
    assert!(outcomes[0].message.contains("connection reset"));
    assert_eq!(outcomes[2].status, Status::Passed);
    assert_eq!(outcomes[3].status, Status::Passed);
    assert_eq!(report.summary().errors, 2);
}

#[tokio::test]
async fn test_missing_key_is_invalid_descriptor() {
    let provider = Arc::new(network_watcher_fixture());
    let controls = vec![Control::new("c").describe(
        ResourceDescriptor::new("azurerm_network_watcher").key("resource_group", "rg1"),
        vec![Expectation::not_exists()],
    )];
    let report = run_with(provider.clone(), Arc::new(StaticGuardSource::new()), RunnerConfig::default(), &controls).await;

    assert_eq!(report.outcomes()[0].cause, Some(Cause::InvalidDescriptor));
    assert!(report.outcomes()[0].message.contains("name"));
    assert_eq!(provider.query_count(), 0);
}

#[tokio::test]
async fn test_resolve_is_idempotent() {
    let resolver = Resolver::new(Arc::new(network_watcher_fixture()));
    let first = resolver.resolve(&watcher("rg1", "nw1")).await.unwrap();
    let second = resolver.resolve(&watcher("rg1", "nw1")).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first.properties().get("provisioning_state"),
        Some(&Value::from("Succeeded"))
    );

    let missing = resolver.resolve(&watcher("rg1", "fake")).await.unwrap();
    assert!(!missing.exists());
    assert!(missing.properties().is_empty());
}

fn ordered_fixture(names: &[&str]) -> FixtureProvider {
    names.iter().fold(FixtureProvider::new(), |fixture, name| {
        fixture.with_resource(
            "azurerm_network_watcher",
            &[("resource_group", "rg1"), ("name", *name)],
            json!({ "name": *name }),
        )
    })
}

fn ordered_controls(names: &[&str]) -> Vec<Control> {
    names
        .iter()
        .map(|name| {
            Control::new(format!("control_{}", name)).describe(
                watcher("rg1", name),
                vec![Expectation::exists(), Expectation::its("name").equals(*name)],
            )
        })
        .collect()
}

#[tokio::test]
async fn test_parallel_results_keep_declaration_order() {
    let names = ["n0", "n1", "n2", "n3"];
    let provider = Arc::new(
        DelayedProvider::new(ordered_fixture(&names))
            .delay("n0", Duration::from_millis(120))
            .delay("n1", Duration::from_millis(80))
            .delay("n2", Duration::from_millis(40)),
    );

    let report = run_with(
        provider.clone(),
        Arc::new(StaticGuardSource::new()),
        RunnerConfig {
            max_parallel: 4,
            ..Default::default()
        },
        &ordered_controls(&names),
    )
    .await;

    assert_eq!(provider.completed().first().map(String::as_str), Some("n3"));
    let ids: Vec<_> = report.outcomes().iter().map(|o| o.control_id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "control_n0", "control_n0", "control_n1", "control_n1", "control_n2", "control_n2",
            "control_n3", "control_n3"
        ]
    );
    assert_eq!(statuses(&report), vec![Status::Passed; 8]);
}

#[tokio::test]
async fn test_sequential_runs_in_declaration_order() {
    let names = ["n0", "n1", "n2"];
    let provider = Arc::new(
        DelayedProvider::new(ordered_fixture(&names)).delay("n0", Duration::from_millis(30)),
    );
    run_with(
        provider.clone(),
        Arc::new(StaticGuardSource::new()),
        RunnerConfig {
            parallel: false,
            ..Default::default()
        },
        &ordered_controls(&names),
    )
    .await;
    assert_eq!(provider.completed(), vec!["n0", "n1", "n2"]);
}

#[tokio::test]
async fn test_cancellation_skips_unfinished_work() {
    let provider = Arc::new(BlockingProvider::new());
    let runner = Arc::new(ControlRunner::new(
        RunnerConfig {
            max_parallel: 1,
            ..Default::default()
        },
        provider.clone(),
        Arc::new(StaticGuardSource::new()),
    ));
    let controls = ordered_controls(&["n0", "n1", "n2"]);
    let cancel = CancellationToken::new();

    let handle = {
        let runner = runner.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { runner.run(&controls, cancel).await })
    };

    provider.wait_started().await;
    cancel.cancel();
    let report = handle.await.unwrap().unwrap();

    assert_eq!(report.outcomes().len(), 6);
    for outcome in report.outcomes() {
        assert_eq!(outcome.status, Status::Skipped);
        assert_eq!(outcome.cause, Some(Cause::RunCancelled));
        assert_eq!(outcome.message, "run cancelled");
    }
    assert_eq!(provider.query_count(), 1);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn test_cancelled_before_start_resolves_nothing() {
    let provider = Arc::new(network_watcher_fixture());
    let runner = ControlRunner::new(
        RunnerConfig::default(),
        provider.clone(),
        Arc::new(watcher_enabled()),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let controls = vec![network_watcher_control("rg1", "nw1", WATCHER_ID)];
    let report = runner.run(&controls, cancel).await.unwrap();
    assert_eq!(statuses(&report), vec![Status::Skipped; 7]);
    assert_eq!(provider.query_count(), 0);
}

#[tokio::test]
async fn test_fail_fast_skips_later_controls() {
    let names = ["n0", "n1", "n2"];
    let mut controls = ordered_controls(&names);
    controls[0] = Control::new("broken").describe(watcher("rg1", "absent"), vec![Expectation::exists()]);

    let report = run_with(
        Arc::new(ordered_fixture(&names)),
        Arc::new(StaticGuardSource::new()),
        RunnerConfig {
            parallel: false,
            fail_fast: true,
            ..Default::default()
        },
        &controls,
    )
    .await;

    let outcomes = report.outcomes();
    assert_eq!(outcomes[0].status, Status::Failed);
    assert!(outcomes[1..]
        .iter()
        .all(|o| o.status == Status::Skipped && o.cause == Some(Cause::FailFast)));
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_panicking_control_is_contained() {
    let names = ["n0", "boom"];
    let provider = Arc::new(PanickingProvider::new(ordered_fixture(&names), "boom"));

    let report = run_with(
        provider,
        Arc::new(StaticGuardSource::new()),
        RunnerConfig::default(),
        &ordered_controls(&names),
    )
    .await;

    let outcomes = report.outcomes();
    assert_eq!(outcomes.len(), 4);
    assert_eq!(outcomes[0].status, Status::Passed);
    assert_eq!(outcomes[1].status, Status::Passed);
    assert_eq!(outcomes[2].cause, Some(Cause::Panicked));
    assert_eq!(outcomes[3].cause, Some(Cause::Panicked));
}

#[tokio::test]
async fn test_unbound_control_honors_guard() {
    let provider = Arc::new(network_watcher_fixture());
    let mut control = Control::new("unbound")
        .only_if(Guard::EnvSet("NETWORK_WATCHER".into()))
        .describe(watcher("rg1", "${name[0]}"), vec![Expectation::exists()]);
    control.unbound = Some("unbound input: input 'name' has no element 0".into());
    let controls = vec![control];

    let skipped = run_with(provider.clone(), Arc::new(StaticGuardSource::new()), RunnerConfig::default(), &controls).await;
    assert_eq!(skipped.outcomes()[0].status, Status::Skipped);

    let failed = run_with(provider.clone(), Arc::new(watcher_enabled()), RunnerConfig::default(), &controls).await;
    assert_eq!(failed.outcomes()[0].status, Status::Failed);
    assert_eq!(failed.outcomes()[0].cause, Some(Cause::UnboundInput));
    assert_eq!(provider.query_count(), 0);
}

#[tokio::test]
async fn test_only_unknown_resource_types_is_fatal() {
    let runner = ControlRunner::new(
        RunnerConfig::default(),
        Arc::new(FixtureProvider::new()),
        Arc::new(StaticGuardSource::new()),
    );
    let controls = vec![Control::new("aws").describe(
        ResourceDescriptor::new("aws_vpc").key("name", "main"),
        vec![Expectation::exists()],
    )];
    let result = runner.run(&controls, CancellationToken::new()).await;
    assert!(matches!(result, Err(VerifyError::Config(_))));
}

#[tokio::test]
async fn test_only_and_skip_select_controls() {
    let names = ["n0", "n1", "n2"];
    let report = run_with(
        Arc::new(ordered_fixture(&names)),
        Arc::new(StaticGuardSource::new()),
        RunnerConfig {
            skip: vec!["control_n1".into()],
            ..Default::default()
        },
        &ordered_controls(&names),
    )
    .await;

    assert_eq!(report.summary().controls, 2);
    let indexes: Vec<_> = report.outcomes().iter().map(|o| o.control_index).collect();
    assert_eq!(indexes, vec![0, 0, 2, 2]);
}

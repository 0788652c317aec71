//! Mock providers and guard sources.

#![allow(dead_code)]

use async_trait::async_trait;
use infra_verify::guard::{GuardSource, StaticGuardSource};
use infra_verify::provider::{FixtureProvider, ProviderClient, ProviderError, ProviderResult};
use infra_verify::resource::lookup_key;
use infra_verify::resource::types::ResourceType;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

pub const WATCHER_ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg1/providers/Microsoft.Network/networkWatchers/nw1";

/// rg1 holding a healthy network watcher nw1, in raw ARM shape.
pub fn network_watcher_fixture() -> FixtureProvider {
    FixtureProvider::new()
        .with_resource(
            "azurerm_resource_group",
            &[("name", "rg1")],
            json!({ "name": "rg1", "location": "eastus" }),
        )
        .with_resource(
            "azurerm_network_watcher",
            &[("resource_group", "rg1"), ("name", "nw1")],
            json!({
                "id": WATCHER_ID,
                "name": "nw1",
                "type": "Microsoft.Network/networkWatchers",
                "location": "eastus",
                "properties": { "provisioningState": "Succeeded" }
            }),
        )
}

/// Guards with `NETWORK_WATCHER` set.
pub fn watcher_enabled() -> StaticGuardSource {
    StaticGuardSource::new().with("NETWORK_WATCHER", "1")
}

/// Counts flag lookups.
#[derive(Debug, Default)]
pub struct CountingGuardSource {
    inner: StaticGuardSource,
    calls: AtomicUsize,
}

impl CountingGuardSource {
    pub fn new(inner: StaticGuardSource) -> Self {
        CountingGuardSource {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GuardSource for CountingGuardSource {
    fn flag(&self, name: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.flag(name)
    }
}

/// Wraps a fixture, delaying answers per resource name and recording the
/// order in which queries complete.
pub struct DelayedProvider {
    inner: FixtureProvider,
    delays: HashMap<String, Duration>,
    completed: Mutex<Vec<String>>,
}

impl DelayedProvider {
    pub fn new(inner: FixtureProvider) -> Self {
        DelayedProvider {
            inner,
            delays: HashMap::new(),
            completed: Mutex::new(Vec::new()),
        }
    }

    pub fn delay(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderClient for DelayedProvider {
    fn name(&self) -> &str {
        "delayed"
    }

    async fn query(
        &self,
        resource_type: &ResourceType,
        keys: &[(String, String)],
    ) -> Result<ProviderResult, ProviderError> {
        let name = lookup_key(keys, "name").unwrap_or_default().to_string();
        if let Some(delay) = self.delays.get(&name) {
            tokio::time::sleep(*delay).await;
        }
        let result = self.inner.query(resource_type, keys).await;
        self.completed.lock().unwrap().push(name);
        result
    }
}

/// Never answers. Signals when the first query starts.
#[derive(Default)]
pub struct BlockingProvider {
    started: Notify,
    queries: AtomicUsize,
}

impl BlockingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until some query is in flight.
    pub async fn wait_started(&self) {
        if self.queries.load(Ordering::SeqCst) == 0 {
            self.started.notified().await;
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for BlockingProvider {
    fn name(&self) -> &str {
        "blocking"
    }

    async fn query(
        &self,
        _resource_type: &ResourceType,
        _keys: &[(String, String)],
    ) -> Result<ProviderResult, ProviderError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        std::future::pending().await
    }
}

/// Panics when asked for `name`, otherwise defers to a fixture.
pub struct PanickingProvider {
    inner: FixtureProvider,
    name: String,
}

impl PanickingProvider {
    pub fn new(inner: FixtureProvider, name: &str) -> Self {
        PanickingProvider {
            inner,
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl ProviderClient for PanickingProvider {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn query(
        &self,
        resource_type: &ResourceType,
        keys: &[(String, String)],
    ) -> Result<ProviderResult, ProviderError> {
        if lookup_key(keys, "name") == Some(self.name.as_str()) {
            panic!("provider exploded on {}", self.name);
        }
        self.inner.query(resource_type, keys).await
    }
}

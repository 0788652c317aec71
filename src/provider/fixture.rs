//! Fixture-backed provider.
//!
//! Serves resources from an in-memory table, optionally loaded from a JSON
//! file:
//!
//! ```json
//! {
//!   "resources": [
//!     {
//!       "type": "azurerm_network_watcher",
//!       "keys": { "resource_group": "rg1", "name": "nw1" },
//!       "fields": { "id": "/subscriptions/...", "name": "nw1" }
//!     }
//!   ],
//!   "failures": [ { "resource_group": "broken", "message": "connection reset" } ]
//! }
//! ```
//!
//! Key values compare ASCII case-insensitively, as Azure names do.

use super::{ProviderClient, ProviderError, ProviderResult};
use crate::resource::lookup_key;
use crate::resource::types::ResourceType;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One resource served by the fixture.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub keys: BTreeMap<String, String>,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Injected failure for every lookup in a resource group.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureFailure {
    pub resource_group: String,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    resources: Vec<FixtureResource>,
    #[serde(default)]
    failures: Vec<FixtureFailure>,
}

/// In-memory provider with a query counter.
#[derive(Debug, Default)]
pub struct FixtureProvider {
    resources: Vec<FixtureResource>,
    failures: Vec<FixtureFailure>,
    latency: Option<Duration>,
    queries: AtomicUsize,
}

impl FixtureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a fixture from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ProviderError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProviderError::Fixture(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
            .map_err(|e| ProviderError::Fixture(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(content: &str) -> Result<Self, ProviderError> {
        let file: FixtureFile =
            serde_json::from_str(content).map_err(|e| ProviderError::Fixture(e.to_string()))?;
        Ok(FixtureProvider {
            resources: file.resources,
            failures: file.failures,
            ..Self::default()
        })
    }

    /// Register a resource.
    pub fn with_resource(
        mut self,
        resource_type: &str,
        keys: &[(&str, &str)],
        fields: serde_json::Value,
    ) -> Self {
        let fields = match fields {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        self.resources.push(FixtureResource {
            resource_type: resource_type.to_string(),
            keys: keys
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fields,
        });
        self
    }

    /// Make every lookup in `resource_group` fail with a network error.
    pub fn with_failure(mut self, resource_group: &str, message: &str) -> Self {
        self.failures.push(FixtureFailure {
            resource_group: resource_group.to_string(),
            message: message.to_string(),
        });
        self
    }

    /// Delay every answer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of queries served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn matches(resource: &FixtureResource, tag: &str, keys: &[(String, String)]) -> bool {
        resource.resource_type == tag
            && resource.keys.len() == keys.len()
            && resource.keys.iter().all(|(k, v)| {
                lookup_key(keys, k)
                    .map(|actual| actual.eq_ignore_ascii_case(v))
                    .unwrap_or(false)
            })
    }
}

#[async_trait]
impl ProviderClient for FixtureProvider {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn query(
        &self,
        resource_type: &ResourceType,
        keys: &[(String, String)],
    ) -> Result<ProviderResult, ProviderError> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(group) = lookup_key(keys, "resource_group") {
            if let Some(failure) = self
                .failures
                .iter()
                .find(|f| f.resource_group.eq_ignore_ascii_case(group))
            {
                return Err(ProviderError::Network(failure.message.clone()));
            }
        }

        Ok(self
            .resources
            .iter()
            .find(|r| Self::matches(r, resource_type.tag, keys))
            .map(|r| ProviderResult::found(r.fields.clone()))
            .unwrap_or_else(ProviderResult::not_found))
    }
}

//! Resource resolution.
//!
//! Turns a [`ResourceDescriptor`] into a [`ResolvedResource`] with exactly one
//! provider query. "Not found" is a normal answer and yields a resource with
//! `exists == false`; only malformed descriptors and provider failures are
//! errors.

use super::types::{self, ResourceType};
use super::{ResolvedResource, ResourceDescriptor, Value};
use crate::provider::ProviderClient;
use crate::VerifyError;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Resolves descriptors through a provider client.
#[derive(Clone)]
pub struct Resolver {
    provider: Arc<dyn ProviderClient>,
}

impl Resolver {
    pub fn new(provider: Arc<dyn ProviderClient>) -> Self {
        Resolver { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Check a descriptor against the type registry without querying.
    ///
    /// The type tag must be recognized, every required key present and
    /// non-empty, and no unknown keys given.
    pub fn validate(descriptor: &ResourceDescriptor) -> Result<&'static ResourceType, VerifyError> {
        let invalid = |reason: String| VerifyError::InvalidDescriptor {
            descriptor: descriptor.to_string(),
            reason,
        };

        let resource_type = types::lookup(descriptor.resource_type()).ok_or_else(|| {
            invalid(format!(
                "unrecognized resource type '{}'",
                descriptor.resource_type()
            ))
        })?;

        let missing: Vec<&str> = resource_type
            .required_keys
            .iter()
            .copied()
            .filter(|k| descriptor.get(k).map(|v| v.trim().is_empty()).unwrap_or(true))
            .collect();
        if !missing.is_empty() {
            return Err(invalid(format!(
                "missing required lookup key(s): {}",
                missing.join(", ")
            )));
        }

        if let Some((unknown, _)) = descriptor
            .keys()
            .iter()
            .find(|(k, _)| !resource_type.required_keys.contains(&k.as_str()))
        {
            return Err(invalid(format!("unexpected lookup key '{}'", unknown)));
        }

        Ok(resource_type)
    }

    /// Resolve a descriptor with a single provider query.
    pub async fn resolve(&self, descriptor: &ResourceDescriptor) -> Result<ResolvedResource, VerifyError> {
        let resource_type = Self::validate(descriptor)?;

        debug!(
            provider = self.provider.name(),
            resource = %descriptor,
            "resolving resource"
        );

        let result = self
            .provider
            .query(resource_type, descriptor.keys())
            .await?;

        if !result.found {
            debug!(resource = %descriptor, "resource not found");
            return Ok(ResolvedResource::missing(descriptor.clone()));
        }

        Ok(ResolvedResource::found(descriptor.clone(), project(result.fields)))
    }
}

/// Project provider fields into resource properties.
///
/// Top-level fields are kept under snake_case names. The nested ARM
/// `properties` object stays available as a map and its members are also
/// lifted to the top level (`provisioningState` becomes
/// `provisioning_state`). Top-level fields win on collisions.
pub fn project(fields: serde_json::Map<String, serde_json::Value>) -> BTreeMap<String, Value> {
    let mut projected = BTreeMap::new();
    let mut nested = None;

    for (key, value) in fields {
        if key == "properties" {
            if let serde_json::Value::Object(ref inner) = value {
                nested = Some(inner.clone());
            }
        }
        if let Some(value) = Value::from_json(value) {
            projected.insert(to_snake_case(&key), value);
        }
    }

    for (key, value) in nested.into_iter().flatten() {
        let key = to_snake_case(&key);
        if projected.contains_key(&key) {
            continue;
        }
        if let Some(value) = Value::from_json(value) {
            projected.insert(key, value);
        }
    }

    projected
}

/// `provisioningState` -> `provisioning_state`, `IPAddress` -> `ip_address`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = if i > 0 { chars.get(i - 1) } else { None };
            let next = chars.get(i + 1);
            let boundary = match prev {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.map(|n| n.is_ascii_lowercase()).unwrap_or(false),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else if c == '-' || c == ' ' {
            out.push('_');
        } else {
            out.push(c);
        }
    }

    out
}

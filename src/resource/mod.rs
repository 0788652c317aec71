//! Resource descriptors, resolution, and property access.

pub mod accessor;
pub mod resolver;
pub mod types;
pub mod value;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub use value::Value;

/// Identifies one resource instance to resolve: a type tag plus lookup keys.
///
/// Keys keep their insertion order so reports read the way the control was
/// written. Setting a key twice replaces the earlier value in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceDescriptor {
    resource_type: String,
    keys: Vec<(String, String)>,
}

impl ResourceDescriptor {
    pub fn new(resource_type: impl Into<String>) -> Self {
        ResourceDescriptor {
            resource_type: resource_type.into(),
            keys: Vec::new(),
        }
    }

    /// Add or replace a lookup key.
    pub fn key(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.keys.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.keys.push((name, value)),
        }
        self
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn keys(&self) -> &[(String, String)] {
        &self.keys
    }

    /// Value of a single lookup key.
    pub fn get(&self, name: &str) -> Option<&str> {
        lookup_key(&self.keys, name)
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.resource_type)?;
        for (i, (k, v)) in self.keys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {:?}", k, v)?;
        }
        write!(f, ")")
    }
}

/// Find a key in an ordered key list.
pub fn lookup_key<'a>(keys: &'a [(String, String)], name: &str) -> Option<&'a str> {
    keys.iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// Result of resolving a descriptor against a provider.
///
/// A resource that does not exist never carries properties; the two
/// constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedResource {
    descriptor: ResourceDescriptor,
    exists: bool,
    properties: BTreeMap<String, Value>,
}

impl ResolvedResource {
    pub fn missing(descriptor: ResourceDescriptor) -> Self {
        ResolvedResource {
            descriptor,
            exists: false,
            properties: BTreeMap::new(),
        }
    }

    pub fn found(descriptor: ResourceDescriptor, properties: BTreeMap<String, Value>) -> Self {
        ResolvedResource {
            descriptor,
            exists: true,
            properties,
        }
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }
}

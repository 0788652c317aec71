//! Uniform property access over resolved resources.
//!
//! Lookups are pure: they read the already-resolved property map and never
//! reach back to a provider. `None` means the property is absent, either
//! because the resource does not exist or the name is unknown. Whether
//! absence is a failure is the evaluator's call.

use super::{ResolvedResource, Value};

/// Get a property by name.
///
/// A name that matches a top-level key exactly wins. Otherwise a dotted path
/// walks into maps by key and into lists by numeric index, so `tags.env`
/// and `address_space.address_prefixes.0` both work.
pub fn get<'a>(resource: &'a ResolvedResource, name: &str) -> Option<&'a Value> {
    if !resource.exists() {
        return None;
    }

    let properties = resource.properties();
    if let Some(value) = properties.get(name) {
        return Some(value);
    }

    let mut segments = name.split('.');
    let mut current = properties.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Map(fields) => fields.get(segment)?,
            Value::List(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Names of all top-level properties, sorted.
pub fn property_names(resource: &ResolvedResource) -> Vec<&str> {
    resource.properties().keys().map(String::as_str).collect()
}

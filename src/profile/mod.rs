//! Profiles: controls declared as TOML data.
//!
//! ```toml
//! name = "azure-network"
//!
//! [inputs.resource_group]
//! description = "Resource group holding the watcher"
//!
//! [inputs.network_watcher_name]
//! default = []
//!
//! [[controls]]
//! id = "azurerm_network_watcher"
//! guard = { env_set = "NETWORK_WATCHER" }
//!
//! [[controls.describe]]
//! resource = "azurerm_network_watcher"
//! keys = { resource_group = "${resource_group}", name = "${network_watcher_name[0]}" }
//! expect = [
//!   { matcher = "exists" },
//!   { matcher = "equals", property = "provisioning_state", value = "Succeeded" },
//! ]
//! ```
//!
//! Loading validates structure and placeholder syntax. Binding substitutes
//! input values and produces plain [`Control`]s for the runner.

pub mod builtin;
pub mod inputs;

use crate::control::{Control, Expectation};
use crate::guard::Guard;
use crate::resource::{types, ResourceDescriptor, Value};
use crate::VerifyError;
use inputs::{parse_template, referenced_inputs, BindError, Inputs, Segment};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

/// A declared profile input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputSpec {
    #[serde(default)]
    pub description: Option<String>,
    /// Used when the input is not supplied on the command line
    #[serde(default)]
    pub default: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum MatcherKind {
    #[serde(alias = "exist")]
    Exists,
    #[serde(alias = "not_exist")]
    NotExists,
    #[serde(alias = "eq")]
    Equals,
    #[serde(alias = "not_eq")]
    NotEquals,
    #[serde(alias = "include")]
    Contains,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExpectSpec {
    matcher: MatcherKind,
    #[serde(default)]
    property: Option<String>,
    #[serde(default)]
    value: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct DescribeSpec {
    resource: String,
    #[serde(default)]
    keys: BTreeMap<String, String>,
    #[serde(default)]
    expect: Vec<ExpectSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ControlSpec {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    impact: Option<f32>,
    #[serde(default)]
    guard: Guard,
    #[serde(default)]
    describe: Vec<DescribeSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    inputs: BTreeMap<String, InputSpec>,
    #[serde(default)]
    controls: Vec<ControlSpec>,
}

/// A loaded, validated profile. Bind it to inputs to get runnable controls.
#[derive(Debug, Clone)]
pub struct Profile {
    name: String,
    title: Option<String>,
    origin: String,
    inputs: BTreeMap<String, InputSpec>,
    controls: Vec<ControlSpec>,
}

impl Profile {
    /// Load a profile from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, VerifyError> {
        let content = std::fs::read_to_string(path).map_err(|e| VerifyError::Io {
            context: format!("reading profile {}", path.display()),
            source: e,
        })?;
        Self::from_toml(&content, &path.display().to_string())
    }

    /// Parse a profile from TOML text. `origin` names the source in errors
    /// and supplies the profile name when the file has none.
    pub fn from_toml(content: &str, origin: &str) -> Result<Self, VerifyError> {
        let file: ProfileFile = toml::from_str(content).map_err(|e| VerifyError::Profile {
            path: origin.to_string(),
            message: e.to_string(),
        })?;

        let name = file.name.unwrap_or_else(|| {
            Path::new(origin)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| origin.to_string())
        });

        let profile = Profile {
            name,
            title: file.title,
            origin: origin.to_string(),
            inputs: file.inputs,
            controls: file.controls,
        };
        profile.check()?;

        debug!(
            profile = %profile.name,
            controls = profile.controls.len(),
            inputs = profile.inputs.len(),
            "profile loaded"
        );
        Ok(profile)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Declared inputs, by name.
    pub fn inputs(&self) -> &BTreeMap<String, InputSpec> {
        &self.inputs
    }

    pub fn control_ids(&self) -> impl Iterator<Item = &str> {
        self.controls.iter().map(|c| c.id.as_str())
    }

    /// Profile defaults overlaid with `overrides`.
    pub fn effective_inputs(&self, overrides: &Inputs) -> Inputs {
        let mut inputs = Inputs::new();
        for (name, spec) in &self.inputs {
            if let Some(default) = &spec.default {
                inputs.set(name.clone(), default.clone());
            }
        }
        for name in overrides.names() {
            if !self.inputs.contains_key(name) {
                warn!(profile = %self.name, input = name, "input is not declared by the profile");
            }
        }
        inputs.merged(overrides)
    }

    /// Substitute inputs and build the controls, in declaration order.
    ///
    /// A control whose placeholders cannot all be filled is still returned,
    /// marked unbound, so the runner can honor its guard before failing it.
    pub fn bind(&self, overrides: &Inputs) -> Vec<Control> {
        let inputs = self.effective_inputs(overrides);
        self.controls.iter().map(|spec| bind_control(spec, &inputs)).collect()
    }

    fn error(&self, message: String) -> VerifyError {
        VerifyError::Profile {
            path: self.origin.clone(),
            message,
        }
    }

    /// Structural checks that do not depend on input values.
    fn check(&self) -> Result<(), VerifyError> {
        let mut seen = HashSet::new();

        for control in &self.controls {
            if control.id.trim().is_empty() {
                return Err(self.error("control with empty id".to_string()));
            }
            if !seen.insert(control.id.as_str()) {
                return Err(self.error(format!("duplicate control id '{}'", control.id)));
            }
            if let Some(impact) = control.impact {
                if !(0.0..=1.0).contains(&impact) {
                    return Err(self.error(format!(
                        "control '{}': impact {} is outside 0.0..=1.0",
                        control.id, impact
                    )));
                }
            }

            for (d, describe) in control.describe.iter().enumerate() {
                let at = format!("control '{}' describe {}", control.id, d + 1);
                if describe.resource.trim().is_empty() {
                    return Err(self.error(format!("{}: empty resource type", at)));
                }
                for template in describe.keys.values() {
                    self.check_template(&at, template)?;
                }
                for (e, expect) in describe.expect.iter().enumerate() {
                    let at = format!("{} expectation {}", at, e + 1);
                    self.check_expect(&at, expect)?;
                }
            }
        }
        Ok(())
    }

    fn check_expect(&self, at: &str, expect: &ExpectSpec) -> Result<(), VerifyError> {
        match expect.matcher {
            MatcherKind::Exists | MatcherKind::NotExists => {
                if expect.property.is_some() || expect.value.is_some() {
                    return Err(self.error(format!(
                        "{}: existence matchers take no property or value",
                        at
                    )));
                }
            }
            _ => {
                if expect.property.as_deref().map_or(true, str::is_empty) {
                    return Err(self.error(format!("{}: matcher needs a property", at)));
                }
                match &expect.value {
                    Some(value) => self.check_value(at, value)?,
                    None => return Err(self.error(format!("{}: matcher needs a value", at))),
                }
            }
        }
        Ok(())
    }

    fn check_value(&self, at: &str, value: &Value) -> Result<(), VerifyError> {
        match value {
            Value::String(s) => self.check_template(at, s),
            Value::List(items) => items.iter().try_for_each(|v| self.check_value(at, v)),
            Value::Map(fields) => fields.values().try_for_each(|v| self.check_value(at, v)),
            _ => Ok(()),
        }
    }

    fn check_template(&self, at: &str, template: &str) -> Result<(), VerifyError> {
        let segments = parse_template(template).map_err(|e| self.error(format!("{}: {}", at, e)))?;
        for name in referenced_inputs(&segments) {
            if !self.inputs.contains_key(name) {
                return Err(self.error(format!("{}: undeclared input '{}'", at, name)));
            }
        }
        Ok(())
    }
}

fn bind_control(spec: &ControlSpec, inputs: &Inputs) -> Control {
    let mut errors: Vec<String> = Vec::new();
    let mut note = |e: BindError| {
        let message = e.to_string();
        if !errors.contains(&message) {
            errors.push(message);
        }
    };

    let mut control = Control::new(spec.id.clone()).only_if(spec.guard.clone());
    control.title = spec.title.clone();
    control.impact = spec.impact;

    for describe in &spec.describe {
        let mut descriptor = ResourceDescriptor::new(describe.resource.clone());
        for (key, template) in ordered_keys(&describe.resource, &describe.keys) {
            let segments = parse_template(template)
                .unwrap_or_else(|_| vec![Segment::Literal(template.clone())]);
            let value = inputs.render_text(&segments).unwrap_or_else(|e| {
                note(e);
                template.clone()
            });
            descriptor = descriptor.key(key.clone(), value);
        }

        let expectations = describe
            .expect
            .iter()
            .map(|expect| {
                let value = expect.value.as_ref().map(|v| {
                    inputs.render_value(v).unwrap_or_else(|e| {
                        note(e);
                        v.clone()
                    })
                });
                build_expectation(expect, value)
            })
            .collect();

        control = control.describe(descriptor, expectations);
    }

    if !errors.is_empty() {
        control.unbound = Some(format!("unbound input: {}", errors.join("; ")));
    }
    control
}

/// Keys in registry order for known types, then alphabetically.
fn ordered_keys<'a>(
    resource: &str,
    keys: &'a BTreeMap<String, String>,
) -> Vec<(&'a String, &'a String)> {
    let required = types::lookup(resource)
        .map(|t| t.required_keys)
        .unwrap_or(&[]);
    let mut ordered: Vec<_> = keys.iter().collect();
    ordered.sort_by_key(|(k, _)| {
        required
            .iter()
            .position(|r| *r == k.as_str())
            .unwrap_or(required.len())
    });
    ordered
}

fn build_expectation(spec: &ExpectSpec, value: Option<Value>) -> Expectation {
    let property = spec.property.clone().unwrap_or_default();
    let value = value.unwrap_or(Value::Bool(true));
    match spec.matcher {
        MatcherKind::Exists => Expectation::exists(),
        MatcherKind::NotExists => Expectation::not_exists(),
        MatcherKind::Equals => Expectation::its(property).equals(value),
        MatcherKind::NotEquals => Expectation::its(property).not_equals(value),
        MatcherKind::Contains => Expectation::its(property).contains(value),
    }
}

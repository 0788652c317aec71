//! Control guards.
//!
//! A guard is evaluated once per control, before anything is resolved. The
//! values it consults come from a [`GuardSource`], normally the process
//! environment.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Supplies flag values consulted by guards.
pub trait GuardSource: Send + Sync {
    /// Current value of a flag, `None` if unset.
    fn flag(&self, name: &str) -> Option<String>;
}

/// Reads flags from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvGuardSource;

impl GuardSource for EnvGuardSource {
    fn flag(&self, name: &str) -> Option<String> {
        std::env::var_os(name).map(|v| v.to_string_lossy().into_owned())
    }
}

/// Fixed flag values.
#[derive(Debug, Default, Clone)]
pub struct StaticGuardSource {
    flags: HashMap<String, String>,
}

impl StaticGuardSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.flags.insert(name.to_string(), value.to_string());
        self
    }
}

impl GuardSource for StaticGuardSource {
    fn flag(&self, name: &str) -> Option<String> {
        self.flags.get(name).cloned()
    }
}

/// Precondition gating a whole control.
///
/// In profiles: `guard = "always"`, `guard = { env_set = "NETWORK_WATCHER" }`,
/// `guard = { env_equals = { name = "STAGE", value = "prod" } }`,
/// `guard = { all = [ ... ] }`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Guard {
    #[default]
    Always,
    /// Flag is present, even if empty
    EnvSet(String),
    EnvEquals { name: String, value: String },
    Not(Box<Guard>),
    All(Vec<Guard>),
    Any(Vec<Guard>),
}

impl Guard {
    pub fn evaluate(&self, source: &dyn GuardSource) -> bool {
        match self {
            Guard::Always => true,
            Guard::EnvSet(name) => source.flag(name).is_some(),
            Guard::EnvEquals { name, value } => source.flag(name).as_deref() == Some(value.as_str()),
            Guard::Not(inner) => !inner.evaluate(source),
            Guard::All(guards) => guards.iter().all(|g| g.evaluate(source)),
            Guard::Any(guards) => guards.iter().any(|g| g.evaluate(source)),
        }
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guard::Always => write!(f, "always"),
            Guard::EnvSet(name) => write!(f, "${} is set", name),
            Guard::EnvEquals { name, value } => write!(f, "${} == {:?}", name, value),
            Guard::Not(inner) => write!(f, "not ({})", inner),
            Guard::All(guards) => join(f, guards, " and "),
            Guard::Any(guards) => join(f, guards, " or "),
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, guards: &[Guard], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, g) in guards.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", g)?;
    }
    write!(f, ")")
}

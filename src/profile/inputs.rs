//! Named inputs and `${name}` substitution.
//!
//! Profile strings may reference inputs:
//!
//! - `"${resource_group}"` is replaced by the input's value, keeping its type
//! - `"${network_watcher_name[0]}"` selects the first element of a list input
//! - `"rg-${env}-net"` interpolates scalar inputs into text
//! - `"$${literal}"` produces the text `${literal}`

use crate::resource::Value;
use crate::VerifyError;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// One piece of a parsed template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Input { name: String, index: Option<usize> },
}

/// Why a template could not be filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// Input declared but has no value (or the list is too short)
    Unbound { name: String, index: Option<usize> },
    /// A list or map input used inside surrounding text
    NotScalar { name: String },
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::Unbound { name, index: None } => write!(f, "input '{}' is not set", name),
            BindError::Unbound {
                name,
                index: Some(i),
            } => write!(f, "input '{}' has no element {}", name, i),
            BindError::NotScalar { name } => {
                write!(f, "input '{}' is not a scalar and cannot be used in text", name)
            }
        }
    }
}

/// Parse a template into literal and input segments.
pub fn parse_template(template: &str) -> Result<Vec<Segment>, String> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        literal.push_str(&rest[..pos]);
        let after = &rest[pos..];

        if let Some(escaped) = after.strip_prefix("$${") {
            literal.push_str("${");
            rest = escaped;
            continue;
        }
        let Some(body_start) = after.strip_prefix("${") else {
            literal.push('$');
            rest = &after[1..];
            continue;
        };
        let end = body_start
            .find('}')
            .ok_or_else(|| format!("unterminated placeholder in '{}'", template))?;
        let body = body_start[..end].trim();

        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(parse_placeholder(body).map_err(|e| format!("{} in '{}'", e, template))?);
        rest = &body_start[end + 1..];
    }

    literal.push_str(rest);
    if !literal.is_empty() || segments.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn parse_placeholder(body: &str) -> Result<Segment, String> {
    let (name, index) = match body.find('[') {
        Some(open) => {
            let close = body
                .strip_suffix(']')
                .ok_or_else(|| format!("malformed index in '${{{}}}'", body))?;
            let index = close[open + 1..]
                .trim()
                .parse::<usize>()
                .map_err(|_| format!("malformed index in '${{{}}}'", body))?;
            (body[..open].trim(), Some(index))
        }
        None => (body, None),
    };

    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(format!("invalid input name '{}'", name));
    }

    Ok(Segment::Input {
        name: name.to_string(),
        index,
    })
}

/// Names of all inputs referenced by a template.
pub fn referenced_inputs(segments: &[Segment]) -> impl Iterator<Item = &str> {
    segments.iter().filter_map(|s| match s {
        Segment::Input { name, .. } => Some(name.as_str()),
        Segment::Literal(_) => None,
    })
}

/// Bound input values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inputs {
    values: BTreeMap<String, Value>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Overlay `other` on top of `self`; `other` wins.
    pub fn merged(mut self, other: &Inputs) -> Self {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
        self
    }

    /// Load inputs from a TOML file of `name = value` pairs.
    pub fn from_file(path: &Path) -> Result<Self, VerifyError> {
        let content = std::fs::read_to_string(path).map_err(|e| VerifyError::Io {
            context: format!("reading inputs file {}", path.display()),
            source: e,
        })?;
        let values: BTreeMap<String, Value> =
            toml::from_str(&content).map_err(|e| VerifyError::Profile {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(Inputs { values })
    }

    /// Parse a `name=value` command line assignment.
    ///
    /// The value is read as a TOML value when it parses as one (`3`, `true`,
    /// `["a", "b"]`, `"quoted"`), otherwise it is taken as a plain string.
    pub fn parse_assignment(assignment: &str) -> Result<(String, Value), VerifyError> {
        let (name, raw) = assignment.split_once('=').ok_or_else(|| {
            VerifyError::Config(format!("input '{}' must look like name=value", assignment))
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(VerifyError::Config(format!(
                "input '{}' has an empty name",
                assignment
            )));
        }

        #[derive(serde::Deserialize)]
        struct Wrapper {
            v: Value,
        }
        let value = toml::from_str::<Wrapper>(&format!("v = {}", raw))
            .map(|w| w.v)
            .unwrap_or_else(|_| Value::String(raw.to_string()));
        Ok((name.to_string(), value))
    }

    fn lookup(&self, name: &str, index: Option<usize>) -> Result<&Value, BindError> {
        let unbound = || BindError::Unbound {
            name: name.to_string(),
            index,
        };
        let value = self.values.get(name).ok_or_else(unbound)?;
        match index {
            None => Ok(value),
            Some(i) => value.as_list().and_then(|items| items.get(i)).ok_or_else(unbound),
        }
    }

    /// Fill in a parsed template.
    ///
    /// A template that is a single placeholder yields the input's value
    /// with its type intact; anything else is rendered as a string.
    pub fn render(&self, segments: &[Segment]) -> Result<Value, BindError> {
        if let [Segment::Input { name, index }] = segments {
            return self.lookup(name, *index).cloned();
        }

        let mut out = String::new();
        for segment in segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Input { name, index } => {
                    let value = self.lookup(name, *index)?;
                    out.push_str(&scalar_text(value).ok_or_else(|| BindError::NotScalar {
                        name: name.clone(),
                    })?);
                }
            }
        }
        Ok(Value::String(out))
    }

    /// Fill in a template that must produce text (lookup keys).
    pub fn render_text(&self, segments: &[Segment]) -> Result<String, BindError> {
        let value = self.render(segments)?;
        scalar_text(&value).ok_or_else(|| BindError::NotScalar {
            name: referenced_inputs(segments).next().unwrap_or_default().to_string(),
        })
    }

    /// Substitute placeholders in every string nested inside `value`.
    pub fn render_value(&self, value: &Value) -> Result<Value, BindError> {
        match value {
            Value::String(s) => match parse_template(s) {
                Ok(segments) => self.render(&segments),
                Err(_) => Ok(value.clone()),
            },
            Value::List(items) => Ok(Value::List(
                items
                    .iter()
                    .map(|v| self.render_value(v))
                    .collect::<Result<_, _>>()?,
            )),
            Value::Map(fields) => Ok(Value::Map(
                fields
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.render_value(v)?)))
                    .collect::<Result<_, BindError>>()?,
            )),
            other => Ok(other.clone()),
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::List(_) | Value::Map(_) => None,
    }
}

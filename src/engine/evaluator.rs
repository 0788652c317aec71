//! Expectation evaluation.
//!
//! | matcher     | passes when                                         |
//! |-------------|-----------------------------------------------------|
//! | exists      | the resource exists                                 |
//! | not-exists  | the resource does not exist                         |
//! | equals      | the property is present and deep-equal              |
//! | not-equals  | the property is absent, or present and not equal    |
//! | contains    | the property is a list holding the expected element |
//!
//! Values of different types never compare equal and are reported as a type
//! mismatch rather than a value mismatch. Any property expectation against a
//! resource that does not exist fails with "property not found".

use crate::control::{Expectation, Matcher};
use crate::resource::{accessor, ResolvedResource, Value};
use crate::{Cause, Status};

/// Verdict for one expectation, before it is placed in a report.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub status: Status,
    pub cause: Option<Cause>,
    pub message: String,
}

impl Evaluation {
    fn pass(message: String) -> Self {
        Evaluation {
            status: Status::Passed,
            cause: None,
            message,
        }
    }

    fn fail(cause: Cause, message: String) -> Self {
        Evaluation {
            status: Status::Failed,
            cause: Some(cause),
            message,
        }
    }
}

/// Evaluate one expectation against a resolved resource.
pub fn evaluate(resource: &ResolvedResource, expectation: &Expectation) -> Evaluation {
    let property = expectation.property().unwrap_or_default();

    match expectation.matcher() {
        Matcher::Exists => {
            if resource.exists() {
                Evaluation::pass("resource exists".to_string())
            } else {
                Evaluation::fail(
                    Cause::ExistenceMismatch,
                    "expected resource to exist, but it was not found".to_string(),
                )
            }
        }
        Matcher::NotExists => {
            if resource.exists() {
                Evaluation::fail(
                    Cause::ExistenceMismatch,
                    "expected resource not to exist, but it was found".to_string(),
                )
            } else {
                Evaluation::pass("resource does not exist".to_string())
            }
        }
        Matcher::Equals(expected) => match lookup(resource, property) {
            Err(missing) => missing,
            Ok(actual) if !actual.same_type(expected) => type_mismatch(property, expected, actual),
            Ok(actual) if actual == expected => {
                Evaluation::pass(format!("'{}' is {}", property, actual))
            }
            Ok(actual) => Evaluation::fail(
                Cause::ValueMismatch,
                format!(
                    "value mismatch for '{}': expected {}, got {}",
                    property, expected, actual
                ),
            ),
        },
        Matcher::NotEquals(unexpected) => {
            if !resource.exists() {
                return not_found(property, true);
            }
            match accessor::get(resource, property) {
                None => Evaluation::pass(format!(
                    "property '{}' not found, which is not equal to {}",
                    property, unexpected
                )),
                Some(actual) if !actual.same_type(unexpected) => {
                    type_mismatch(property, unexpected, actual)
                }
                Some(actual) if actual == unexpected => Evaluation::fail(
                    Cause::ValueMismatch,
                    format!("expected '{}' not to eq {}", property, unexpected),
                ),
                Some(actual) => Evaluation::pass(format!("'{}' is {}", property, actual)),
            }
        }
        Matcher::Contains(element) => match lookup(resource, property) {
            Err(missing) => missing,
            Ok(Value::List(items)) if items.contains(element) => {
                Evaluation::pass(format!("'{}' includes {}", property, element))
            }
            Ok(Value::List(items)) => {
                let cause = if !items.is_empty() && items.iter().all(|i| !i.same_type(element)) {
                    Cause::TypeMismatch
                } else {
                    Cause::ValueMismatch
                };
                Evaluation::fail(
                    cause,
                    format!(
                        "expected '{}' to include {}, got {}",
                        property,
                        element,
                        Value::List(items.clone())
                    ),
                )
            }
            Ok(actual) => Evaluation::fail(
                Cause::NotAList,
                format!(
                    "'{}' is a {}, not a list: {}",
                    property,
                    actual.type_name(),
                    actual
                ),
            ),
        },
    }
}

/// Fetch a property that must be present.
fn lookup<'a>(resource: &'a ResolvedResource, property: &str) -> Result<&'a Value, Evaluation> {
    if !resource.exists() {
        return Err(not_found(property, true));
    }
    accessor::get(resource, property).ok_or_else(|| not_found(property, false))
}

fn not_found(property: &str, resource_missing: bool) -> Evaluation {
    let message = if resource_missing {
        format!("property '{}' not found: resource does not exist", property)
    } else {
        format!("property '{}' not found", property)
    };
    Evaluation::fail(Cause::PropertyNotFound, message)
}

fn type_mismatch(property: &str, expected: &Value, actual: &Value) -> Evaluation {
    Evaluation::fail(
        Cause::TypeMismatch,
        format!(
            "type mismatch for '{}': expected {} {}, got {} {}",
            property,
            expected.type_name(),
            expected,
            actual.type_name(),
            actual
        ),
    )
}

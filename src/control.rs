//! Controls as data.
//!
//! A control is a guard plus an ordered list of described resources, each
//! with its own expectations. Controls are built with the fluent builder
//! below or loaded from a profile; the runner only ever consumes data.
//!
//! ```
//! use infra_verify::control::{Control, Expectation};
//! use infra_verify::guard::Guard;
//! use infra_verify::resource::ResourceDescriptor;
//!
//! let control = Control::new("azurerm_network_watcher")
//!     .only_if(Guard::EnvSet("NETWORK_WATCHER".into()))
//!     .describe(
//!         ResourceDescriptor::new("azurerm_network_watcher")
//!             .key("resource_group", "rg1")
//!             .key("name", "nw1"),
//!         vec![
//!             Expectation::exists(),
//!             Expectation::its("provisioning_state").equals("Succeeded"),
//!         ],
//!     );
//! assert_eq!(control.expectation_count(), 2);
//! ```

use crate::guard::Guard;
use crate::resource::{ResourceDescriptor, Value};
use std::fmt;

/// Comparison rule applied to a resource or one of its properties.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    Exists,
    NotExists,
    Equals(Value),
    NotEquals(Value),
    /// Membership: the property is a list containing the value
    Contains(Value),
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Exists => write!(f, "should exist"),
            Matcher::NotExists => write!(f, "should not exist"),
            Matcher::Equals(v) => write!(f, "should eq {}", v),
            Matcher::NotEquals(v) => write!(f, "should not eq {}", v),
            Matcher::Contains(v) => write!(f, "should include {}", v),
        }
    }
}

/// One assertion inside a describe block.
///
/// Existence matchers never carry a property; value matchers always do.
#[derive(Debug, Clone, PartialEq)]
pub struct Expectation {
    property: Option<String>,
    matcher: Matcher,
}

impl Expectation {
    pub fn exists() -> Self {
        Expectation {
            property: None,
            matcher: Matcher::Exists,
        }
    }

    pub fn not_exists() -> Self {
        Expectation {
            property: None,
            matcher: Matcher::NotExists,
        }
    }

    /// Start a property expectation.
    pub fn its(property: impl Into<String>) -> PropertyExpectation {
        PropertyExpectation {
            property: property.into(),
        }
    }

    /// Target property, `None` for existence expectations.
    pub fn property(&self) -> Option<&str> {
        self.property.as_deref()
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.property {
            Some(ref property) => write!(f, "its '{}' {}", property, self.matcher),
            None => write!(f, "{}", self.matcher),
        }
    }
}

/// Half-built expectation on a named property.
#[derive(Debug, Clone)]
pub struct PropertyExpectation {
    property: String,
}

impl PropertyExpectation {
    fn with(self, matcher: Matcher) -> Expectation {
        Expectation {
            property: Some(self.property),
            matcher,
        }
    }

    pub fn equals(self, expected: impl Into<Value>) -> Expectation {
        self.with(Matcher::Equals(expected.into()))
    }

    pub fn not_equals(self, expected: impl Into<Value>) -> Expectation {
        self.with(Matcher::NotEquals(expected.into()))
    }

    pub fn contains(self, element: impl Into<Value>) -> Expectation {
        self.with(Matcher::Contains(element.into()))
    }
}

/// A described resource and the expectations on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Describe {
    pub descriptor: ResourceDescriptor,
    pub expectations: Vec<Expectation>,
}

/// A named group of described resources behind a guard.
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub id: String,
    pub title: Option<String>,
    pub impact: Option<f32>,
    pub guard: Guard,
    pub describes: Vec<Describe>,
    /// Set when profile inputs could not be bound; the control fails once
    /// its guard passes instead of resolving anything.
    pub unbound: Option<String>,
}

impl Control {
    pub fn new(id: impl Into<String>) -> Self {
        Control {
            id: id.into(),
            title: None,
            impact: None,
            guard: Guard::Always,
            describes: Vec::new(),
            unbound: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn impact(mut self, impact: f32) -> Self {
        self.impact = Some(impact);
        self
    }

    pub fn only_if(mut self, guard: Guard) -> Self {
        self.guard = guard;
        self
    }

    pub fn describe(mut self, descriptor: ResourceDescriptor, expectations: Vec<Expectation>) -> Self {
        self.describes.push(Describe {
            descriptor,
            expectations,
        });
        self
    }

    pub fn expectation_count(&self) -> usize {
        self.describes.iter().map(|d| d.expectations.len()).sum()
    }
}

//! A single preprocessor symbol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A preprocessor define: `NAME` or `NAME=VALUE`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Define {
    /// The symbol.
    pub name: String,
    /// The optional value.
    pub value: Option<String>,
}

impl Define {
    /// A value-less define.
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    /// A define with a value.
    pub fn valued(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

/// Renders `NAME` or `NAME=VALUE`. An empty value renders as a bare name.
impl fmt::Display for Define {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value.as_deref() {
            Some(value) if !value.is_empty() => write!(f, "{}={}", self.name, value),
            _ => f.write_str(&self.name),
        }
    }
}

//! Parameterized statements.
//!
//! Every value that originates from a user or from configuration reaches the
//! warehouse as a positional binding for a `?` placeholder. Identifiers cannot
//! be bound, so they go through [`validate_identifier`] instead.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{LensError, Result};

/// A typed positional parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Text(String),
    Fixed(i64),
    Real(f64),
    Boolean(bool),
}

impl Binding {
    /// Returns the SQL API type name for this binding.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "TEXT",
            Self::Fixed(_) => "FIXED",
            Self::Real(_) => "REAL",
            Self::Boolean(_) => "BOOLEAN",
        }
    }

    /// Returns the value as the SQL API expects it (always a string).
    pub fn wire_value(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Fixed(i) => i.to_string(),
            Self::Real(f) => f.to_string(),
            Self::Boolean(b) => b.to_string(),
        }
    }

    /// Returns the text value, if this is a text binding.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Binding {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Binding {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for Binding {
    fn from(v: i64) -> Self {
        Self::Fixed(v)
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.type_name(), self.wire_value())
    }
}

/// Wire form of a binding in a SQL API request body.
#[derive(Debug, Serialize, PartialEq)]
pub struct WireBinding {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: String,
}

/// SQL text plus its positional bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub bindings: Vec<Binding>,
}

impl Statement {
    /// Creates a statement with no bindings.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bindings: Vec::new(),
        }
    }

    /// Appends a binding for the next `?` placeholder.
    pub fn bind(mut self, value: impl Into<Binding>) -> Self {
        self.bindings.push(value.into());
        self
    }

    /// Returns the number of `?` placeholders outside string literals.
    pub fn placeholder_count(&self) -> usize {
        let mut in_literal = false;
        self.sql
            .chars()
            .filter(|&c| {
                if c == '\'' {
                    in_literal = !in_literal;
                }
                !in_literal && c == '?'
            })
            .count()
    }

    /// Checks that every placeholder has exactly one binding.
    pub fn validate(&self) -> Result<()> {
        let placeholders = self.placeholder_count();
        if placeholders != self.bindings.len() {
            return Err(LensError::internal(format!(
                "Statement has {} placeholders but {} bindings",
                placeholders,
                self.bindings.len()
            )));
        }
        Ok(())
    }

    /// Returns the bindings keyed by 1-based position, as the SQL API expects.
    pub fn wire_bindings(&self) -> BTreeMap<String, WireBinding> {
        self.bindings
            .iter()
            .enumerate()
            .map(|(i, b)| {
                (
                    (i + 1).to_string(),
                    WireBinding {
                        kind: b.type_name(),
                        value: b.wire_value(),
                    },
                )
            })
            .collect()
    }
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(\.[A-Za-z_][A-Za-z0-9_$]*){0,2}$")
            .expect("identifier pattern is valid")
    })
}

/// Validates an unquoted, optionally qualified object name (`db.schema.name`).
pub fn validate_identifier(name: &str) -> Result<&str> {
    if identifier_pattern().is_match(name) {
        Ok(name)
    } else {
        Err(LensError::config(format!(
            "'{name}' is not a valid object name"
        )))
    }
}

/// Renders a config-supplied name as a SQL string literal (for functions that
/// take an object name as a constant string argument).
pub fn name_literal(name: &str) -> Result<String> {
    validate_identifier(name).map(|n| format!("'{n}'"))
}

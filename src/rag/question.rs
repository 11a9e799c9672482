//! User questions.

use serde::Serialize;
use std::fmt;

/// A non-empty, trimmed free-text question.
///
/// There is no way to build an empty `Question`, so a blank submission can
/// never reach the query builder or the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Question(String);

impl Question {
    /// Returns `None` for empty or whitespace-only input.
    ///
    /// Surrounding whitespace is trimmed; the trimmed text is what gets bound
    /// into the search payload and the extraction call.
    pub fn new(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Question {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

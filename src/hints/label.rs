use std::fmt;

use serde::{Deserialize, Serialize};

/// A short typeable label, e.g. `a` or `fj`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HintLabel(String);

impl HintLabel {
    pub fn new(text: impl Into<String>) -> Self {
        HintLabel(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of characters the user has to say or type.
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn starts_with(&self, letter: char) -> bool {
        self.0.starts_with(letter)
    }
}

impl fmt::Display for HintLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HintLabel {
    fn from(text: &str) -> Self {
        HintLabel(text.to_string())
    }
}

impl From<String> for HintLabel {
    fn from(text: String) -> Self {
        HintLabel(text)
    }
}

/// Shorthand for building label lists in tests and fixtures.
pub fn labels(texts: &[&str]) -> Vec<HintLabel> {
    texts.iter().map(|t| HintLabel::from(*t)).collect()
}

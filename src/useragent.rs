//! The result of one analysis: a set of named fields with confidences.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value reported for a field nobody set.
pub const UNKNOWN_VALUE: &str = "Unknown";

/// Confidence of a field nobody set; any set with a higher value wins.
pub const DEFAULT_CONFIDENCE: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentField {
    pub value: String,
    pub confidence: i64,
}

impl AgentField {
    fn unknown() -> Self {
        Self {
            value: UNKNOWN_VALUE.to_string(),
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

/// Two matchers set one field with equal confidence and different values.
///
/// The value that arrived first is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConflict {
    pub field: String,
    pub kept: String,
    pub rejected: String,
    pub confidence: i64,
}

/// Analyzed User-Agent.
///
/// # Examples
///
/// ```rust
/// use useragent_engine::UserAgent;
///
/// let mut agent = UserAgent::new("Foo/1.0");
/// agent.set("AgentName", "Foo", 10);
/// agent.set("AgentName", "Bar", 5);
/// assert_eq!(agent.get_value("AgentName"), "Foo");
/// assert_eq!(agent.get_value("DeviceClass"), "Unknown");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgent {
    user_agent_string: String,
    fields: BTreeMap<String, AgentField>,
    conflicts: Vec<FieldConflict>,
    has_syntax_error: bool,
}

impl UserAgent {
    pub fn new(user_agent_string: impl Into<String>) -> Self {
        Self {
            user_agent_string: user_agent_string.into(),
            ..Self::default()
        }
    }

    pub fn user_agent_string(&self) -> &str {
        &self.user_agent_string
    }

    /// Set `field` unless it already holds a value of equal or higher
    /// confidence. Returns whether the value was stored.
    pub fn set(&mut self, field: &str, value: &str, confidence: i64) -> bool {
        let current = self.fields.get(field);
        let current_confidence = current.map_or(DEFAULT_CONFIDENCE, |field| field.confidence);

        if confidence > current_confidence {
            self.set_forced(field, value, confidence);
            return true;
        }

        if let Some(current) = current {
            if confidence == current.confidence && current.value != value {
                log::debug!(
                    "Ambiguous value for {}: kept \"{}\", rejected \"{}\" (confidence {})",
                    field,
                    current.value,
                    value,
                    confidence
                );
                self.conflicts.push(FieldConflict {
                    field: field.to_string(),
                    kept: current.value.clone(),
                    rejected: value.to_string(),
                    confidence,
                });
            }
        }
        false
    }

    /// Set `field` regardless of what it holds.
    pub fn set_forced(&mut self, field: &str, value: &str, confidence: i64) {
        self.fields.insert(
            field.to_string(),
            AgentField {
                value: value.to_string(),
                confidence,
            },
        );
    }

    pub fn get(&self, field: &str) -> AgentField {
        self.fields.get(field).cloned().unwrap_or_else(AgentField::unknown)
    }

    pub fn get_value(&self, field: &str) -> &str {
        self.fields
            .get(field)
            .map_or(UNKNOWN_VALUE, |field| field.value.as_str())
    }

    pub fn get_confidence(&self, field: &str) -> i64 {
        self.fields
            .get(field)
            .map_or(DEFAULT_CONFIDENCE, |field| field.confidence)
    }

    /// Names of the fields that were set, sorted.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn has_syntax_error(&self) -> bool {
        self.has_syntax_error
    }

    pub fn set_syntax_error(&mut self, has_syntax_error: bool) {
        self.has_syntax_error = has_syntax_error;
    }

    pub fn has_ambiguity(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn conflicts(&self) -> &[FieldConflict] {
        &self.conflicts
    }

    /// Store `first` and `second` combined without repeating words.
    ///
    /// The confidence is the highest of the two source fields.
    pub fn concat_field_values_non_duplicated(&mut self, target: &str, first: &str, second: &str) {
        let known = |field: &str| {
            self.fields
                .get(field)
                .filter(|field| field.value != UNKNOWN_VALUE)
                .map(|field| field.value.as_str())
        };
        let value = concat_non_duplicated(known(first), known(second));
        let confidence = self.get_confidence(first).max(self.get_confidence(second));
        self.set_forced(target, &value, confidence);
    }

    pub fn reset(&mut self) {
        self.user_agent_string.clear();
        self.fields.clear();
        self.conflicts.clear();
        self.has_syntax_error = false;
    }
}

/// Join two optional values, dropping the shorter one when the longer
/// already starts with it.
///
/// ```rust
/// use useragent_engine::useragent::concat_non_duplicated;
///
/// assert_eq!(concat_non_duplicated(Some("One"), Some("Two")), "One Two");
/// assert_eq!(concat_non_duplicated(Some("One"), Some("One Two")), "One Two");
/// assert_eq!(concat_non_duplicated(None, None), "Unknown");
/// ```
pub fn concat_non_duplicated(first: Option<&str>, second: Option<&str>) -> String {
    match (first, second) {
        (None, None) => UNKNOWN_VALUE.to_string(),
        (Some(only), None) | (None, Some(only)) => only.to_string(),
        (Some(first), Some(second)) => {
            if first == second || first.starts_with(second) {
                first.to_string()
            } else if second.starts_with(first) {
                second.to_string()
            } else {
                format!("{first} {second}")
            }
        }
    }
}

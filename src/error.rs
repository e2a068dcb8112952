//! Error types for the User-Agent engine.
//!
//! Everything in here is a configuration error raised while rules are
//! compiled. Parsing a User-Agent never fails; problems with the input text
//! end up as flags on the [`UserAgent`](crate::UserAgent) result.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, UserAgentError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserAgentError {
    #[error("Invalid expression \"{expression}\": {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("Malformed {kind} line: \"{line}\"")]
    MalformedConfigLine { kind: String, line: String },

    #[error("Invalid confidence \"{0}\"")]
    InvalidConfidence(String),

    #[error("Missing lookup \"{0}\"")]
    MissingLookup(String),

    #[error("Missing set \"{0}\"")]
    MissingSet(String),

    #[error("Invalid lookup \"{name}\": {reason}")]
    InvalidLookup { name: String, reason: String },

    #[error("Duplicate lookup \"{0}\"")]
    DuplicateLookup(String),

    #[error("Fixed value \"{value}\" is not in lookup \"{lookup}\"")]
    FixedValueNotInLookup { value: String, lookup: String },

    #[error("Variable \"@{0}\" is used before it is defined")]
    UndefinedVariable(String),

    #[error("Duplicate variable \"@{0}\"")]
    DuplicateVariable(String),

    #[error("Unknown tree node name \"{0}\"")]
    UnknownNodeName(String),

    #[error("Matcher has no extract actions: {0}")]
    NoExtractActions(String),

    #[error("Matcher extracts no wanted fields: {0}")]
    UselessMatcher(String),

    #[error("Rule set \"{0}\" was already loaded")]
    DuplicateRuleSet(String),

    #[error("Rule set \"{name}\" has version {found} but the engine expects {expected}")]
    VersionMismatch {
        name: String,
        expected: String,
        found: String,
    },
}

impl UserAgentError {
    pub(crate) fn invalid_expression(expression: &str, reason: impl Into<String>) -> Self {
        UserAgentError::InvalidExpression {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }

    /// True for the recoverable "every extract was filtered out" condition.
    pub fn is_useless_matcher(&self) -> bool {
        matches!(self, UserAgentError::UselessMatcher(_))
    }
}

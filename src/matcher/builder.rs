//! Rule entries as written by a rule author, and their line syntax.
//!
//! A matcher entry holds three lists of lines:
//!
//! ```text
//! variable:  Name : expression
//! require:   expression
//! extract:   Attribute : confidence : expression
//! ```
//!
//! The confidence of an extract may be left out (`Attribute : expression`),
//! in which case it is 0.

use crate::error::{Result, UserAgentError};
use serde::{Deserialize, Serialize};

/// One matcher entry of a rule set.
///
/// # Example
///
/// ```rust
/// use useragent_engine::matcher::{ActionSpec, MatcherConfig};
///
/// let config = MatcherConfig {
///     variable: vec![],
///     require: vec![r#"agent.(1)product.(1)name="Mozilla""#.to_string()],
///     extract: vec!["AgentName : 100 : agent.(1)product.(2)name".to_string()],
/// };
/// let specs = config.specs()?;
/// assert_eq!(
///     specs[1],
///     ActionSpec::Extract {
///         attribute: "AgentName".to_string(),
///         confidence: 100,
///         expression: "agent.(1)product.(2)name".to_string(),
///     }
/// );
/// # Ok::<(), useragent_engine::UserAgentError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub variable: Vec<String>,
    pub require: Vec<String>,
    pub extract: Vec<String>,
}

/// A parsed configuration line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionSpec {
    Variable {
        name: String,
        expression: String,
    },
    Require {
        expression: String,
    },
    Extract {
        attribute: String,
        confidence: i64,
        expression: String,
    },
}

impl ActionSpec {
    pub fn expression(&self) -> &str {
        match self {
            ActionSpec::Variable { expression, .. }
            | ActionSpec::Require { expression }
            | ActionSpec::Extract { expression, .. } => expression,
        }
    }
}

impl MatcherConfig {
    /// Parse every line, in the order variables, requires, extracts.
    pub fn specs(&self) -> Result<Vec<ActionSpec>> {
        let mut specs = Vec::with_capacity(self.variable.len() + self.require.len() + self.extract.len());
        for line in &self.variable {
            specs.push(parse_variable_line(line)?);
        }
        for line in &self.require {
            specs.push(parse_require_line(line)?);
        }
        for line in &self.extract {
            specs.push(parse_extract_line(line)?);
        }
        Ok(specs)
    }

    /// Short human readable form used in errors and logs.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.require.is_empty() {
            parts.push(format!("require [{}]", self.require.join(" | ")));
        }
        if !self.extract.is_empty() {
            parts.push(format!("extract [{}]", self.extract.join(" | ")));
        }
        if parts.is_empty() {
            return "empty matcher".to_string();
        }
        parts.join(" ")
    }
}

fn malformed(kind: &str, line: &str) -> UserAgentError {
    UserAgentError::MalformedConfigLine {
        kind: kind.to_string(),
        line: line.to_string(),
    }
}

fn parse_variable_line(line: &str) -> Result<ActionSpec> {
    let (name, expression) = line.split_once(':').ok_or_else(|| malformed("variable", line))?;
    let name = name.trim();
    let expression = expression.trim();
    if name.is_empty() || expression.is_empty() {
        return Err(malformed("variable", line));
    }
    Ok(ActionSpec::Variable {
        name: name.to_string(),
        expression: expression.to_string(),
    })
}

fn parse_require_line(line: &str) -> Result<ActionSpec> {
    let expression = line.trim();
    if expression.is_empty() {
        return Err(malformed("require", line));
    }
    Ok(ActionSpec::Require {
        expression: expression.to_string(),
    })
}

fn parse_extract_line(line: &str) -> Result<ActionSpec> {
    let parts: Vec<&str> = line.splitn(3, ':').collect();
    let (attribute, confidence, expression) = match parts.as_slice() {
        [attribute, middle, rest] if looks_like_confidence(middle) => {
            let confidence = middle
                .trim()
                .parse::<i64>()
                .map_err(|_| UserAgentError::InvalidConfidence(middle.trim().to_string()))?;
            (*attribute, confidence, *rest)
        }
        [_, _, _] | [_, _] => {
            // The expression itself may contain ':' inside a quoted value.
            let (attribute, expression) = line.split_once(':').ok_or_else(|| malformed("extract", line))?;
            (attribute, 0, expression)
        }
        _ => return Err(malformed("extract", line)),
    };

    let attribute = attribute.trim();
    let expression = expression.trim();
    if attribute.is_empty() || expression.is_empty() {
        return Err(malformed("extract", line));
    }
    Ok(ActionSpec::Extract {
        attribute: attribute.to_string(),
        confidence,
        expression: expression.to_string(),
    })
}

fn looks_like_confidence(part: &str) -> bool {
    let part = part.trim();
    part.is_empty() || part.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(line: &str) -> Result<ActionSpec> {
        parse_extract_line(line)
    }

    #[test]
    fn test_extract_with_confidence() {
        assert_eq!(
            extract("DeviceClass : -5 : agent.(1)product").unwrap(),
            ActionSpec::Extract {
                attribute: "DeviceClass".to_string(),
                confidence: -5,
                expression: "agent.(1)product".to_string(),
            }
        );
    }

    #[test]
    fn test_extract_without_confidence() {
        assert_eq!(
            extract("DeviceClass : agent.(1)product").unwrap(),
            ActionSpec::Extract {
                attribute: "DeviceClass".to_string(),
                confidence: 0,
                expression: "agent.(1)product".to_string(),
            }
        );
        assert_eq!(
            extract(r#"Name : agent.(1)product.(1)name="a:b""#).unwrap(),
            ActionSpec::Extract {
                attribute: "Name".to_string(),
                confidence: 0,
                expression: r#"agent.(1)product.(1)name="a:b""#.to_string(),
            }
        );
    }

    #[test]
    fn test_extract_fixed_value_with_colon() {
        assert_eq!(
            extract(r#"Time : 10 : "12:30""#).unwrap(),
            ActionSpec::Extract {
                attribute: "Time".to_string(),
                confidence: 10,
                expression: r#""12:30""#.to_string(),
            }
        );
    }

    #[test]
    fn test_malformed_lines() {
        assert!(matches!(
            extract("agent.(1)product"),
            Err(UserAgentError::MalformedConfigLine { .. })
        ));
        assert!(matches!(
            extract(" : 10 : agent"),
            Err(UserAgentError::MalformedConfigLine { .. })
        ));
        assert_eq!(
            extract("Name : 99999999999999999999 : agent").unwrap_err(),
            UserAgentError::InvalidConfidence("99999999999999999999".to_string())
        );
        assert_eq!(
            extract("Name :  : agent").unwrap_err(),
            UserAgentError::InvalidConfidence(String::new())
        );
        assert!(parse_variable_line("NoColon").is_err());
        assert!(parse_require_line("   ").is_err());
    }

    #[test]
    fn test_specs_order() {
        let config = MatcherConfig {
            variable: vec!["Ver : agent.(1)product.(1)version".to_string()],
            require: vec!["agent.(1)product".to_string()],
            extract: vec!["A : 1 : @Ver".to_string()],
        };
        let specs = config.specs().unwrap();
        assert!(matches!(specs[0], ActionSpec::Variable { ref name, .. } if name == "Ver"));
        assert!(matches!(specs[1], ActionSpec::Require { .. }));
        assert!(matches!(specs[2], ActionSpec::Extract { .. }));
        assert_eq!(specs[2].expression(), "@Ver");
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let yaml = r#"
require:
  - 'agent.(1)product.(1)name="Foo"'
extract:
  - 'AgentName : 10 : "Foo"'
"#;
        let config: MatcherConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.variable.is_empty());
        assert_eq!(config.require.len(), 1);
        assert_eq!(
            config.describe(),
            r#"require [agent.(1)product.(1)name="Foo"] extract [AgentName : 10 : "Foo"]"#
        );
    }
}

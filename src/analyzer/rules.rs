//! Rule sets: named groups of lookups, sets and matcher entries.
//!
//! The crate does not read rule files. A caller deserializes [`RuleSet`]s
//! with any serde format (or builds them in code) and hands them to the
//! [`UserAgentAnalyzerBuilder`](super::UserAgentAnalyzerBuilder).

use crate::error::{Result, UserAgentError};
use crate::matcher::MatcherConfig;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rule format version this engine understands.
pub const RULE_FORMAT_VERSION: &str = "1";

/// A named group of rules.
///
/// # Examples
///
/// ```rust
/// use useragent_engine::{MatcherConfig, RuleSet};
///
/// let rules = RuleSet::new("browsers")
///     .with_lookup("BrowserNames", [("fxios", "Firefox")])
///     .with_set("MobileWords", ["Mobile", "Mobi"])
///     .with_matcher(MatcherConfig {
///         extract: vec![r#"AgentName : 10 : LookUp[BrowserNames;agent.(1)product.(1)name]"#.to_string()],
///         ..Default::default()
///     });
/// assert_eq!(rules.matchers.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Contains-lookups resolve overlapping keys in declaration order, so
    /// each lookup keeps the order its entries were written in.
    pub lookups: BTreeMap<String, IndexMap<String, String>>,
    pub sets: BTreeMap<String, Vec<String>>,
    pub matchers: Vec<MatcherConfig>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_lookup<K, V>(mut self, name: impl Into<String>, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.lookups.insert(
            name.into(),
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        );
        self
    }

    pub fn with_set<V: Into<String>>(mut self, name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        self.sets
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_matcher(mut self, matcher: MatcherConfig) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// A rule set without version is accepted as the current format.
    pub fn check_version(&self) -> Result<()> {
        match self.version.as_deref() {
            None => Ok(()),
            Some(version) if version.trim() == RULE_FORMAT_VERSION => Ok(()),
            Some(version) => Err(UserAgentError::VersionMismatch {
                name: self.name.clone(),
                expected: RULE_FORMAT_VERSION.to_string(),
                found: version.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_order_survives_yaml() {
        let yaml = r#"
name: devices
version: "1"
lookups:
  Phones:
    zzz: Last
    aaa: First
    mmm: Middle
sets:
  Mobile: [Android, iPhone]
matchers:
  - extract:
      - 'DeviceClass : 10 : "Phone"'
"#;
        let rules: RuleSet = serde_yaml::from_str(yaml).unwrap();
        let keys: Vec<&str> = rules.lookups["Phones"].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zzz", "aaa", "mmm"]);
        assert_eq!(rules.sets["Mobile"], vec!["Android", "iPhone"]);
        assert_eq!(rules.matchers[0].extract.len(), 1);
        assert!(rules.check_version().is_ok());
    }

    #[test]
    fn test_serialize_keeps_order() {
        let rules = RuleSet::new("x").with_lookup("L", [("b", "2"), ("a", "1")]);
        let yaml = serde_yaml::to_string(&rules).unwrap();
        let back: RuleSet = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, rules);
        assert!(yaml.find("b: ").unwrap() < yaml.find("a: ").unwrap());
    }

    #[test]
    fn test_version_check() {
        assert!(RuleSet::new("none").check_version().is_ok());
        assert!(RuleSet::new("one").with_version("1").check_version().is_ok());
        assert_eq!(
            RuleSet::new("two").with_version("2").check_version().unwrap_err(),
            UserAgentError::VersionMismatch {
                name: "two".to_string(),
                expected: "1".to_string(),
                found: "2".to_string(),
            }
        );
    }
}

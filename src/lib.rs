//! # User-Agent Analysis Engine
//!
//! A rule-based Rust library that parses free-form User-Agent strings into a
//! structured set of fields (agent, operating system, device, ...).
//!
//! Rules are written as path expressions over the parsed User-Agent tree.
//! Each expression is compiled once into hash keys plus a short chain of
//! steps, so a parse only evaluates the rules whose paths actually occur in
//! the input.
//!
//! ## Quick Start
//!
//! ### Basic Usage
//!
//! ```rust
//! use useragent_engine::{MatcherConfig, RuleSet, UserAgentAnalyzer};
//!
//! let rules = RuleSet::new("browsers")
//!     .with_lookup("BrowserNames", [("firefox", "Firefox"), ("chrome", "Chrome")])
//!     .with_matcher(MatcherConfig {
//!         extract: vec![
//!             "AgentName : 100 : LookUp[BrowserNames;agent.(2-4)product.(1)name]".to_string(),
//!             "AgentVersion : 100 : agent.(2-4)product.(1)name=\"Firefox\"^.(1)version".to_string(),
//!         ],
//!         ..Default::default()
//!     });
//!
//! let mut analyzer = UserAgentAnalyzer::builder().with_rule_set(rules).build()?;
//!
//! let agent = analyzer.parse("Mozilla/5.0 (X11; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0");
//! assert_eq!(agent.get_value("AgentName"), "Firefox");
//! assert_eq!(agent.get_value("AgentVersion"), "120.0");
//! assert_eq!(agent.get_value("DeviceClass"), "Unknown");
//! # Ok::<(), useragent_engine::UserAgentError>(())
//! ```
//!
//! ### Rules from YAML
//!
//! [`RuleSet`] derives serde traits, so rules can be kept in any format
//! serde supports:
//!
//! ```rust,ignore
//! let rules: RuleSet = serde_yaml::from_str(&std::fs::read_to_string("rules.yaml")?)?;
//! ```
//!
//! ### Batch Processing
//!
//! ```rust
//! use useragent_engine::{MatcherConfig, RuleSet, UserAgentAnalyzer};
//!
//! let rules = RuleSet::new("names").with_matcher(MatcherConfig {
//!     extract: vec!["FirstProduct : 1 : agent.(1)product.(1)name".to_string()],
//!     ..Default::default()
//! });
//! let analyzer = UserAgentAnalyzer::builder().with_rule_set(rules).build()?;
//!
//! let results = analyzer.parse_batch(&["curl/8.4.0", "Wget/1.21"]);
//! assert_eq!(results[0].get_value("FirstProduct"), "curl");
//! assert_eq!(results[1].get_value("FirstProduct"), "Wget");
//! # Ok::<(), useragent_engine::UserAgentError>(())
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod normalize;
pub mod registry;
pub mod splitter;
pub mod useragent;

// Parse tree, flattening and compiled expressions
pub mod tree;
pub mod walk;

// Rule entries and the analyzer driving them
pub mod analyzer;
pub mod matcher;

// Primary analyzer interface
pub use analyzer::{
    AnalyzerStatistics, RuleSet, UserAgentAnalyzer, UserAgentAnalyzerBuilder,
    RULE_FORMAT_VERSION,
};

// Configuration
pub use cache::CacheStats;
pub use config::{AnalyzerConfig, CacheConfig, ParallelConfig};

// Core types and errors
pub use error::{Result, UserAgentError};
pub use useragent::{AgentField, FieldConflict, UserAgent, DEFAULT_CONFIDENCE, UNKNOWN_VALUE};

// Matcher system
pub use matcher::{ActionKind, Matcher, MatcherAction, MatcherConfig};
pub use walk::{TreeExpressionEvaluator, WalkList};

//! Matchers: the compiled form of one rule entry.
//!
//! A [`Matcher`] owns its actions in evaluation order: variables first,
//! then requires, then extracts. During a parse the analyzer forwards the
//! flattened events each action registered for; afterwards
//! [`Matcher::analyze`] decides whether the whole entry matched and, if so,
//! writes every extract into the [`UserAgent`].
//!
//! ## Variables
//!
//! `@Name` is resolved while the matcher is built. Each variable keeps the
//! list of later actions that read it, and when the variable produces a
//! value those actions are informed with key `@Name`. The lookup is local
//! to one matcher, so variables of different matchers never meet.
//!
//! ## Example
//!
//! ```rust
//! use useragent_engine::matcher::{Matcher, MatcherConfig};
//! use useragent_engine::walk::Lookups;
//! use useragent_engine::AnalyzerConfig;
//!
//! let config = MatcherConfig {
//!     variable: vec!["Ver : agent.(1)product.(1)version".to_string()],
//!     require: vec![],
//!     extract: vec!["AgentVersion : 10 : CleanVersion[@Ver]".to_string()],
//! };
//! let matcher = Matcher::new("example", &config, &Lookups::new(), &AnalyzerConfig::default())?;
//! assert_eq!(matcher.actions().len(), 2);
//! # Ok::<(), useragent_engine::UserAgentError>(())
//! ```

pub mod action;
pub mod builder;

pub use action::{ActionKind, Match, MatcherAction};
pub use builder::{ActionSpec, MatcherConfig};

use crate::config::AnalyzerConfig;
use crate::error::{Result, UserAgentError};
use crate::registry::{ActionRef, InterestRegistry};
use crate::tree::{NodeId, SyntaxTree};
use crate::useragent::UserAgent;
use crate::walk::Lookups;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct VariableUsers {
    key: String,
    actions: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Matcher {
    source: String,
    actions: Vec<MatcherAction>,
    /// Variable action index to the actions reading it.
    variable_users: HashMap<usize, VariableUsers>,
}

impl Matcher {
    /// Compile one rule entry.
    ///
    /// Extracts of fields `config` does not want are dropped; a matcher
    /// left without extracts fails with [`UserAgentError::UselessMatcher`].
    pub fn new(
        source: impl Into<String>,
        config: &MatcherConfig,
        lookups: &Lookups,
        analyzer_config: &AnalyzerConfig,
    ) -> Result<Self> {
        let source = source.into();
        let specs = config.specs()?;

        let extract_count = specs
            .iter()
            .filter(|spec| matches!(spec, ActionSpec::Extract { .. }))
            .count();
        if extract_count == 0 {
            return Err(UserAgentError::NoExtractActions(config.describe()));
        }

        let specs: Vec<ActionSpec> = specs
            .into_iter()
            .filter(|spec| match spec {
                ActionSpec::Extract { attribute, .. } => analyzer_config.is_wanted(attribute),
                _ => true,
            })
            .collect();
        if !specs.iter().any(|spec| matches!(spec, ActionSpec::Extract { .. })) {
            return Err(UserAgentError::UselessMatcher(config.describe()));
        }

        let mut actions = Vec::with_capacity(specs.len());
        let mut variables: HashMap<String, usize> = HashMap::new();
        let mut variable_users: HashMap<usize, VariableUsers> = HashMap::new();

        for spec in specs {
            let index = actions.len();
            let (kind, expression) = match spec {
                ActionSpec::Variable { name, expression } => {
                    if variables.contains_key(&name) {
                        return Err(UserAgentError::DuplicateVariable(name));
                    }
                    (ActionKind::Variable { name }, expression)
                }
                ActionSpec::Require { expression } => (ActionKind::Require, expression),
                ActionSpec::Extract {
                    attribute,
                    confidence,
                    expression,
                } => (
                    ActionKind::Extract {
                        attribute,
                        confidence,
                    },
                    expression,
                ),
            };

            let action = MatcherAction::new(kind, &expression, lookups)?;

            if let Some(variable) = action.variable_dependency() {
                let provider = variables
                    .get(variable)
                    .copied()
                    .ok_or_else(|| UserAgentError::UndefinedVariable(variable.to_string()))?;
                variable_users
                    .entry(provider)
                    .or_insert_with(|| VariableUsers {
                        key: format!("@{variable}"),
                        actions: Vec::new(),
                    })
                    .actions
                    .push(index);
            }
            if let ActionKind::Variable { name } = action.kind() {
                variables.insert(name.clone(), index);
            }
            actions.push(action);
        }

        Ok(Self {
            source,
            actions,
            variable_users,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn actions(&self) -> &[MatcherAction] {
        &self.actions
    }

    /// Register the hash entries of every action; returns how many.
    pub fn register_interests(&self, matcher: usize, registry: &mut dyn InterestRegistry) -> usize {
        self.actions
            .iter()
            .enumerate()
            .map(|(index, action)| action.calculate_inform_path(ActionRef::new(matcher, index), registry))
            .sum()
    }

    /// True when no action needs input, so the matcher can fire on any
    /// parse without receiving a single event.
    pub fn is_always_evaluated(&self) -> bool {
        self.actions.iter().all(|action| !action.must_have_matches())
    }

    pub fn inform(&mut self, action: usize, key: &str, value: &str, node: NodeId) {
        if let Some(action) = self.actions.get_mut(action) {
            action.inform(key, value, node);
        }
    }

    /// Evaluate all actions in order; on success write the extracts.
    ///
    /// Returns whether the matcher fired. In verbose mode the early exit on
    /// actions without input is skipped and failures are logged.
    pub fn analyze(&mut self, tree: &SyntaxTree, user_agent: &mut UserAgent, verbose: bool) -> bool {
        if !verbose && self.actions.iter().any(MatcherAction::cannot_be_valid) {
            return false;
        }

        for index in 0..self.actions.len() {
            let result = match self.actions[index].obtain_result(tree) {
                Some(result) => result.clone(),
                None => {
                    if verbose {
                        log::info!(
                            "Matcher {} failed on \"{}\"",
                            self.source,
                            self.actions[index].expression()
                        );
                    }
                    return false;
                }
            };

            if let Some(users) = self.variable_users.get(&index) {
                for &user in &users.actions {
                    self.actions[user].inform(&users.key, &result.value, result.node);
                }
            }
        }

        for action in &mut self.actions {
            let value = match action.obtain_result(tree) {
                Some(result) => result.value.clone(),
                None => continue,
            };
            if let ActionKind::Extract {
                attribute,
                confidence,
            } = action.kind()
            {
                if verbose {
                    log::info!(
                        "Matcher {} sets {} = \"{}\" ({})",
                        self.source,
                        attribute,
                        value,
                        confidence
                    );
                }
                user_agent.set(attribute, &value, *confidence);
            }
        }
        true
    }

    pub fn reset(&mut self) {
        for action in &mut self.actions {
            action.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CollectingRegistry;
    use crate::tree::parser::parse;

    fn config(variable: &[&str], require: &[&str], extract: &[&str]) -> MatcherConfig {
        let lines = |lines: &[&str]| lines.iter().map(|line| line.to_string()).collect();
        MatcherConfig {
            variable: lines(variable),
            require: lines(require),
            extract: lines(extract),
        }
    }

    fn matcher(config: &MatcherConfig) -> Result<Matcher> {
        Matcher::new("test", config, &Lookups::new(), &AnalyzerConfig::default())
    }

    /// Hand every registered key of `matcher` that occurs in `tree`.
    fn feed(matcher: &mut Matcher, tree: &SyntaxTree) {
        struct Feed<'a> {
            matcher: &'a mut Matcher,
            keys: HashMap<String, Vec<usize>>,
        }
        impl crate::registry::Analyzer for Feed<'_> {
            fn inform(&mut self, path: &str, value: &str, node: NodeId) {
                for key in [path.to_lowercase(), format!("{path}=\"{value}\"").to_lowercase()] {
                    if let Some(actions) = self.keys.get(&key) {
                        for &action in actions {
                            self.matcher.inform(action, &key, value, node);
                        }
                    }
                }
            }
            fn required_inform_ranges(&self, _path: &str) -> Vec<crate::splitter::WordRange> {
                Vec::new()
            }
            fn required_prefix_lengths(&self, _tree_name: &str) -> Vec<usize> {
                Vec::new()
            }
        }

        let mut keys: HashMap<String, Vec<usize>> = HashMap::new();
        for index in 0..matcher.actions().len() {
            let mut registry = CollectingRegistry::new();
            matcher.actions()[index].calculate_inform_path(ActionRef::new(0, index), &mut registry);
            for key in registry.keys() {
                keys.entry(key.to_lowercase()).or_default().push(index);
            }
        }
        let mut feed = Feed { matcher, keys };
        crate::tree::UserAgentTreeFlattener::flatten(tree, &mut feed);
    }

    #[test]
    fn test_matcher_fires_and_extracts() {
        let config = config(
            &["Ver : agent.(1)product.(1)name=\"Foo\"^.(1)version"],
            &["agent.(1)product.(1)name=\"Foo\""],
            &["AgentName : 10 : \"Foo Browser\"", "AgentVersion : 10 : CleanVersion[@Ver]"],
        );
        let mut matcher = matcher(&config).unwrap();
        let tree = parse("Foo/1_2");
        let mut user_agent = UserAgent::new("Foo/1_2");

        feed(&mut matcher, &tree);
        assert!(matcher.analyze(&tree, &mut user_agent, false));
        assert_eq!(user_agent.get_value("AgentName"), "Foo Browser");
        assert_eq!(user_agent.get_value("AgentVersion"), "1.2");
        assert_eq!(user_agent.get_confidence("AgentVersion"), 10);
    }

    #[test]
    fn test_failed_require_writes_nothing() {
        let config = config(
            &[],
            &["agent.(1)product.(1)name=\"Bar\""],
            &["AgentName : 10 : \"Bar\""],
        );
        let mut matcher = matcher(&config).unwrap();
        let tree = parse("Foo/1.0");
        let mut user_agent = UserAgent::new("Foo/1.0");

        feed(&mut matcher, &tree);
        assert!(!matcher.analyze(&tree, &mut user_agent, false));
        assert!(!matcher.analyze(&tree, &mut user_agent, true));
        assert!(user_agent.field_names().is_empty());
    }

    #[test]
    fn test_reset_and_reanalyze() {
        let config = config(&[], &[], &["AgentVersion : 5 : agent.(1)product.(1)version"]);
        let mut matcher = matcher(&config).unwrap();

        for input in ["Foo/1.0", "Bar/2.0", "Foo/1.0"] {
            let tree = parse(input);
            let mut user_agent = UserAgent::new(input);
            matcher.reset();
            feed(&mut matcher, &tree);
            assert!(matcher.analyze(&tree, &mut user_agent, false));
            assert_eq!(user_agent.get_value("AgentVersion"), &input[4..]);
        }
    }

    #[test]
    fn test_variable_errors() {
        let undefined = config(&[], &[], &["A : 1 : @Missing"]);
        assert_eq!(
            matcher(&undefined).unwrap_err(),
            UserAgentError::UndefinedVariable("Missing".to_string())
        );

        let forward = config(
            &["First : @Second", "Second : agent.(1)product"],
            &[],
            &["A : 1 : @First"],
        );
        assert_eq!(
            matcher(&forward).unwrap_err(),
            UserAgentError::UndefinedVariable("Second".to_string())
        );

        let duplicate = config(
            &["Same : agent.(1)product", "Same : agent.(2)product"],
            &[],
            &["A : 1 : @Same"],
        );
        assert_eq!(
            matcher(&duplicate).unwrap_err(),
            UserAgentError::DuplicateVariable("Same".to_string())
        );
    }

    #[test]
    fn test_extract_filtering() {
        let two_extracts = config(&[], &[], &["A : 1 : \"a\"", "B : 1 : \"b\""]);
        let wanted = AnalyzerConfig::testing().with_wanted_fields(["B"]);
        let filtered = Matcher::new("test", &two_extracts, &Lookups::new(), &wanted).unwrap();
        assert_eq!(filtered.actions().len(), 1);
        assert!(filtered.is_always_evaluated());

        let nothing = AnalyzerConfig::testing().with_wanted_fields(["C"]);
        let error = Matcher::new("test", &two_extracts, &Lookups::new(), &nothing).unwrap_err();
        assert!(error.is_useless_matcher());

        let no_extracts = config(&[], &["agent.(1)product"], &[]);
        assert!(matches!(
            matcher(&no_extracts),
            Err(UserAgentError::NoExtractActions(_))
        ));
    }

    #[test]
    fn test_register_interests() {
        let config = config(
            &[],
            &["agent.(1)product.(1-2)name=\"Foo\""],
            &["A : 1 : agent.(1)product.(1)version"],
        );
        let matcher = matcher(&config).unwrap();
        let mut registry = CollectingRegistry::new();
        assert_eq!(matcher.register_interests(3, &mut registry), 3);
        assert!(!matcher.is_always_evaluated());
    }
}

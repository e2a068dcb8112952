//! The User-Agent analyzer.
//!
//! Building an analyzer compiles every matcher of every registered
//! [`RuleSet`] and indexes the hash keys their actions asked for. Parsing
//! then runs in four steps:
//!
//! 1. the input is repaired by [`fix_it`](crate::tree::hacks::fix_it) and
//!    parsed into a [`SyntaxTree`](crate::tree::SyntaxTree)
//! 2. the flattener walks the tree and every event is routed through the
//!    index to the interested actions
//! 3. every matcher that received input (plus the matchers that need none)
//!    is analyzed in declaration order, writing its extracts
//! 4. the touched matchers are reset for the next parse
//!
//! Compiled rules are shared behind an [`Arc`]; the per-parse matcher state
//! is owned by one analyzer value. Use [`UserAgentAnalyzer::fork`] (or
//! [`UserAgentAnalyzer::parse_batch`]) to analyze from several threads.
//!
//! # Example
//!
//! ```rust
//! use useragent_engine::{MatcherConfig, RuleSet, UserAgentAnalyzer};
//!
//! let rules = RuleSet::new("example").with_matcher(MatcherConfig {
//!     require: vec![r#"agent.(1)product.(1)name="Mozilla""#.to_string()],
//!     extract: vec!["MozillaVersion : 10 : agent.(1)product.(1)version".to_string()],
//!     ..Default::default()
//! });
//!
//! let mut analyzer = UserAgentAnalyzer::builder().with_rule_set(rules).build()?;
//! let agent = analyzer.parse("Mozilla/5.0 (X11; Linux x86_64)");
//! assert_eq!(agent.get_value("MozillaVersion"), "5.0");
//! # Ok::<(), useragent_engine::UserAgentError>(())
//! ```

mod index;
pub mod rules;

pub use rules::{RuleSet, RULE_FORMAT_VERSION};

use crate::cache::{CacheStats, LruCache};
use crate::config::AnalyzerConfig;
use crate::error::{Result, UserAgentError};
use crate::matcher::Matcher;
use crate::tree::{hacks, parser, FlattenEvent, FlattenRecorder, UserAgentTreeFlattener};
use crate::useragent::UserAgent;
use crate::walk::{Lookup, LookupSet, Lookups};
use index::{Dispatch, InterestIndex};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

/// Everything that is compiled once and shared by all forks.
#[derive(Debug)]
struct CompiledRules {
    rule_sets: Vec<String>,
    lookups: Lookups,
    index: InterestIndex,
    always_evaluated: Vec<usize>,
    dropped_matchers: usize,
}

/// Analyzer statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerStatistics {
    pub rule_sets: usize,
    pub matchers: usize,
    pub dropped_matchers: usize,
    pub always_evaluated: usize,
    pub hash_keys: usize,
    pub lookups: usize,
    pub sets: usize,
}

#[derive(Debug)]
pub struct UserAgentAnalyzer {
    config: AnalyzerConfig,
    rules: Arc<CompiledRules>,
    matchers: Vec<Matcher>,
    touched: BTreeSet<usize>,
    cache: Arc<Mutex<LruCache<UserAgent>>>,
}

impl UserAgentAnalyzer {
    pub fn builder() -> UserAgentAnalyzerBuilder {
        UserAgentAnalyzerBuilder::new()
    }

    /// Analyze one User-Agent. Never fails; malformed input is reported
    /// through [`UserAgent::has_syntax_error`].
    pub fn parse(&mut self, user_agent: &str) -> UserAgent {
        if let Some(cached) = self.cache_get(user_agent) {
            return cached;
        }
        let result = self.analyze(user_agent);
        self.cache_put(user_agent, &result);
        result
    }

    /// Analyze many User-Agents, in parallel for large enough batches.
    ///
    /// Results are returned in input order.
    pub fn parse_batch<S: AsRef<str> + Sync>(&self, user_agents: &[S]) -> Vec<UserAgent> {
        if user_agents.len() < self.config.parallel.min_batch_size_for_parallelism {
            let mut analyzer = self.fork();
            return user_agents
                .iter()
                .map(|user_agent| analyzer.parse(user_agent.as_ref()))
                .collect();
        }

        user_agents
            .par_iter()
            .map_init(|| self.fork(), |analyzer, user_agent| analyzer.parse(user_agent.as_ref()))
            .collect()
    }

    /// An analyzer sharing the compiled rules and the cache, with its own
    /// matcher state.
    pub fn fork(&self) -> Self {
        Self {
            config: self.config.clone(),
            rules: Arc::clone(&self.rules),
            matchers: self.matchers.clone(),
            touched: BTreeSet::new(),
            cache: Arc::clone(&self.cache),
        }
    }

    /// Every `(path, value)` event the flattener produces for `user_agent`,
    /// including the word ranges the rules asked for.
    pub fn flatten(&self, user_agent: &str) -> Vec<FlattenEvent> {
        let tree = parser::parse(&hacks::fix_it(user_agent));
        let mut recorder = FlattenRecorder::with_ranges(self.rules.index.ranges().clone());
        UserAgentTreeFlattener::flatten(&tree, &mut recorder);
        recorder.into_events()
    }

    fn analyze(&mut self, user_agent: &str) -> UserAgent {
        let mut result = UserAgent::new(user_agent);
        let tree = parser::parse(&hacks::fix_it(user_agent));
        result.set_syntax_error(tree.has_syntax_error());

        let mut dispatch = Dispatch {
            index: &self.rules.index,
            matchers: &mut self.matchers,
            touched: &mut self.touched,
        };
        UserAgentTreeFlattener::flatten(&tree, &mut dispatch);

        let mut candidates = std::mem::take(&mut self.touched);
        candidates.extend(self.rules.always_evaluated.iter().copied());

        for &id in &candidates {
            self.matchers[id].analyze(&tree, &mut result, self.config.verbose);
        }
        for &id in &candidates {
            self.matchers[id].reset();
        }
        result
    }

    fn cache_get(&self, user_agent: &str) -> Option<UserAgent> {
        if !self.config.cache.is_enabled() {
            return None;
        }
        self.cache.lock().ok()?.get(user_agent)
    }

    fn cache_put(&self, user_agent: &str, result: &UserAgent) {
        if !self.config.cache.is_enabled() {
            return;
        }
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(user_agent, result.clone());
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache
            .lock()
            .map(|cache| cache.stats())
            .unwrap_or_default()
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    pub fn get_statistics(&self) -> AnalyzerStatistics {
        AnalyzerStatistics {
            rule_sets: self.rules.rule_sets.len(),
            matchers: self.matchers.len(),
            dropped_matchers: self.rules.dropped_matchers,
            always_evaluated: self.rules.always_evaluated.len(),
            hash_keys: self.rules.index.key_count(),
            lookups: self.rules.lookups.lookup_count(),
            sets: self.rules.lookups.set_count(),
        }
    }

    /// All registered hash keys, sorted.
    pub fn hash_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.rules.index.keys().map(str::to_string).collect();
        keys.sort();
        keys
    }

    pub fn matchers(&self) -> &[Matcher] {
        &self.matchers
    }

    pub fn rule_set_names(&self) -> &[String] {
        &self.rules.rule_sets
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }
}

/// Builder for [`UserAgentAnalyzer`].
///
/// Rule sets are only validated by [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct UserAgentAnalyzerBuilder {
    config: AnalyzerConfig,
    rule_sets: Vec<RuleSet>,
}

impl UserAgentAnalyzerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: AnalyzerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.config.cache.max_size = size;
        self
    }

    pub fn with_wanted_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config = self.config.with_wanted_fields(fields);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn with_rule_set(mut self, rule_set: RuleSet) -> Self {
        self.rule_sets.push(rule_set);
        self
    }

    pub fn build(self) -> Result<UserAgentAnalyzer> {
        let mut names = HashSet::new();
        for rule_set in &self.rule_sets {
            if !names.insert(rule_set.name.as_str()) {
                return Err(UserAgentError::DuplicateRuleSet(rule_set.name.clone()));
            }
            rule_set.check_version()?;
        }

        let mut lookups = Lookups::new();
        for rule_set in &self.rule_sets {
            for (name, entries) in &rule_set.lookups {
                lookups.add_lookup(Lookup::new(
                    name,
                    entries.iter().map(|(key, value)| (key, value.clone())),
                ))?;
            }
            for (name, values) in &rule_set.sets {
                lookups.add_set(LookupSet::new(name, values))?;
            }
        }

        let mut matchers = Vec::new();
        let mut dropped_matchers = 0;
        for rule_set in &self.rule_sets {
            for (position, config) in rule_set.matchers.iter().enumerate() {
                let source = format!("{}#{}", rule_set.name, position + 1);
                match Matcher::new(source, config, &lookups, &self.config) {
                    Ok(matcher) => matchers.push(matcher),
                    Err(error) if error.is_useless_matcher() => {
                        log::debug!("Dropping matcher {}#{}: {}", rule_set.name, position + 1, error);
                        dropped_matchers += 1;
                    }
                    Err(error) => return Err(error),
                }
            }
        }

        let mut index = InterestIndex::default();
        let mut always_evaluated = Vec::new();
        for (id, matcher) in matchers.iter().enumerate() {
            matcher.register_interests(id, &mut index);
            if matcher.is_always_evaluated() {
                always_evaluated.push(id);
            }
        }

        log::debug!(
            "Built analyzer: {} rule sets, {} matchers ({} dropped, {} always evaluated), {} hash keys",
            self.rule_sets.len(),
            matchers.len(),
            dropped_matchers,
            always_evaluated.len(),
            index.key_count()
        );

        let rules = CompiledRules {
            rule_sets: self.rule_sets.iter().map(|rule_set| rule_set.name.clone()).collect(),
            lookups,
            index,
            always_evaluated,
            dropped_matchers,
        };

        Ok(UserAgentAnalyzer {
            cache: Arc::new(Mutex::new(LruCache::new(self.config.cache.max_size))),
            config: self.config,
            rules: Arc::new(rules),
            matchers,
            touched: BTreeSet::new(),
        })
    }
}

//! Configuration of a [`UserAgentAnalyzer`](crate::UserAgentAnalyzer).
//!
//! Rules are not part of the configuration; they are handed to the
//! [`UserAgentAnalyzerBuilder`](crate::UserAgentAnalyzerBuilder) as rule
//! sets. This only controls how the analyzer runs them.

use std::collections::BTreeSet;

/// Result cache configuration.
///
/// # Examples
///
/// ```rust
/// use useragent_engine::CacheConfig;
///
/// // Disable caching, for instance when every input is unique.
/// let disabled = CacheConfig { max_size: 0 };
/// assert!(!disabled.is_enabled());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of cached results. 0 disables the cache.
    ///
    /// **Default**: 10000
    pub max_size: usize,
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.max_size > 0
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_size: 10_000 }
    }
}

/// Configuration for [`parse_batch`](crate::UserAgentAnalyzer::parse_batch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelConfig {
    /// Batches smaller than this are parsed on the calling thread.
    pub min_batch_size_for_parallelism: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            min_batch_size_for_parallelism: 100,
        }
    }
}

/// Analyzer configuration.
///
/// # Examples
///
/// ```rust
/// use useragent_engine::AnalyzerConfig;
///
/// let config = AnalyzerConfig::new()
///     .with_cache_size(500)
///     .with_wanted_fields(["AgentName", "AgentVersion"]);
///
/// assert_eq!(config.cache.max_size, 500);
/// assert!(config.is_wanted("AgentName"));
/// assert!(!config.is_wanted("DeviceClass"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// Result cache configuration
    pub cache: CacheConfig,
    /// Fields to extract; `None` extracts every field the rules produce.
    ///
    /// Matchers that only produce unwanted fields are dropped while the
    /// analyzer is built.
    pub wanted_fields: Option<BTreeSet<String>>,
    /// Evaluate every touched matcher fully and log why matchers fail.
    pub verbose: bool,
    /// Parallel batch parsing configuration
    pub parallel: ParallelConfig,
}

impl AnalyzerConfig {
    /// Create a new analyzer configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for unit tests: no cache, so every parse runs the
    /// matchers.
    pub fn testing() -> Self {
        Self {
            cache: CacheConfig { max_size: 0 },
            parallel: ParallelConfig {
                min_batch_size_for_parallelism: 1,
            },
            ..Default::default()
        }
    }

    /// Configuration for large volumes of repeating inputs.
    pub fn high_throughput() -> Self {
        Self {
            cache: CacheConfig { max_size: 100_000 },
            parallel: ParallelConfig {
                min_batch_size_for_parallelism: 50,
            },
            ..Default::default()
        }
    }

    /// Set the maximum number of cached results.
    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.cache.max_size = size;
        self
    }

    /// Restrict the extracted fields.
    pub fn with_wanted_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wanted_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Enable or disable verbose matcher evaluation.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the minimum batch size for parallel parsing.
    pub fn with_min_batch_size_for_parallelism(mut self, min_size: usize) -> Self {
        self.parallel.min_batch_size_for_parallelism = min_size;
        self
    }

    /// Whether `field` is extracted under this configuration.
    pub fn is_wanted(&self, field: &str) -> bool {
        self.wanted_fields
            .as_ref()
            .map_or(true, |wanted| wanted.contains(field))
    }
}

//! Configuration for the analysis pipeline.
//!
//! Fixed parameters live in constant holders (`StoreConfig`, `NetworkConfig`).
//! Tunables that trade recall against precision or load against latency live
//! in [`ScoretagConfig`], which deserializes from a camelCase JSON file where
//! every field is optional.

use crate::error::{Result, ScoretagError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// SQLite store parameters.
pub struct StoreConfig;

impl StoreConfig {
    pub const BUSY_TIMEOUT_MS: u64 = 30_000;
    pub const LOCAL_DB_FILENAME: &'static str = "local-cache.sqlite";
    pub const SHARED_DB_FILENAME: &'static str = "shared-records.sqlite";
    pub const CANDIDATES_DB_FILENAME: &'static str = "review-candidates.sqlite";
}

/// HTTP adapter parameters.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    pub const USER_AGENT: &'static str = "scoretag/0.3";
}

/// Digest used for content fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoretagConfig {
    pub identity: IdentityConfig,
    pub cache: CacheConfig,
    pub standardizer: StandardizerConfig,
    pub pipeline: PipelineConfig,
}

impl ScoretagConfig {
    /// Load configuration from a JSON file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| ScoretagError::io_with_path(e, path))?;
        let config: ScoretagConfig =
            serde_json::from_str(&contents).map_err(|e| ScoretagError::Json {
                message: format!("Failed to parse {}: {}", path.display(), e),
                source: Some(e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.standardizer.context_acceptance_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ScoretagError::Validation {
                field: "standardizer.contextAcceptanceThreshold".into(),
                message: format!("must be within 0.0..=1.0, got {}", threshold),
            });
        }
        if self.standardizer.min_alias_chars == 0 {
            return Err(ScoretagError::Validation {
                field: "standardizer.minAliasChars".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.standardizer.default_catch_all.trim().is_empty() {
            return Err(ScoretagError::Validation {
                field: "standardizer.defaultCatchAll".into(),
                message: "catch-all term must not be empty".into(),
            });
        }
        if !(1..=PipelineConfig::MAX_CONCURRENCY).contains(&self.pipeline.max_concurrency) {
            return Err(ScoretagError::Validation {
                field: "pipeline.maxConcurrency".into(),
                message: format!(
                    "must be within 1..={}, got {}",
                    PipelineConfig::MAX_CONCURRENCY,
                    self.pipeline.max_concurrency
                ),
            });
        }
        if self.pipeline.classifier_max_attempts == 0 {
            return Err(ScoretagError::Validation {
                field: "pipeline.classifierMaxAttempts".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Fingerprinting behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityConfig {
    /// Skip hashing for throughput; identities fall back to names.
    pub hash_enabled: bool,
    pub algorithm: HashAlgorithm,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            hash_enabled: true,
            algorithm: HashAlgorithm::Blake3,
        }
    }
}

/// Per-tier lookup timeouts for the cache cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    pub local_timeout_ms: u64,
    pub remote_fingerprint_timeout_ms: u64,
    pub remote_name_timeout_ms: u64,
    /// Copy remote hits for fingerprinted assets into the local store.
    pub write_back: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            local_timeout_ms: 2_000,
            remote_fingerprint_timeout_ms: 5_000,
            remote_name_timeout_ms: 5_000,
            write_back: true,
        }
    }
}

impl CacheConfig {
    pub fn local_timeout(&self) -> Duration {
        Duration::from_millis(self.local_timeout_ms)
    }

    pub fn remote_fingerprint_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_fingerprint_timeout_ms)
    }

    pub fn remote_name_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_name_timeout_ms)
    }
}

/// Leniency knobs for label standardization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StandardizerConfig {
    /// Match aliases when either string contains the other.
    pub alias_substring_matching: bool,
    /// Shortest alias (in chars) allowed to take part in substring matching.
    pub min_alias_chars: usize,
    /// Fraction of context tags that must be compatible for a clean match.
    pub context_acceptance_threshold: f64,
    /// Discard matches below the threshold instead of keeping them annotated.
    pub strict_context: bool,
    /// Catch-all term per category when nothing else resolves.
    pub catch_all_terms: BTreeMap<String, String>,
    pub default_catch_all: String,
    pub generation_timeout_ms: u64,
    pub generation_memo_ttl_secs: u64,
    pub generation_memo_capacity: u64,
    /// Longest raw label (in chars) still considered a plausible term.
    pub candidate_max_chars: usize,
    /// Confidence recorded on candidates harvested from unresolved labels.
    pub unresolved_candidate_confidence: f64,
    /// Confidence recorded on candidates proposed by the generator.
    pub generated_candidate_confidence: f64,
}

impl Default for StandardizerConfig {
    fn default() -> Self {
        Self {
            alias_substring_matching: true,
            min_alias_chars: 2,
            context_acceptance_threshold: 0.75,
            strict_context: false,
            catch_all_terms: BTreeMap::new(),
            default_catch_all: "其他".to_string(),
            generation_timeout_ms: 10_000,
            generation_memo_ttl_secs: 3_600,
            generation_memo_capacity: 4_096,
            candidate_max_chars: 24,
            unresolved_candidate_confidence: 0.3,
            generated_candidate_confidence: 0.6,
        }
    }
}

impl StandardizerConfig {
    /// Catch-all term for a category.
    pub fn catch_all_for(&self, category: &str) -> &str {
        self.catch_all_terms
            .get(category)
            .map(String::as_str)
            .unwrap_or(&self.default_catch_all)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }
}

/// Worker pool and classifier call policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub max_concurrency: usize,
    pub classifier_timeout_ms: u64,
    pub classifier_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub commit_timeout_ms: u64,
}

impl PipelineConfig {
    pub const MAX_CONCURRENCY: usize = 64;
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            classifier_timeout_ms: 60_000,
            classifier_max_attempts: 3,
            retry_base_delay_ms: 500,
            commit_timeout_ms: 10_000,
        }
    }
}

impl PipelineConfig {
    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_millis(self.classifier_timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_timeout_ms)
    }
}

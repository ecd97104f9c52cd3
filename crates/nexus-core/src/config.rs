//! Runtime configuration for the core: every tunable this spec names, with
//! defaults matching it exactly, overridable from `NEXUS_`-prefixed
//! environment variables.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;

/// Fixed vector/metadata/fts weight triple for one query-pattern class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternWeights {
    pub vector: f64,
    pub metadata: f64,
    pub fts: f64,
}

impl PatternWeights {
    pub const fn new(vector: f64, metadata: f64, fts: f64) -> Self {
        Self { vector, metadata, fts }
    }
}

/// Hybrid search tuning.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub title_search: PatternWeights,
    pub exact_phrase: PatternWeights,
    pub code_search: PatternWeights,
    pub semantic: PatternWeights,
    pub hybrid: PatternWeights,
    pub default_limit: usize,
    pub default_offset: usize,
    pub default_score_threshold: f64,
    pub vector_top_k: usize,
    pub query_cache_ttl: Duration,
    pub max_rerank: usize,
    pub max_expansions: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            title_search: PatternWeights::new(0.10, 0.80, 0.10),
            exact_phrase: PatternWeights::new(0.20, 0.30, 0.50),
            code_search: PatternWeights::new(0.50, 0.20, 0.30),
            semantic: PatternWeights::new(0.85, 0.10, 0.05),
            hybrid: PatternWeights::new(0.60, 0.30, 0.10),
            default_limit: 20,
            default_offset: 0,
            default_score_threshold: 0.3,
            vector_top_k: 100,
            query_cache_ttl: Duration::from_secs(5 * 60),
            max_rerank: 100,
            max_expansions: 5,
        }
    }
}

/// Ebbinghaus decay and stability-boost tuning.
#[derive(Debug, Clone, Copy)]
pub struct DecayConfig {
    /// `τ`, in hours.
    pub tau_hours: f64,
    pub reinforcement_threshold: f64,
    pub review_ladder_hours: [f64; 8],
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            tau_hours: 168.0,
            reinforcement_threshold: 0.3,
            review_ladder_hours: [1.0, 6.0, 24.0, 72.0, 168.0, 336.0, 720.0, 2160.0],
        }
    }
}

/// Composite relevance-score weights.
#[derive(Debug, Clone, Copy)]
pub struct RelevanceWeights {
    pub vector: f64,
    pub stability: f64,
    pub retrievability: f64,
    pub user_importance: f64,
    pub ai_importance: f64,
    pub graph: f64,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            vector: 0.30,
            stability: 0.15,
            retrievability: 0.20,
            user_importance: 0.20,
            ai_importance: 0.10,
            graph: 0.05,
        }
    }
}

impl RelevanceWeights {
    /// Weights with the vector component redistributed into stability and
    /// retrievability, used when no query vector is supplied.
    pub fn without_vector(&self) -> Self {
        Self {
            vector: 0.0,
            stability: self.stability + 0.15,
            retrievability: self.retrievability + 0.15,
            user_importance: self.user_importance,
            ai_importance: self.ai_importance,
            graph: self.graph,
        }
    }
}

/// Relevance engine tuning.
#[derive(Debug, Clone)]
pub struct RelevanceConfig {
    pub weights: RelevanceWeights,
    pub cache_ttl: Duration,
    pub track_cache_stats: bool,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            weights: RelevanceWeights::default(),
            cache_ttl: Duration::from_secs(5 * 60),
            track_cache_stats: true,
        }
    }
}

/// Ripple recall tuning.
#[derive(Debug, Clone, Copy)]
pub struct RippleConfig {
    pub max_depth: u32,
    pub initial_boost: f64,
    pub decay_per_hop: f64,
    pub min_boost_threshold: f64,
    pub batch_size: usize,
}

impl Default for RippleConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            initial_boost: 0.30,
            decay_per_hop: 0.5,
            min_boost_threshold: 0.05,
            batch_size: 100,
        }
    }
}

/// Write-saga tuning.
#[derive(Debug, Clone, Copy)]
pub struct SagaConfig {
    pub verify_max_retries: u32,
    pub verify_base_delay: Duration,
    pub embedding_dimensions: usize,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            verify_max_retries: 3,
            verify_base_delay: Duration::from_millis(100),
            embedding_dimensions: 384,
        }
    }
}

/// Decay-maintenance batch-job tuning.
#[derive(Debug, Clone, Copy)]
pub struct DecayJobConfig {
    pub interval: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub completed_retention: Duration,
    pub failed_retention: Duration,
    pub batch_size: usize,
}

impl Default for DecayJobConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            max_retries: 2,
            retry_base_delay: Duration::from_secs(60),
            completed_retention: Duration::from_secs(24 * 3600),
            failed_retention: Duration::from_secs(48 * 3600),
            batch_size: 500,
        }
    }
}

/// Memory-triage classification thresholds.
#[derive(Debug, Clone, Copy)]
pub struct TriageConfig {
    pub entity_threshold: f64,
    pub fact_threshold: f64,
    pub min_content_length: usize,
    pub unambiguous_high: f64,
    pub unambiguous_low: f64,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            entity_threshold: 0.4,
            fact_threshold: 0.5,
            min_content_length: 50,
            unambiguous_high: 0.7,
            unambiguous_low: 0.2,
        }
    }
}

/// Top-level configuration, assembled from `Default` or from the process
/// environment via [`Config::from_env`].
#[derive(Debug, Clone)]
pub struct Config {
    pub search: SearchConfig,
    pub decay: DecayConfig,
    pub relevance: RelevanceConfig,
    pub ripple: RippleConfig,
    pub saga: SagaConfig,
    pub decay_job: DecayJobConfig,
    pub triage: TriageConfig,
    pub db_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            decay: DecayConfig::default(),
            relevance: RelevanceConfig::default(),
            ripple: RippleConfig::default(),
            saga: SagaConfig::default(),
            decay_job: DecayJobConfig::default(),
            triage: TriageConfig::default(),
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    ProjectDirs::from("com", "nexus", "core")
        .map(|dirs| dirs.data_dir().join("nexus.db"))
        .unwrap_or_else(|| PathBuf::from("nexus.db"))
}

impl Config {
    /// Overlay environment variables (`NEXUS_DB_PATH`, `NEXUS_DECAY_TAU_HOURS`,
    /// `NEXUS_RIPPLE_MAX_DEPTH`, `NEXUS_SEARCH_DEFAULT_LIMIT`, ...) on top of
    /// the spec defaults. Unset or unparsable variables are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(path) = std::env::var("NEXUS_DB_PATH") {
            cfg.db_path = PathBuf::from(path);
        }
        if let Some(v) = env_f64("NEXUS_DECAY_TAU_HOURS") {
            cfg.decay.tau_hours = v;
        }
        if let Some(v) = env_u32("NEXUS_RIPPLE_MAX_DEPTH") {
            cfg.ripple.max_depth = v;
        }
        if let Some(v) = env_f64("NEXUS_RIPPLE_INITIAL_BOOST") {
            cfg.ripple.initial_boost = v;
        }
        if let Some(v) = env_usize("NEXUS_SEARCH_DEFAULT_LIMIT") {
            cfg.search.default_limit = v;
        }
        if let Some(v) = env_u32("NEXUS_DECAY_JOB_MAX_RETRIES") {
            cfg.decay_job.max_retries = v;
        }

        cfg
    }
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

//! Configuration management for FollowRank
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values
//!
//! Every tuning constant of the ranking pipeline lives here so that runs can
//! be reproduced and compared across tuning experiments.

use crate::errors::{AppError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Ranking pipeline configuration
    #[serde(default)]
    pub ranking: RankingConfig,

    /// Output artifact configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// SQL type of the `user_id` key columns
    #[serde(default)]
    pub id_type: IdColumnType,
}

/// SQL type of the account id columns, used to bind lookups without
/// casting the indexed column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdColumnType {
    #[default]
    Text,
    Bigint,
}

impl IdColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IdColumnType::Text => "text",
            IdColumnType::Bigint => "bigint",
        }
    }
}

/// How edges that reference nodes missing from the attribute table are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingNodePolicy {
    /// Create a zero-attribute node for every unknown endpoint
    #[default]
    AutoCreate,
    /// Fail the run with a data integrity error
    Reject,
}

/// What happens to rank held by nodes without outbound edges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DanglingPolicy {
    /// Dangling nodes propagate nothing; their mass leaves the walk
    #[default]
    Halt,
    /// Dangling mass is returned along the personalization distribution
    Teleport,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RankingConfig {
    /// Power iteration parameters
    #[serde(default)]
    pub solver: SolverConfig,

    /// Personalization heuristic constants
    #[serde(default)]
    pub personalization: PersonalizationConfig,

    /// Percentile table and estimation parameters
    #[serde(default)]
    pub percentiles: PercentileConfig,

    /// Score estimation for nodes outside the stored graph
    #[serde(default)]
    pub external: ExternalEstimateConfig,

    /// Node ids that receive the seed boost
    #[serde(default)]
    pub seed_nodes: Vec<String>,

    /// Handling of edges to unknown nodes
    #[serde(default)]
    pub missing_nodes: MissingNodePolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SolverConfig {
    /// Restart probability toward the personalization vector
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Iteration budget
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// L1 distance between successive iterates that counts as converged
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Dangling node handling
    #[serde(default)]
    pub dangling: DanglingPolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersonalizationConfig {
    /// Total weight shared evenly by the seed nodes
    #[serde(default = "default_seed_weight_total")]
    pub seed_weight_total: f64,

    /// Additive smoothing constant in ln((followers + C) / (following + C))
    #[serde(default = "default_ratio_offset")]
    pub ratio_offset: f64,

    /// Upper clamp of the follower ratio signal
    #[serde(default = "default_ratio_ceiling")]
    pub ratio_ceiling: f64,

    /// Following count above which the follow-spam penalty applies
    #[serde(default = "default_follow_spam_threshold")]
    pub follow_spam_threshold: u64,

    /// Divisor turning a following count into a penalty factor
    #[serde(default = "default_follow_spam_divisor")]
    pub follow_spam_divisor: f64,

    /// Largest penalty factor applied
    #[serde(default = "default_follow_spam_penalty_cap")]
    pub follow_spam_penalty_cap: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PercentileConfig {
    /// Number of equal-population buckets sampled into the anchor table
    #[serde(default = "default_bucket_count")]
    pub bucket_count: usize,

    /// Percentile returned when no usable anchor table exists
    #[serde(default = "default_neutral_percentile")]
    pub neutral_percentile: f64,

    /// Lowest percentile produced by downward extrapolation
    #[serde(default = "default_floor_percentile")]
    pub floor_percentile: f64,

    /// Highest percentile produced by upward extrapolation
    #[serde(default = "default_ceiling_percentile")]
    pub ceiling_percentile: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExternalEstimateConfig {
    /// Share of follower rank assumed to propagate to an unranked node
    #[serde(default = "default_propagation_factor")]
    pub propagation_factor: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Where the anchor table is published
    #[serde(default = "default_anchor_path")]
    pub anchor_path: String,

    /// Rows per insert statement when saving daily metrics
    #[serde(default = "default_insert_chunk_size")]
    pub insert_chunk_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_alpha() -> f64 { 0.15 }
fn default_max_iterations() -> usize { 1000 }
fn default_tolerance() -> f64 { 1e-6 }
fn default_seed_weight_total() -> f64 { 5.0 }
fn default_ratio_offset() -> f64 { 250.0 }
fn default_ratio_ceiling() -> f64 { 5.0 }
fn default_follow_spam_threshold() -> u64 { 3000 }
fn default_follow_spam_divisor() -> f64 { 2000.0 }
fn default_follow_spam_penalty_cap() -> f64 { 10.0 }
fn default_bucket_count() -> usize { 20 }
fn default_neutral_percentile() -> f64 { 50.0 }
fn default_floor_percentile() -> f64 { 1.0 }
fn default_ceiling_percentile() -> f64 { 99.9 }
fn default_propagation_factor() -> f64 { 0.85 }
fn default_anchor_path() -> String { "data/anchors.json".to_string() }
fn default_insert_chunk_size() -> usize { 10_000 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 0 }
fn default_service_name() -> String { "followrank".to_string() }

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            dangling: DanglingPolicy::default(),
        }
    }
}

impl Default for PersonalizationConfig {
    fn default() -> Self {
        Self {
            seed_weight_total: default_seed_weight_total(),
            ratio_offset: default_ratio_offset(),
            ratio_ceiling: default_ratio_ceiling(),
            follow_spam_threshold: default_follow_spam_threshold(),
            follow_spam_divisor: default_follow_spam_divisor(),
            follow_spam_penalty_cap: default_follow_spam_penalty_cap(),
        }
    }
}

impl Default for PercentileConfig {
    fn default() -> Self {
        Self {
            bucket_count: default_bucket_count(),
            neutral_percentile: default_neutral_percentile(),
            floor_percentile: default_floor_percentile(),
            ceiling_percentile: default_ceiling_percentile(),
        }
    }
}

impl Default for ExternalEstimateConfig {
    fn default() -> Self {
        Self {
            propagation_factor: default_propagation_factor(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            anchor_path: default_anchor_path(),
            insert_chunk_size: default_insert_chunk_size(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::InvalidConfiguration {
        message: message.into(),
    }
}

impl SolverConfig {
    /// Reject parameters the power iteration cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(invalid(format!("alpha must lie in [0, 1], got {}", self.alpha)));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(invalid(format!(
                "tolerance must be a positive finite number, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations must be at least 1"));
        }
        Ok(())
    }
}

impl PersonalizationConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.seed_weight_total.is_finite() || self.seed_weight_total <= 0.0 {
            return Err(invalid("seed_weight_total must be positive"));
        }
        if !self.ratio_offset.is_finite() || self.ratio_offset <= 0.0 {
            return Err(invalid("ratio_offset must be positive"));
        }
        if !self.ratio_ceiling.is_finite() || self.ratio_ceiling <= 0.0 {
            return Err(invalid("ratio_ceiling must be positive"));
        }
        if !self.follow_spam_divisor.is_finite() || self.follow_spam_divisor <= 0.0 {
            return Err(invalid("follow_spam_divisor must be positive"));
        }
        if !self.follow_spam_penalty_cap.is_finite() || self.follow_spam_penalty_cap <= 0.0 {
            return Err(invalid("follow_spam_penalty_cap must be positive"));
        }
        Ok(())
    }
}

impl PercentileConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bucket_count == 0 {
            return Err(invalid("bucket_count must be at least 1"));
        }
        let in_range = |p: f64| (0.0..=100.0).contains(&p);
        if !in_range(self.neutral_percentile)
            || !in_range(self.floor_percentile)
            || !in_range(self.ceiling_percentile)
        {
            return Err(invalid("percentile bounds must lie in [0, 100]"));
        }
        if self.floor_percentile >= self.ceiling_percentile {
            return Err(invalid("floor_percentile must be below ceiling_percentile"));
        }
        Ok(())
    }
}

impl RankingConfig {
    /// Validate every section of the ranking configuration
    pub fn validate(&self) -> Result<()> {
        self.solver.validate()?;
        self.personalization.validate()?;
        self.percentiles.validate()?;
        if !self.external.propagation_factor.is_finite() || self.external.propagation_factor < 0.0
        {
            return Err(invalid("propagation_factor must be a non-negative finite number"));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__RANKING__SOLVER__ALPHA=0.2
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgres://localhost/followrank".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                id_type: IdColumnType::default(),
            },
            ranking: RankingConfig::default(),
            output: OutputConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

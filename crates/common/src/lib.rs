//! FollowRank Common Library
//!
//! Shared code for the FollowRank ranking job and its tooling:
//! - Error types and classification
//! - Configuration management
//! - Database connection handling
//! - Metrics and tracing setup

pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::DbPool;
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Error types for FollowRank
//!
//! Provides a single error enum for the ranking pipeline with:
//! - Distinct variants for each failure mode of a ranking run
//! - Machine-readable error codes
//! - Fatal vs. recoverable classification

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input data errors (1xxx)
    DataIntegrity,
    EmptyGraph,

    // Numerical errors (2xxx)
    NumericalDivergence,
    DegenerateDistribution,

    // Estimation errors (3xxx)
    EstimationUnavailable,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    InvalidConfiguration,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::DataIntegrity => 1001,
            ErrorCode::EmptyGraph => 1002,

            ErrorCode::NumericalDivergence => 2001,
            ErrorCode::DegenerateDistribution => 2002,

            ErrorCode::EstimationUnavailable => 3001,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::InvalidConfiguration => 9003,
            ErrorCode::SerializationError => 9004,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Input data errors
    #[error("Edge {source_id} -> {target_id} references unknown node {missing}")]
    DataIntegrity {
        source_id: String,
        target_id: String,
        missing: String,
    },

    #[error("Graph has no nodes to rank")]
    EmptyGraph,

    // Numerical errors
    #[error("Non-finite score at node index {node} after iteration {iteration}")]
    NumericalDivergence { iteration: usize, node: usize },

    #[error("Degenerate {what} distribution: all {len} values equal {value}")]
    DegenerateDistribution {
        what: &'static str,
        len: usize,
        value: f64,
    },

    // Estimation errors
    #[error("Percentile estimation unavailable: {reason}")]
    EstimationUnavailable { reason: String },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::DataIntegrity { .. } => ErrorCode::DataIntegrity,
            AppError::EmptyGraph => ErrorCode::EmptyGraph,
            AppError::NumericalDivergence { .. } => ErrorCode::NumericalDivergence,
            AppError::DegenerateDistribution { .. } => ErrorCode::DegenerateDistribution,
            AppError::EstimationUnavailable { .. } => ErrorCode::EstimationUnavailable,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration(_) => ErrorCode::ConfigurationError,
            AppError::InvalidConfiguration { .. } => ErrorCode::InvalidConfiguration,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Check if this error is recovered locally with a fallback value.
    ///
    /// Recoverable errors never abort a ranking run; callers log them and
    /// continue with a conservative default.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::DegenerateDistribution { .. } | AppError::EstimationUnavailable { .. }
        )
    }

    /// Check if this error must abort the whole ranking run
    pub fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::DataIntegrity {
            source_id: "a".into(),
            target_id: "b".into(),
            missing: "b".into(),
        };
        assert_eq!(err.code(), ErrorCode::DataIntegrity);
        assert_eq!(err.code().as_code(), 1001);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_recoverable_errors() {
        let err = AppError::EstimationUnavailable {
            reason: "empty anchor table".into(),
        };
        assert!(err.is_recoverable());

        let err = AppError::DegenerateDistribution {
            what: "personalization",
            len: 4,
            value: 0.0,
        };
        assert!(err.is_recoverable());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_divergence_is_fatal() {
        let err = AppError::NumericalDivergence {
            iteration: 3,
            node: 7,
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("node index 7"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "anchors.json");
        let err: AppError = io.into();
        assert_eq!(err.code(), ErrorCode::InternalError);
    }
}

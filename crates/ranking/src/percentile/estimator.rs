//! Approximate percentile lookup from an anchor table
//!
//! Piecewise-linear between anchors, proportional extrapolation outside
//! them, clamped to `[floor, ceiling]`.

use super::{Anchor, AnchorTable};
use followrank_common::config::PercentileConfig;
use followrank_common::errors::{AppError, Result};
use followrank_common::metrics;
use tracing::warn;

/// Interpolates percentiles for scores outside the ranked population
#[derive(Debug, Clone)]
pub struct PercentileEstimator {
    floor: f64,
    ceiling: f64,
    neutral: f64,
}

impl Default for PercentileEstimator {
    fn default() -> Self {
        Self::from_bounds(&PercentileConfig::default())
    }
}

impl PercentileEstimator {
    /// Build an estimator, rejecting bounds that are out of range,
    /// not finite, or inverted
    pub fn new(config: &PercentileConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_bounds(config))
    }

    fn from_bounds(config: &PercentileConfig) -> Self {
        Self {
            floor: config.floor_percentile,
            ceiling: config.ceiling_percentile,
            neutral: config.neutral_percentile,
        }
    }

    /// Percentile returned in degraded mode
    pub fn neutral(&self) -> f64 {
        self.neutral
    }

    /// Estimate against a raw anchor list, validating it first
    pub fn try_estimate(&self, score: f64, anchors: &[Anchor]) -> Result<f64> {
        AnchorTable::validate(anchors)?;
        self.checked(score, anchors)
    }

    /// Estimate against a validated table, falling back to the neutral
    /// percentile when no table is available or the score is not finite
    pub fn estimate(&self, score: f64, table: Option<&AnchorTable>) -> f64 {
        let result = match table {
            Some(table) => self.checked(score, table.anchors()),
            None => Err(AppError::EstimationUnavailable {
                reason: "no anchor table published".to_string(),
            }),
        };
        self.or_neutral(result)
    }

    /// Estimate against a raw anchor list, falling back to the neutral
    /// percentile when the list is missing or malformed
    pub fn estimate_raw(&self, score: f64, anchors: Option<&[Anchor]>) -> f64 {
        let result = match anchors {
            Some(anchors) => self.try_estimate(score, anchors),
            None => Err(AppError::EstimationUnavailable {
                reason: "no anchor table published".to_string(),
            }),
        };
        self.or_neutral(result)
    }

    fn or_neutral(&self, result: Result<f64>) -> f64 {
        match result {
            Ok(percentile) => percentile,
            Err(err) => {
                warn!(error = %err, neutral = self.neutral, "Percentile estimate degraded");
                metrics::record_estimation_fallback(reason_label(&err));
                self.neutral
            }
        }
    }

    fn checked(&self, score: f64, anchors: &[Anchor]) -> Result<f64> {
        if !score.is_finite() {
            return Err(AppError::EstimationUnavailable {
                reason: format!("score {} is not finite", score),
            });
        }
        Ok(self.interpolate(score, anchors))
    }

    /// `anchors` must satisfy the table invariants
    fn interpolate(&self, score: f64, anchors: &[Anchor]) -> f64 {
        let first = anchors[0];
        let last = anchors[anchors.len() - 1];

        let percentile = if score <= first.score {
            if first.score > 0.0 {
                score / first.score * first.percentile
            } else {
                first.percentile
            }
        } else if score >= last.score {
            if last.score > 0.0 {
                last.percentile + (score / last.score - 1.0) * (100.0 - last.percentile)
            } else {
                last.percentile
            }
        } else {
            // first.score < score < last.score, so 1 <= upper <= len - 1
            let upper = anchors.partition_point(|a| a.score <= score);
            let lo = anchors[upper - 1];
            let hi = anchors[upper];
            lo.percentile
                + (score - lo.score) / (hi.score - lo.score) * (hi.percentile - lo.percentile)
        };

        percentile.clamp(self.floor, self.ceiling)
    }
}

fn reason_label(err: &AppError) -> &'static str {
    match err {
        AppError::EstimationUnavailable { reason } if reason.starts_with("no anchor") => "missing",
        AppError::EstimationUnavailable { reason } if reason.starts_with("score") => "bad_score",
        _ => "malformed",
    }
}

//! Score estimation for accounts outside the ranked graph
//!
//! An account that was not part of the last run has no score of its own,
//! but its followers do. One propagation step from their latest scores gives
//! a first estimate, which is then placed on the published anchor table.

use crate::percentile::{AnchorStore, AnchorTable, PercentileEstimator};
use crate::store::RankingStore;
use followrank_common::config::{ExternalEstimateConfig, PercentileConfig};
use followrank_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Latest stored metrics of one follower
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowerMetric {
    pub node_id: String,
    pub score: f64,
    pub outbound_edges: u64,
}

/// Estimated standing of an external account
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExternalScoreEstimate {
    pub score: f64,
    pub percentile: f64,

    /// Followers whose metrics entered the sum
    pub contributing_followers: usize,
}

#[derive(Debug, Clone)]
pub struct ExternalScoreEstimator {
    propagation: f64,
    percentiles: PercentileEstimator,
}

impl Default for ExternalScoreEstimator {
    fn default() -> Self {
        Self {
            propagation: ExternalEstimateConfig::default().propagation_factor,
            percentiles: PercentileEstimator::default(),
        }
    }
}

impl ExternalScoreEstimator {
    pub fn new(external: &ExternalEstimateConfig, percentiles: &PercentileConfig) -> Result<Self> {
        let propagation = external.propagation_factor;
        if !propagation.is_finite() || propagation < 0.0 {
            return Err(AppError::InvalidConfiguration {
                message: format!(
                    "propagation_factor must be a non-negative finite number, got {}",
                    propagation
                ),
            });
        }

        Ok(Self {
            propagation,
            percentiles: PercentileEstimator::new(percentiles)?,
        })
    }

    /// `propagation · Σ score / (outbound + 1)` over followers that follow
    /// at least one account. Each follower counts once and non-finite
    /// scores are skipped.
    pub fn propagated_score(&self, followers: &[FollowerMetric]) -> (f64, usize) {
        let mut seen = HashSet::with_capacity(followers.len());
        let mut sum = 0.0;
        let mut contributing = 0;

        for follower in followers {
            if follower.outbound_edges == 0 || !follower.score.is_finite() {
                continue;
            }
            if !seen.insert(follower.node_id.as_str()) {
                continue;
            }
            sum += follower.score / (follower.outbound_edges as f64 + 1.0);
            contributing += 1;
        }

        (self.propagation * sum, contributing)
    }

    /// Estimate score and percentile against a given anchor table
    pub fn estimate(
        &self,
        followers: &[FollowerMetric],
        anchors: Option<&AnchorTable>,
    ) -> ExternalScoreEstimate {
        let (score, contributing_followers) = self.propagated_score(followers);
        let percentile = self.percentiles.estimate(score, anchors);

        debug!(score, percentile, contributing_followers, "External score estimated");

        ExternalScoreEstimate {
            score,
            percentile,
            contributing_followers,
        }
    }

    /// Estimate against whatever table is currently published
    pub fn estimate_published(
        &self,
        followers: &[FollowerMetric],
        store: &AnchorStore,
    ) -> ExternalScoreEstimate {
        let table = store.current();
        self.estimate(followers, table.as_deref())
    }

    /// Fetch the followers' latest metrics and estimate from them
    #[instrument(skip_all, fields(followers = follower_ids.len()))]
    pub async fn estimate_from_store<S>(
        &self,
        store: &S,
        follower_ids: &[String],
        anchors: &AnchorStore,
    ) -> Result<ExternalScoreEstimate>
    where
        S: RankingStore + ?Sized,
    {
        let metrics = store.load_follower_metrics(follower_ids).await?;
        Ok(self.estimate_published(&metrics, anchors))
    }
}

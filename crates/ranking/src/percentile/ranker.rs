//! Exact percentiles and anchor sampling for one score vector

use super::{Anchor, AnchorTable};
use followrank_common::config::PercentileConfig;
use followrank_common::errors::{AppError, Result};
use followrank_common::metrics;
use tracing::{debug, warn};

/// Per-node percentiles and the anchor table sampled from the same run
#[derive(Debug, Clone, PartialEq)]
pub struct PercentileRanking {
    /// Percentile of each node, aligned to the score vector
    pub percentiles: Vec<f64>,

    /// Compact sample for later approximate lookups
    pub anchors: AnchorTable,
}

/// Converts a score vector into percentiles
#[derive(Debug, Clone)]
pub struct PercentileRanker {
    bucket_count: usize,
}

impl PercentileRanker {
    pub fn new(config: &PercentileConfig) -> Self {
        Self {
            bucket_count: config.bucket_count.max(1),
        }
    }

    /// Rank every score against the full distribution.
    ///
    /// A score's percentile is the share of scores strictly below it, so ties
    /// share a percentile and the minimum sits at 0. The anchor table holds
    /// the first score of each equal-population bucket with the bucket's
    /// nominal percentile, plus the maximum as an upper boundary.
    pub fn rank(&self, scores: &[f64]) -> Result<PercentileRanking> {
        let n = scores.len();
        if n == 0 {
            return Err(AppError::EmptyGraph);
        }
        if let Some(node) = scores.iter().position(|s| !s.is_finite()) {
            return Err(AppError::NumericalDivergence { iteration: 0, node });
        }

        let mut sorted = scores.to_vec();
        sorted.sort_by(f64::total_cmp);

        let rank_of = |score: f64| -> f64 {
            let position = sorted.partition_point(|&s| s < score);
            position as f64 * 100.0 / n as f64
        };

        let percentiles: Vec<f64> = scores.iter().map(|&s| rank_of(s)).collect();

        let min = sorted[0];
        let max = sorted[n - 1];
        if min == max {
            let err = AppError::DegenerateDistribution {
                what: "score",
                len: n,
                value: min,
            };
            warn!(error = %err, "All nodes share one score, anchor table has a single point");
            metrics::record_degenerate("score");
        }

        let b = self.bucket_count;
        let mut anchors: Vec<Anchor> = Vec::with_capacity(b + 1);
        for bucket in 0..b {
            let start = bucket * n / b;
            let score = sorted[start];
            let percentile = bucket as f64 * 100.0 / b as f64;
            if anchors.last().map_or(true, |a| score > a.score) {
                anchors.push(Anchor::new(score, percentile));
            }
        }

        if let Some(last) = anchors.last().copied() {
            if max > last.score {
                anchors.push(Anchor::new(max, rank_of(max).max(last.percentile)));
            }
        }

        debug!(
            nodes = n,
            buckets = b,
            anchors = anchors.len(),
            min,
            max,
            "Percentile anchors sampled"
        );

        Ok(PercentileRanking {
            percentiles,
            anchors: AnchorTable::new(anchors)?,
        })
    }
}

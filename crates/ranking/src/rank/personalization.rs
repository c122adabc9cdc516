//! Personalization (restart) vector construction
//!
//! Seeds share a fixed boost; every other node is weighted by how many
//! followers it has relative to how many accounts it follows, with
//! indiscriminate followers damped. The result is min-max scaled to [0, 1].

use crate::graph::{FollowGraph, NodeAttributes};
use followrank_common::config::PersonalizationConfig;
use followrank_common::errors::AppError;
use followrank_common::metrics;
use tracing::{debug, warn};

/// Restart distribution aligned to the graph's node order
#[derive(Debug, Clone, PartialEq)]
pub struct PersonalizationVector {
    values: Vec<f64>,
    degenerate: bool,
}

impl PersonalizationVector {
    /// Wrap raw values without normalization
    pub fn from_values(values: Vec<f64>) -> Self {
        Self {
            values,
            degenerate: false,
        }
    }

    /// Values in node order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when min-max scaling failed and the uniform fallback was used
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }
}

/// Follower-ratio signal for a non-seed node, before normalization.
///
/// `clamp(ln((followers + C) / (following + C)), 0, U)`, then divided by
/// `min(following / T2, cap)` once following exceeds the spam threshold.
pub fn heuristic_weight(attrs: &NodeAttributes, config: &PersonalizationConfig) -> f64 {
    let followers = attrs.follower_count as f64;
    let following = attrs.following_count as f64;

    let ratio = ((followers + config.ratio_offset) / (following + config.ratio_offset)).ln();
    let mut weight = ratio.clamp(0.0, config.ratio_ceiling);

    if attrs.following_count > config.follow_spam_threshold {
        let penalty = (following / config.follow_spam_divisor).min(config.follow_spam_penalty_cap);
        weight /= penalty;
    }

    weight
}

/// Build the personalization vector for a graph.
///
/// Seed ids not present in the graph are ignored with a warning. When no
/// seed resolves, every node is weighted by the heuristic alone.
pub fn build(
    graph: &FollowGraph,
    seed_nodes: &[String],
    config: &PersonalizationConfig,
) -> PersonalizationVector {
    let n = graph.node_count();
    if n == 0 {
        return PersonalizationVector::from_values(Vec::new());
    }

    let mut is_seed = vec![false; n];
    let mut seed_count = 0usize;
    for id in seed_nodes {
        match graph.index_of(id) {
            Some(idx) if !is_seed[idx] => {
                is_seed[idx] = true;
                seed_count += 1;
            }
            Some(_) => {}
            None => warn!(seed = %id, "Seed node not in graph, ignoring"),
        }
    }

    let seed_weight = if seed_count > 0 {
        config.seed_weight_total / seed_count as f64
    } else {
        0.0
    };

    let values: Vec<f64> = graph
        .nodes()
        .map(|(idx, _, attrs)| {
            if is_seed[idx] {
                seed_weight
            } else {
                heuristic_weight(attrs, config)
            }
        })
        .collect();

    debug!(nodes = n, seeds = seed_count, "Personalization weights computed");

    normalize(values)
}

/// Min-max scale into [0, 1], falling back to uniform `1/N` on zero range
fn normalize(mut values: Vec<f64>) -> PersonalizationVector {
    let n = values.len();
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    let range = max - min;
    if !(range > 0.0) || !range.is_finite() {
        let err = AppError::DegenerateDistribution {
            what: "personalization",
            len: n,
            value: min,
        };
        warn!(error = %err, "Falling back to uniform personalization");
        metrics::record_degenerate("personalization");

        return PersonalizationVector {
            values: vec![1.0 / n as f64; n],
            degenerate: true,
        };
    }

    for v in &mut values {
        *v = (*v - min) / range;
    }

    PersonalizationVector {
        values,
        degenerate: false,
    }
}

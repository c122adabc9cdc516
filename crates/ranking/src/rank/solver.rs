//! Damped power iteration
//!
//! Iterates `s = (1 - alpha) · M · s + alpha · p` from a uniform start until
//! the L1 change between iterates drops below the tolerance or the budget
//! runs out, then removes one step of personalization mass:
//! `score = s - alpha · p`.
//!
//! The subtraction is a deliberate bias correction and is not classical
//! PageRank. Stored percentile tables are calibrated against this exact
//! output, so scores may be negative and the vector does not sum to one.

use super::PersonalizationVector;
use crate::graph::FollowGraph;
use followrank_common::config::{DanglingPolicy, SolverConfig};
use followrank_common::errors::{AppError, Result};
use followrank_common::metrics;
use tracing::{info, instrument, trace, warn};

/// Result of one solve
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    /// Final scores after the personalization mass is removed
    pub scores: Vec<f64>,

    /// Steady-state iterate before the subtraction
    pub raw_scores: Vec<f64>,

    /// Iterations performed
    pub iterations: usize,

    /// L1 delta of the last iteration
    pub residual: f64,

    /// Whether the residual fell below the tolerance within budget
    pub converged: bool,
}

/// Power-iteration solver
#[derive(Debug, Clone)]
pub struct RankSolver {
    config: SolverConfig,
}

impl RankSolver {
    /// Create a new solver
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Compute scores for every node of `graph`.
    ///
    /// Running out of iterations is not an error: the latest iterate is
    /// returned with `converged = false`. A non-finite value aborts with
    /// [`AppError::NumericalDivergence`].
    #[instrument(skip_all, fields(nodes = graph.node_count(), edges = graph.edge_count()))]
    pub fn solve(
        &self,
        graph: &FollowGraph,
        personalization: &PersonalizationVector,
    ) -> Result<SolveOutcome> {
        self.config.validate()?;

        let n = graph.node_count();
        let p = personalization.values();
        if p.len() != n {
            return Err(AppError::InvalidConfiguration {
                message: format!(
                    "personalization has {} entries for {} nodes",
                    p.len(),
                    n
                ),
            });
        }

        if n == 0 {
            return Ok(SolveOutcome {
                scores: Vec::new(),
                raw_scores: Vec::new(),
                iterations: 0,
                residual: 0.0,
                converged: true,
            });
        }

        if let Some(node) = p.iter().position(|v| !v.is_finite()) {
            return Err(AppError::NumericalDivergence { iteration: 0, node });
        }

        let alpha = self.config.alpha;
        let follow = 1.0 - alpha;
        let matrix = graph.transition_matrix();
        let restart = match self.config.dangling {
            DanglingPolicy::Halt => None,
            DanglingPolicy::Teleport => Some(restart_distribution(p)),
        };

        let mut scores = vec![1.0 / n as f64; n];
        let mut next = vec![0.0; n];
        let mut iterations = 0;
        let mut residual = f64::INFINITY;
        let mut converged = false;

        for iteration in 1..=self.config.max_iterations {
            matrix.multiply(&scores, &mut next);
            let leaked = match restart {
                Some(_) => matrix.dangling_mass(&scores),
                None => 0.0,
            };

            let mut delta = 0.0;
            for i in 0..n {
                let mut value = follow * next[i] + alpha * p[i];
                if let Some(ref r) = restart {
                    value += follow * leaked * r[i];
                }
                if !value.is_finite() {
                    return Err(AppError::NumericalDivergence { iteration, node: i });
                }
                delta += (value - scores[i]).abs();
                next[i] = value;
            }

            std::mem::swap(&mut scores, &mut next);
            iterations = iteration;
            residual = delta;
            trace!(iteration, delta, "Power iteration step");

            if delta < self.config.tolerance {
                converged = true;
                break;
            }
        }

        if converged {
            info!(iterations, residual, "Rank converged");
        } else {
            warn!(
                iterations,
                residual,
                tolerance = self.config.tolerance,
                "Iteration budget exhausted before convergence, using latest iterate"
            );
        }
        metrics::record_solve(iterations, residual, converged);

        let raw_scores = scores.clone();
        for (score, &weight) in scores.iter_mut().zip(p) {
            *score -= alpha * weight;
        }

        Ok(SolveOutcome {
            scores,
            raw_scores,
            iterations,
            residual,
            converged,
        })
    }
}

/// Personalization rescaled to sum to one, uniform if it sums to zero
fn restart_distribution(p: &[f64]) -> Vec<f64> {
    let total: f64 = p.iter().sum();
    if total > 0.0 {
        p.iter().map(|v| v / total).collect()
    } else {
        vec![1.0 / p.len() as f64; p.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeRecord, NodeRecord};
    use crate::rank::personalization;
    use followrank_common::config::{MissingNodePolicy, PersonalizationConfig};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn cycle() -> FollowGraph {
        FollowGraph::load(
            ["a", "b", "c", "d"].into_iter().map(NodeRecord::bare),
            [("a", "b"), ("b", "c"), ("c", "d"), ("d", "a")]
                .into_iter()
                .map(|(s, t)| EdgeRecord::new(s, t)),
            MissingNodePolicy::Reject,
        )
        .unwrap()
    }

    fn random_graph(seed: u64, n: usize, m: usize) -> FollowGraph {
        let mut rng = StdRng::seed_from_u64(seed);
        let nodes: Vec<NodeRecord> = (0..n)
            .map(|i| {
                NodeRecord::with_counts(
                    i.to_string(),
                    rng.gen_range(0..100_000),
                    rng.gen_range(0..10_000),
                )
            })
            .collect();
        let edges: Vec<EdgeRecord> = (0..m)
            .map(|_| {
                EdgeRecord::new(
                    rng.gen_range(0..n).to_string(),
                    rng.gen_range(0..n).to_string(),
                )
            })
            .collect();
        FollowGraph::load(nodes, edges, MissingNodePolicy::Reject).unwrap()
    }

    fn solve_default(graph: &FollowGraph, seeds: &[String]) -> SolveOutcome {
        let p = personalization::build(graph, seeds, &PersonalizationConfig::default());
        RankSolver::new(SolverConfig::default()).solve(graph, &p).unwrap()
    }

    #[test]
    fn test_cycle_converges_to_equal_scores() {
        let graph = cycle();
        let outcome = solve_default(&graph, &[]);

        assert!(outcome.converged);
        assert_eq!(outcome.scores.len(), 4);
        let first = outcome.scores[0];
        for &s in &outcome.scores {
            assert!((s - first).abs() < SolverConfig::default().tolerance);
        }
    }

    #[test]
    fn test_seed_raises_raw_score() {
        let graph = cycle();
        let unseeded = solve_default(&graph, &[]);
        let seeded = solve_default(&graph, &["a".to_string()]);

        assert!(seeded.raw_scores[0] > unseeded.raw_scores[0]);
        // Rank flows along the cycle away from the seed
        assert!(seeded.raw_scores[1] > seeded.raw_scores[2]);
        assert!(seeded.raw_scores[2] > seeded.raw_scores[3]);
    }

    #[test]
    fn test_debias_subtracts_personalization_once() {
        let graph = random_graph(7, 40, 160);
        let p = personalization::build(&graph, &[], &PersonalizationConfig::default());
        let config = SolverConfig::default();
        let outcome = RankSolver::new(config.clone()).solve(&graph, &p).unwrap();

        for i in 0..graph.node_count() {
            let expected = outcome.raw_scores[i] - config.alpha * p.values()[i];
            assert_eq!(outcome.scores[i], expected);
        }
    }

    #[test]
    fn test_unfollowed_node_keeps_only_propagated_mass() {
        // b has the maximum personalization but no followers: everything it
        // holds at steady state is injected restart mass, which is removed.
        let graph = FollowGraph::load(
            vec![
                NodeRecord::with_counts("a", 0, 0),
                NodeRecord::with_counts("b", 5_000_000, 0),
            ],
            vec![EdgeRecord::new("b", "a")],
            MissingNodePolicy::Reject,
        )
        .unwrap();
        let p = personalization::build(&graph, &[], &PersonalizationConfig::default());
        let outcome = RankSolver::new(SolverConfig::default()).solve(&graph, &p).unwrap();

        assert_eq!(p.values(), &[0.0, 1.0]);
        assert!((outcome.raw_scores[1] - 0.15).abs() < 1e-12);
        assert!(outcome.scores[1].abs() < 1e-12);
        // a receives (1 - alpha) of b's rank
        assert!((outcome.scores[0] - 0.85 * 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_budget_exhaustion_is_not_an_error() {
        let graph = random_graph(11, 30, 90);
        let p = personalization::build(&graph, &[], &PersonalizationConfig::default());
        let config = SolverConfig {
            max_iterations: 2,
            tolerance: 1e-15,
            ..SolverConfig::default()
        };
        let outcome = RankSolver::new(config).solve(&graph, &p).unwrap();

        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.scores.len(), 30);
    }

    #[test]
    fn test_random_graphs_produce_finite_scores() {
        for seed in 0..20 {
            let graph = random_graph(seed, 50, 200);
            let outcome = solve_default(&graph, &[]);
            assert_eq!(outcome.scores.len(), graph.node_count());
            assert!(outcome.scores.iter().all(|s| s.is_finite()));
            assert!(outcome.raw_scores.iter().all(|s| s.is_finite() && *s >= 0.0));
        }
    }

    #[test]
    fn test_solve_is_deterministic() {
        let graph = random_graph(3, 60, 300);
        let seeds = vec!["5".to_string(), "17".to_string()];
        let first = solve_default(&graph, &seeds);
        let second = solve_default(&graph, &seeds);
        assert_eq!(first, second);
    }

    #[test]
    fn test_teleport_policy_keeps_dangling_mass() {
        // a -> b, b dangling: with teleport the walk never loses mass
        let graph = FollowGraph::load(
            vec![NodeRecord::bare("a"), NodeRecord::bare("b")],
            vec![EdgeRecord::new("a", "b")],
            MissingNodePolicy::Reject,
        )
        .unwrap();
        let p = PersonalizationVector::from_values(vec![0.5, 0.5]);

        let halt = RankSolver::new(SolverConfig::default()).solve(&graph, &p).unwrap();
        let teleport = RankSolver::new(SolverConfig {
            dangling: DanglingPolicy::Teleport,
            ..SolverConfig::default()
        })
        .solve(&graph, &p)
        .unwrap();

        let halt_total: f64 = halt.raw_scores.iter().sum();
        let teleport_total: f64 = teleport.raw_scores.iter().sum();
        assert!(teleport_total > halt_total);
        assert!((teleport_total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_non_finite_personalization_is_divergence() {
        let graph = cycle();
        let p = PersonalizationVector::from_values(vec![0.0, f64::NAN, 0.0, 0.0]);
        let err = RankSolver::new(SolverConfig::default()).solve(&graph, &p).unwrap_err();
        assert!(matches!(err, AppError::NumericalDivergence { node: 1, .. }));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let graph = cycle();
        let p = PersonalizationVector::from_values(vec![1.0, 0.0]);
        let err = RankSolver::new(SolverConfig::default()).solve(&graph, &p).unwrap_err();
        assert!(matches!(err, AppError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_empty_graph() {
        let graph = FollowGraph::default();
        let outcome = solve_default(&graph, &[]);
        assert!(outcome.scores.is_empty());
        assert!(outcome.converged);
    }
}

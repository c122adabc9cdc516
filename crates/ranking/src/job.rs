//! End-to-end ranking run
//!
//! Graph load, personalization, solve, and percentile ranking for one day.
//! Nothing is written until every stage has succeeded, so a failed run
//! leaves the previous day's outputs untouched.

use crate::graph::{EdgeRecord, FollowGraph, NodeRecord};
use crate::percentile::{AnchorTable, PercentileRanker};
use crate::rank::{personalization, RankSolver};
use crate::store::{DailyMetric, RankingStore};
use chrono::NaiveDate;
use followrank_common::config::RankingConfig;
use followrank_common::errors::{AppError, Result};
use followrank_common::metrics;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span};
use uuid::Uuid;

/// Outputs of one completed run
#[derive(Debug, Clone)]
pub struct RankingRun {
    pub run_id: Uuid,
    pub date: NaiveDate,

    /// One row per node, in graph order
    pub records: Vec<DailyMetric>,
    pub anchors: AnchorTable,

    pub nodes: usize,
    pub edges: usize,
    pub auto_created_nodes: usize,
    pub iterations: usize,
    pub residual: f64,
    pub converged: bool,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct RankingJob {
    config: RankingConfig,
}

impl RankingJob {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Rank the given graph rows for `date`
    pub fn run<N, E>(&self, nodes: N, edges: E, date: NaiveDate) -> Result<RankingRun>
    where
        N: IntoIterator<Item = NodeRecord>,
        E: IntoIterator<Item = EdgeRecord>,
    {
        let run_id = Uuid::new_v4();
        let span = info_span!("ranking_run", %run_id, %date);
        let _enter = span.enter();

        let started = Instant::now();
        let result = self.execute(run_id, nodes, edges, date, started);
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(run) => {
                metrics::record_run(elapsed, run.nodes, run.edges, true);
                info!(
                    nodes = run.nodes,
                    edges = run.edges,
                    iterations = run.iterations,
                    residual = run.residual,
                    converged = run.converged,
                    anchors = run.anchors.len(),
                    duration_ms = run.duration.as_millis() as u64,
                    "Ranking run completed"
                );
            }
            Err(e) => {
                metrics::record_run(elapsed, 0, 0, false);
                error!(error = %e, code = e.code().as_code(), "Ranking run failed");
            }
        }

        result
    }

    fn execute<N, E>(
        &self,
        run_id: Uuid,
        nodes: N,
        edges: E,
        date: NaiveDate,
        started: Instant,
    ) -> Result<RankingRun>
    where
        N: IntoIterator<Item = NodeRecord>,
        E: IntoIterator<Item = EdgeRecord>,
    {
        self.config.validate()?;

        let graph = FollowGraph::load(nodes, edges, self.config.missing_nodes)?;
        if graph.is_empty() {
            return Err(AppError::EmptyGraph);
        }

        let p = personalization::build(
            &graph,
            &self.config.seed_nodes,
            &self.config.personalization,
        );
        let outcome = RankSolver::new(self.config.solver.clone()).solve(&graph, &p)?;
        let ranking = PercentileRanker::new(&self.config.percentiles).rank(&outcome.scores)?;

        let records = graph
            .nodes()
            .map(|(idx, id, attrs)| DailyMetric {
                node_id: id.to_string(),
                date,
                score: outcome.scores[idx],
                percentile: ranking.percentiles[idx],
                follower_count: attrs.follower_count,
                following_count: attrs.following_count,
                inbound_edges: graph.in_degree(idx) as u64,
                outbound_edges: graph.out_degree(idx) as u64,
            })
            .collect();

        Ok(RankingRun {
            run_id,
            date,
            records,
            anchors: ranking.anchors,
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            auto_created_nodes: graph.auto_created_count(),
            iterations: outcome.iterations,
            residual: outcome.residual,
            converged: outcome.converged,
            duration: started.elapsed(),
        })
    }

    /// Load the graph from `store`, rank it on the blocking pool, then
    /// persist the outputs.
    ///
    /// The anchor table is written to `anchor_path` before the daily metrics
    /// are committed, so a failed anchor write leaves the stored metrics
    /// untouched.
    pub async fn run_from_store<S>(
        &self,
        store: &S,
        date: NaiveDate,
        anchor_path: &Path,
    ) -> Result<RankingRun>
    where
        S: RankingStore + ?Sized,
    {
        let nodes = store.load_nodes().await?;
        let edges = store.load_edges().await?;

        let job = self.clone();
        let run = tokio::task::spawn_blocking(move || job.run(nodes, edges, date))
            .await
            .map_err(|e| AppError::Internal {
                message: format!("Ranking task failed: {}", e),
            })??;

        run.anchors.save(anchor_path)?;
        info!(
            run_id = %run.run_id,
            path = %anchor_path.display(),
            anchors = run.anchors.len(),
            "Anchor table written"
        );

        let written = store.save_daily_metrics(&run.records).await?;
        info!(run_id = %run.run_id, rows = written, "Run metrics stored");

        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::percentile::{AnchorStore, PercentileEstimator};
    use crate::store::MemoryRankingStore;
    use followrank_common::config::MissingNodePolicy;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn star() -> (Vec<NodeRecord>, Vec<EdgeRecord>) {
        // Everyone follows "hub"; hub follows "a"
        let nodes = vec![
            NodeRecord::with_counts("hub", 50_000, 10),
            NodeRecord::with_counts("a", 300, 200),
            NodeRecord::with_counts("b", 40, 500),
            NodeRecord::with_counts("c", 10, 8_000),
            NodeRecord::with_counts("d", 0, 0),
        ];
        let edges = vec![
            EdgeRecord::new("a", "hub"),
            EdgeRecord::new("b", "hub"),
            EdgeRecord::new("c", "hub"),
            EdgeRecord::new("d", "hub"),
            EdgeRecord::new("hub", "a"),
        ];
        (nodes, edges)
    }

    #[test]
    fn test_run_produces_row_per_node() {
        let (nodes, edges) = star();
        let run = RankingJob::new(RankingConfig::default())
            .run(nodes, edges, day())
            .unwrap();

        assert_eq!(run.records.len(), 5);
        assert_eq!(run.nodes, 5);
        assert_eq!(run.edges, 5);
        assert!(run.converged);

        let hub = &run.records[0];
        assert_eq!(hub.node_id, "hub");
        assert_eq!(hub.inbound_edges, 4);
        assert_eq!(hub.outbound_edges, 1);
        assert_eq!(hub.follower_count, 50_000);
        assert!(run.records.iter().all(|r| r.date == day()));

        // Unfollowed nodes keep nothing once their restart mass is removed
        for r in &run.records[2..] {
            assert_eq!(r.score, 0.0);
            assert_eq!(r.percentile, 0.0);
        }
        assert!(run.records[0].percentile > 50.0);
        assert!(run.records[1].percentile > 50.0);
    }

    #[test]
    fn test_anchor_table_places_run_scores() {
        let (nodes, edges) = star();
        let run = RankingJob::new(RankingConfig::default())
            .run(nodes, edges, day())
            .unwrap();

        let store = AnchorStore::new();
        store.publish(run.anchors.clone());
        let est = PercentileEstimator::default();

        let hub = run.records[0].score;
        let min = run
            .records
            .iter()
            .map(|r| r.score)
            .fold(f64::INFINITY, f64::min);
        assert!(store.estimate(hub, &est) >= store.estimate(min, &est));
    }

    #[test]
    fn test_seed_nodes_from_config() {
        let (nodes, edges) = star();
        let plain = RankingJob::new(RankingConfig::default())
            .run(nodes.clone(), edges.clone(), day())
            .unwrap();

        let seeded = RankingJob::new(RankingConfig {
            seed_nodes: vec!["d".to_string()],
            ..RankingConfig::default()
        })
        .run(nodes, edges, day())
        .unwrap();

        // d seeds the hub, which passes rank on to a
        assert!(seeded.records[1].score > plain.records[1].score);
    }

    #[test]
    fn test_runs_are_reproducible() {
        let (nodes, edges) = star();
        let job = RankingJob::new(RankingConfig::default());
        let first = job.run(nodes.clone(), edges.clone(), day()).unwrap();
        let second = job.run(nodes, edges, day()).unwrap();

        assert_ne!(first.run_id, second.run_id);
        assert_eq!(first.records, second.records);
        assert_eq!(first.anchors, second.anchors);
    }

    #[test]
    fn test_empty_graph_is_an_error() {
        let err = RankingJob::new(RankingConfig::default())
            .run(Vec::<NodeRecord>::new(), Vec::<EdgeRecord>::new(), day())
            .unwrap_err();
        assert!(matches!(err, AppError::EmptyGraph));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_node_policy() {
        let nodes = vec![NodeRecord::bare("a")];
        let edges = vec![EdgeRecord::new("a", "ghost")];

        let run = RankingJob::new(RankingConfig::default())
            .run(nodes.clone(), edges.clone(), day())
            .unwrap();
        assert_eq!(run.auto_created_nodes, 1);
        assert_eq!(run.records.len(), 2);

        let err = RankingJob::new(RankingConfig {
            missing_nodes: MissingNodePolicy::Reject,
            ..RankingConfig::default()
        })
        .run(nodes, edges, day())
        .unwrap_err();
        assert!(matches!(err, AppError::DataIntegrity { .. }));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = RankingConfig::default();
        config.solver.alpha = 1.5;
        let (nodes, edges) = star();
        let err = RankingJob::new(config).run(nodes, edges, day()).unwrap_err();
        assert!(matches!(err, AppError::InvalidConfiguration { .. }));
    }

    #[tokio::test]
    async fn test_run_from_store_saves_outputs() {
        let dir = std::env::temp_dir().join(format!("followrank-job-{}", std::process::id()));
        let anchor_path = dir.join("anchors.json");
        let (nodes, edges) = star();
        let store = MemoryRankingStore::with_graph(nodes, edges);

        let run = RankingJob::new(RankingConfig::default())
            .run_from_store(&store, day(), &anchor_path)
            .await
            .unwrap();

        let saved = store.metrics_for(day());
        assert_eq!(saved.len(), run.records.len());
        let hub = saved.iter().find(|m| m.node_id == "hub").unwrap();
        assert_eq!(hub, &run.records[0]);
        assert_eq!(AnchorTable::load(&anchor_path).unwrap(), run.anchors);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_failed_anchor_write_stores_no_metrics() {
        let dir = std::env::temp_dir().join(format!("followrank-job-blocked-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        // A regular file where the anchor directory should be
        let blocker = dir.join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let (nodes, edges) = star();
        let store = MemoryRankingStore::with_graph(nodes, edges);
        let result = RankingJob::new(RankingConfig::default())
            .run_from_store(&store, day(), &blocker.join("anchors.json"))
            .await;

        assert!(result.is_err());
        assert!(store.metrics_for(day()).is_empty());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}

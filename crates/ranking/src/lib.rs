//! FollowRank ranking engine
//!
//! Ranks accounts of a follow graph by influence:
//! - `graph`: node/edge records and the compressed adjacency
//! - `rank`: personalization vector and the damped power-iteration solver
//! - `percentile`: exact percentiles, anchor tables, and approximate lookup
//! - `external`: estimates for accounts outside the ranked graph
//! - `store`: persistence boundary (Postgres or in-memory)
//! - `job`: one end-to-end daily run

pub mod external;
pub mod graph;
pub mod job;
pub mod percentile;
pub mod rank;
pub mod store;

pub use external::{ExternalScoreEstimate, ExternalScoreEstimator, FollowerMetric};
pub use graph::{EdgeRecord, FollowGraph, NodeAttributes, NodeRecord};
pub use job::{RankingJob, RankingRun};
pub use percentile::{Anchor, AnchorStore, AnchorTable, PercentileEstimator, PercentileRanker};
pub use rank::{PersonalizationVector, RankSolver, SolveOutcome};
pub use store::{DailyMetric, MemoryRankingStore, RankingStore, SqlRankingStore};

//! Persistence boundary for ranking runs
//!
//! The engine itself never touches a database. A run reads node and edge
//! rows through [`RankingStore`] and writes one [`DailyMetric`] per node back.

mod memory;
mod sql;

pub use memory::MemoryRankingStore;
pub use sql::SqlRankingStore;

use crate::external::FollowerMetric;
use crate::graph::{EdgeRecord, NodeRecord};
use async_trait::async_trait;
use chrono::NaiveDate;
use followrank_common::errors::Result;
use serde::{Deserialize, Serialize};

/// One node's ranking output for one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetric {
    pub node_id: String,
    pub date: NaiveDate,
    pub score: f64,
    pub percentile: f64,
    pub follower_count: u64,
    pub following_count: u64,

    /// Followers present in the graph
    pub inbound_edges: u64,

    /// Followed accounts present in the graph
    pub outbound_edges: u64,
}

/// Source of graph rows and sink for daily metrics
#[async_trait]
pub trait RankingStore: Send + Sync {
    /// Every node with its attributes
    async fn load_nodes(&self) -> Result<Vec<NodeRecord>>;

    /// Every follow relationship, follower first
    async fn load_edges(&self) -> Result<Vec<EdgeRecord>>;

    /// Upsert metrics keyed by `(node_id, date)`, returning rows written.
    /// Either every row is stored or none is.
    async fn save_daily_metrics(&self, metrics: &[DailyMetric]) -> Result<u64>;

    /// Latest stored metrics for each of `follower_ids` that has any
    async fn load_follower_metrics(&self, follower_ids: &[String]) -> Result<Vec<FollowerMetric>>;
}

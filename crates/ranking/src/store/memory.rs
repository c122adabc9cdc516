use super::{DailyMetric, RankingStore};
use crate::external::FollowerMetric;
use crate::graph::{EdgeRecord, NodeRecord};
use async_trait::async_trait;
use chrono::NaiveDate;
use followrank_common::errors::Result;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// Store kept entirely in memory, for tests and offline runs
#[derive(Debug, Default)]
pub struct MemoryRankingStore {
    nodes: Vec<NodeRecord>,
    edges: Vec<EdgeRecord>,
    metrics: RwLock<BTreeMap<(String, NaiveDate), DailyMetric>>,
}

impl MemoryRankingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_graph(nodes: Vec<NodeRecord>, edges: Vec<EdgeRecord>) -> Self {
        Self {
            nodes,
            edges,
            metrics: RwLock::default(),
        }
    }

    /// Stored metrics for one day, ordered by node id
    pub fn metrics_for(&self, date: NaiveDate) -> Vec<DailyMetric> {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|m| m.date == date)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RankingStore for MemoryRankingStore {
    async fn load_nodes(&self) -> Result<Vec<NodeRecord>> {
        Ok(self.nodes.clone())
    }

    async fn load_edges(&self) -> Result<Vec<EdgeRecord>> {
        Ok(self.edges.clone())
    }

    async fn save_daily_metrics(&self, metrics: &[DailyMetric]) -> Result<u64> {
        let mut stored = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        for metric in metrics {
            stored.insert((metric.node_id.clone(), metric.date), metric.clone());
        }
        Ok(metrics.len() as u64)
    }

    async fn load_follower_metrics(&self, follower_ids: &[String]) -> Result<Vec<FollowerMetric>> {
        let stored = self.metrics.read().unwrap_or_else(PoisonError::into_inner);

        let latest = follower_ids.iter().filter_map(|id| {
            stored
                .range((id.clone(), NaiveDate::MIN)..=(id.clone(), NaiveDate::MAX))
                .next_back()
                .map(|(_, m)| m)
        });

        Ok(latest
            .filter(|m| m.outbound_edges > 0)
            .map(|m| FollowerMetric {
                node_id: m.node_id.clone(),
                score: m.score,
                outbound_edges: m.outbound_edges,
            })
            .collect())
    }
}

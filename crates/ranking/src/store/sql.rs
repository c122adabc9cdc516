//! Postgres-backed store using raw statements over the shared pool

use super::{DailyMetric, RankingStore};
use crate::external::FollowerMetric;
use crate::graph::{EdgeRecord, NodeAttributes, NodeRecord};
use async_trait::async_trait;
use followrank_common::config::{DatabaseConfig, IdColumnType, OutputConfig};
use followrank_common::db::DbPool;
use followrank_common::errors::Result;
use sea_orm::{ConnectionTrait, DbBackend, Statement, TransactionTrait, Value};
use tracing::{debug, info, instrument};

const METRIC_COLUMNS: usize = 8;

/// Postgres caps bind parameters per statement at 65535
const MAX_BIND_PARAMS: usize = u16::MAX as usize;

const LOAD_NODES_SQL: &str = r#"
    SELECT user_id::text AS user_id, username, follower_count, following_count,
           is_verified, profile_pic_url
    FROM users
"#;

const LOAD_EDGES_SQL: &str = r#"
    SELECT user_id::text AS user_id, following_id::text AS following_id
    FROM following_relationships
"#;

pub struct SqlRankingStore {
    pool: DbPool,
    id_type: IdColumnType,
    chunk_size: usize,
}

impl SqlRankingStore {
    pub fn new(pool: DbPool, database: &DatabaseConfig, output: &OutputConfig) -> Self {
        let max_rows = MAX_BIND_PARAMS / METRIC_COLUMNS;
        Self {
            pool,
            id_type: database.id_type,
            chunk_size: output.insert_chunk_size.clamp(1, max_rows),
        }
    }
}

fn count(value: Option<i64>) -> u64 {
    value.map_or(0, |v| v.max(0) as u64)
}

fn as_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// `($1::id, ..., $w), ($w+1::id, ...)` for `rows` tuples of `width`
/// parameters. The first parameter of each tuple is the account id.
fn placeholders(rows: usize, width: usize, id_type: IdColumnType) -> String {
    (0..rows)
        .map(|row| {
            let params: Vec<String> = (1..=width)
                .map(|col| match col {
                    1 => format!("${}::{}", row * width + col, id_type.as_sql()),
                    _ => format!("${}", row * width + col),
                })
                .collect();
            format!("({})", params.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn upsert_statement(rows: &[DailyMetric], id_type: IdColumnType) -> Statement {
    let sql = format!(
        r#"
        INSERT INTO user_daily_metrics (
            user_id, date, pagerank_score, pagerank_percentile,
            follower_count, following_count, inbound_edges, outbound_edges
        )
        VALUES {}
        ON CONFLICT (user_id, date) DO UPDATE SET
            pagerank_score = EXCLUDED.pagerank_score,
            pagerank_percentile = EXCLUDED.pagerank_percentile,
            follower_count = EXCLUDED.follower_count,
            following_count = EXCLUDED.following_count,
            inbound_edges = EXCLUDED.inbound_edges,
            outbound_edges = EXCLUDED.outbound_edges
        "#,
        placeholders(rows.len(), METRIC_COLUMNS, id_type)
    );

    let mut values: Vec<Value> = Vec::with_capacity(rows.len() * METRIC_COLUMNS);
    for m in rows {
        values.push(m.node_id.clone().into());
        values.push(m.date.into());
        values.push(m.score.into());
        values.push(m.percentile.into());
        values.push(as_i64(m.follower_count).into());
        values.push(as_i64(m.following_count).into());
        values.push(as_i64(m.inbound_edges).into());
        values.push(as_i64(m.outbound_edges).into());
    }

    Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
}

/// Parameters are cast to the key type so the `(user_id, date)` index applies
fn latest_metrics_statement(ids: &[String], id_type: IdColumnType) -> Statement {
    let sql = format!(
        r#"
        SELECT DISTINCT ON (user_id)
               user_id::text AS user_id, pagerank_score, outbound_edges
        FROM user_daily_metrics
        WHERE user_id IN ({})
        ORDER BY user_id, date DESC
        "#,
        (1..=ids.len())
            .map(|i| format!("${}::{}", i, id_type.as_sql()))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let values: Vec<Value> = ids.iter().map(|id| id.clone().into()).collect();

    Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
}

#[async_trait]
impl RankingStore for SqlRankingStore {
    #[instrument(skip(self))]
    async fn load_nodes(&self) -> Result<Vec<NodeRecord>> {
        let rows = self
            .pool
            .read()
            .query_all(Statement::from_string(DbBackend::Postgres, LOAD_NODES_SQL))
            .await?;

        let mut nodes = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("", "user_id")?;
            let follower_count: Option<i64> = row.try_get("", "follower_count")?;
            let following_count: Option<i64> = row.try_get("", "following_count")?;
            let is_verified: Option<bool> = row.try_get("", "is_verified")?;

            nodes.push(NodeRecord {
                id,
                attributes: NodeAttributes {
                    follower_count: count(follower_count),
                    following_count: count(following_count),
                    is_verified: is_verified.unwrap_or(false),
                    username: row.try_get("", "username")?,
                    profile_pic_url: row.try_get("", "profile_pic_url")?,
                },
            });
        }

        info!(nodes = nodes.len(), "Loaded node rows");
        Ok(nodes)
    }

    #[instrument(skip(self))]
    async fn load_edges(&self) -> Result<Vec<EdgeRecord>> {
        let rows = self
            .pool
            .read()
            .query_all(Statement::from_string(DbBackend::Postgres, LOAD_EDGES_SQL))
            .await?;

        let mut edges = Vec::with_capacity(rows.len());
        for row in rows {
            edges.push(EdgeRecord {
                source: row.try_get("", "user_id")?,
                target: row.try_get("", "following_id")?,
            });
        }

        info!(edges = edges.len(), "Loaded edge rows");
        Ok(edges)
    }

    #[instrument(skip_all, fields(rows = metrics.len(), chunk_size = self.chunk_size))]
    async fn save_daily_metrics(&self, metrics: &[DailyMetric]) -> Result<u64> {
        if metrics.is_empty() {
            return Ok(0);
        }

        let txn = self.pool.write().begin().await?;
        let mut written = 0;

        for (i, chunk) in metrics.chunks(self.chunk_size).enumerate() {
            let result = txn.execute(upsert_statement(chunk, self.id_type)).await?;
            written += result.rows_affected();
            debug!(chunk = i, rows = chunk.len(), "Metrics chunk written");
        }

        txn.commit().await?;

        info!(rows = written, "Daily metrics saved");
        Ok(written)
    }

    #[instrument(skip_all, fields(followers = follower_ids.len()))]
    async fn load_follower_metrics(&self, follower_ids: &[String]) -> Result<Vec<FollowerMetric>> {
        let mut followers = Vec::new();

        for ids in follower_ids.chunks(MAX_BIND_PARAMS) {
            let rows = self.pool.read().query_all(latest_metrics_statement(ids, self.id_type)).await?;

            for row in rows {
                let outbound_edges: Option<i64> = row.try_get("", "outbound_edges")?;
                let outbound_edges = count(outbound_edges);
                if outbound_edges == 0 {
                    continue;
                }
                followers.push(FollowerMetric {
                    node_id: row.try_get("", "user_id")?,
                    score: row.try_get("", "pagerank_score")?,
                    outbound_edges,
                });
            }
        }

        debug!(found = followers.len(), "Loaded follower metrics");
        Ok(followers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn metric(id: &str) -> DailyMetric {
        DailyMetric {
            node_id: id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            score: 0.25,
            percentile: 75.0,
            follower_count: 100,
            following_count: 20,
            inbound_edges: 3,
            outbound_edges: 2,
        }
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1, 3, IdColumnType::Text), "($1::text, $2, $3)");
        assert_eq!(
            placeholders(2, 2, IdColumnType::Bigint),
            "($1::bigint, $2), ($3::bigint, $4)"
        );
    }

    #[test]
    fn test_upsert_binds_every_column() {
        let stmt = upsert_statement(&[metric("a"), metric("b")], IdColumnType::Text);
        assert!(stmt.sql.contains("ON CONFLICT (user_id, date) DO UPDATE"));
        assert!(stmt.sql.contains("($9::text, $10, $11, $12, $13, $14, $15, $16)"));
        assert!(!stmt.sql.contains("$17"));
        assert_eq!(stmt.values.unwrap().0.len(), 16);
    }

    #[test]
    fn test_latest_metrics_statement() {
        let ids = vec!["7".to_string(), "9".to_string()];
        let stmt = latest_metrics_statement(&ids, IdColumnType::Text);
        assert!(stmt.sql.contains("WHERE user_id IN ($1::text, $2::text)"));
        assert!(stmt.sql.contains("DISTINCT ON (user_id)"));

        // The indexed column itself is never cast
        let stmt = latest_metrics_statement(&ids, IdColumnType::Bigint);
        assert!(stmt.sql.contains("WHERE user_id IN ($1::bigint, $2::bigint)"));
        assert!(!stmt.sql.contains("user_id::text IN"));
    }

    #[test]
    fn test_counts_are_clamped() {
        assert_eq!(count(None), 0);
        assert_eq!(count(Some(-4)), 0);
        assert_eq!(count(Some(12)), 12);
        assert_eq!(as_i64(u64::MAX), i64::MAX);
    }
}

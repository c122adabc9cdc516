//! Percentile ranking and approximate percentile lookup
//!
//! A completed score vector is turned into exact per-node percentiles plus a
//! small anchor table. The anchor table alone is enough to place a score that
//! was never part of the run, trading exactness for an O(log k) lookup.

mod estimator;
mod publish;
mod ranker;

pub use estimator::PercentileEstimator;
pub use publish::AnchorStore;
pub use ranker::{PercentileRanker, PercentileRanking};

use followrank_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A single `(score, percentile)` sample of a score distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub score: f64,
    pub percentile: f64,
}

impl Anchor {
    pub fn new(score: f64, percentile: f64) -> Self {
        Self { score, percentile }
    }
}

/// Validated anchor table.
///
/// Scores are strictly increasing, percentiles are non-decreasing and lie in
/// [0, 100], and there is at least one anchor. Serialized as a plain JSON list
/// of `{score, percentile}` objects; deserialization re-validates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Anchor>", into = "Vec<Anchor>")]
pub struct AnchorTable {
    anchors: Vec<Anchor>,
}

fn unavailable(reason: impl Into<String>) -> AppError {
    AppError::EstimationUnavailable {
        reason: reason.into(),
    }
}

impl AnchorTable {
    /// Build a table, rejecting anything the estimator cannot interpolate
    pub fn new(anchors: Vec<Anchor>) -> Result<Self> {
        Self::validate(&anchors)?;
        Ok(Self { anchors })
    }

    /// Check the ordering and range invariants of a raw anchor list
    pub fn validate(anchors: &[Anchor]) -> Result<()> {
        if anchors.is_empty() {
            return Err(unavailable("anchor table is empty"));
        }

        for (i, anchor) in anchors.iter().enumerate() {
            if !anchor.score.is_finite() || !anchor.percentile.is_finite() {
                return Err(unavailable(format!("anchor {} is not finite", i)));
            }
            if !(0.0..=100.0).contains(&anchor.percentile) {
                return Err(unavailable(format!(
                    "anchor {} percentile {} outside [0, 100]",
                    i, anchor.percentile
                )));
            }
        }

        for (i, pair) in anchors.windows(2).enumerate() {
            if pair[1].score <= pair[0].score {
                return Err(unavailable(format!(
                    "anchor scores not strictly increasing at {}",
                    i + 1
                )));
            }
            if pair[1].percentile < pair[0].percentile {
                return Err(unavailable(format!(
                    "anchor percentiles decrease at {}",
                    i + 1
                )));
            }
        }

        Ok(())
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Always false for a constructed table
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Lowest-score anchor
    pub fn first(&self) -> Anchor {
        self.anchors[0]
    }

    /// Highest-score anchor
    pub fn last(&self) -> Anchor {
        self.anchors[self.anchors.len() - 1]
    }

    /// Serialize as a JSON list
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a JSON list
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the table to `path`.
    ///
    /// The file is written beside the target and renamed over it, so readers
    /// of `path` see either the previous table or the complete new one.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, self.to_json()?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Read a table previously written with [`AnchorTable::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

impl TryFrom<Vec<Anchor>> for AnchorTable {
    type Error = AppError;

    fn try_from(anchors: Vec<Anchor>) -> Result<Self> {
        Self::new(anchors)
    }
}

impl From<AnchorTable> for Vec<Anchor> {
    fn from(table: AnchorTable) -> Self {
        table.anchors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Anchor> {
        vec![Anchor::new(10.0, 5.0), Anchor::new(50.0, 50.0), Anchor::new(90.0, 95.0)]
    }

    #[test]
    fn test_valid_table() {
        let table = AnchorTable::new(sample()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.first(), Anchor::new(10.0, 5.0));
        assert_eq!(table.last(), Anchor::new(90.0, 95.0));
    }

    #[test]
    fn test_rejects_malformed_tables() {
        assert!(AnchorTable::new(Vec::new()).is_err());

        let mut flat = sample();
        flat[1].score = 10.0;
        assert!(matches!(
            AnchorTable::new(flat),
            Err(AppError::EstimationUnavailable { .. })
        ));

        let mut falling = sample();
        falling[2].percentile = 40.0;
        assert!(AnchorTable::new(falling).is_err());

        let mut out_of_range = sample();
        out_of_range[2].percentile = 101.0;
        assert!(AnchorTable::new(out_of_range).is_err());

        let mut nan = sample();
        nan[0].score = f64::NAN;
        assert!(AnchorTable::new(nan).is_err());
    }

    #[test]
    fn test_json_is_a_plain_list() {
        let table = AnchorTable::new(sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&table.to_json().unwrap()).unwrap();

        let list = value.as_array().unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[1]["score"], 50.0);
        assert_eq!(list[1]["percentile"], 50.0);
    }

    #[test]
    fn test_deserialize_revalidates() {
        let bad = r#"[{"score": 5.0, "percentile": 10.0}, {"score": 1.0, "percentile": 20.0}]"#;
        assert!(AnchorTable::from_json(bad).is_err());

        let good = r#"[{"score": 1.0, "percentile": 10.0}, {"score": 5.0, "percentile": 20.0}]"#;
        assert_eq!(AnchorTable::from_json(good).unwrap().len(), 2);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("followrank-anchors-{}", std::process::id()));
        let path = dir.join("anchors.json");

        let table = AnchorTable::new(sample()).unwrap();
        table.save(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(AnchorTable::load(&path).unwrap(), table);

        fs::remove_dir_all(&dir).unwrap();
    }
}

//! Follow graph representation
//!
//! Provides the in-memory directed graph the ranking pipeline runs on.
//! Node order is fixed at load time and every score vector is aligned to it.

mod follow;
mod transition;

pub use follow::FollowGraph;
pub use transition::TransitionMatrix;

use serde::{Deserialize, Serialize};

/// Account attributes used by the personalization heuristic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAttributes {
    /// Number of accounts following this one
    pub follower_count: u64,

    /// Number of accounts this one follows
    pub following_count: u64,

    /// Platform verification flag
    pub is_verified: bool,

    /// Display handle
    pub username: Option<String>,

    /// Avatar URL for display
    pub profile_pic_url: Option<String>,
}

/// A node row as read from the attribute source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Opaque unique identifier
    pub id: String,

    #[serde(flatten)]
    pub attributes: NodeAttributes,
}

impl NodeRecord {
    /// Node with default (zero) attributes
    pub fn bare(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: NodeAttributes::default(),
        }
    }

    /// Node with follower/following counts set
    pub fn with_counts(id: impl Into<String>, follower_count: u64, following_count: u64) -> Self {
        Self {
            id: id.into(),
            attributes: NodeAttributes {
                follower_count,
                following_count,
                ..NodeAttributes::default()
            },
        }
    }
}

/// Directed edge: `source` follows `target`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
}

impl EdgeRecord {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

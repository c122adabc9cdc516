//! In-memory follow graph with frozen node order

use super::{EdgeRecord, NodeAttributes, NodeRecord, TransitionMatrix};
use followrank_common::config::MissingNodePolicy;
use followrank_common::errors::{AppError, Result};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Directed follow graph.
///
/// Nodes are addressed by a dense index in load order. Adjacency is kept in
/// compressed sparse row form in both directions, with duplicate edges
/// collapsed.
#[derive(Debug, Clone, Default)]
pub struct FollowGraph {
    /// Node ids in index order
    ids: Vec<String>,

    /// Node attributes in index order
    attributes: Vec<NodeAttributes>,

    /// id -> index
    index: HashMap<String, usize>,

    /// Outbound adjacency: node i follows out_targets[out_offsets[i]..out_offsets[i + 1]]
    out_offsets: Vec<usize>,
    out_targets: Vec<usize>,

    /// Inbound adjacency: node i is followed by in_sources[in_offsets[i]..in_offsets[i + 1]]
    in_offsets: Vec<usize>,
    in_sources: Vec<usize>,

    /// Nodes created from edge endpoints missing in the attribute source
    auto_created: usize,
}

impl FollowGraph {
    /// Build a graph from attribute rows and edge rows.
    ///
    /// Node order is the order of first appearance in `nodes`, followed by
    /// auto-created endpoints in edge order. When an id is listed twice the
    /// later attributes win but the first position is kept.
    pub fn load<N, E>(nodes: N, edges: E, policy: MissingNodePolicy) -> Result<Self>
    where
        N: IntoIterator<Item = NodeRecord>,
        E: IntoIterator<Item = EdgeRecord>,
    {
        let mut graph = Self::default();

        for record in nodes {
            match graph.index.get(&record.id) {
                Some(&idx) => {
                    debug!(node_id = %record.id, "Duplicate node row, keeping latest attributes");
                    graph.attributes[idx] = record.attributes;
                }
                None => {
                    graph.push_node(record.id, record.attributes);
                }
            }
        }

        let mut pairs = Vec::new();
        for edge in edges {
            let source = graph.resolve(&edge.source, &edge, policy)?;
            let target = graph.resolve(&edge.target, &edge, policy)?;
            pairs.push((source, target));
        }

        let raw_edges = pairs.len();
        pairs.sort_unstable();
        pairs.dedup();
        let duplicates = raw_edges - pairs.len();

        let n = graph.ids.len();
        let (out_offsets, out_targets) = compress(n, &pairs);

        let mut reversed: Vec<(usize, usize)> = pairs.iter().map(|&(s, t)| (t, s)).collect();
        reversed.sort_unstable();
        let (in_offsets, in_sources) = compress(n, &reversed);

        graph.out_offsets = out_offsets;
        graph.out_targets = out_targets;
        graph.in_offsets = in_offsets;
        graph.in_sources = in_sources;

        if graph.auto_created > 0 {
            warn!(
                auto_created = graph.auto_created,
                "Created zero-attribute nodes for edge endpoints missing from the node list"
            );
        }

        info!(
            nodes = n,
            edges = graph.edge_count(),
            duplicate_edges = duplicates,
            "Follow graph loaded"
        );

        Ok(graph)
    }

    fn push_node(&mut self, id: String, attributes: NodeAttributes) -> usize {
        let idx = self.ids.len();
        self.index.insert(id.clone(), idx);
        self.ids.push(id);
        self.attributes.push(attributes);
        idx
    }

    fn resolve(&mut self, id: &str, edge: &EdgeRecord, policy: MissingNodePolicy) -> Result<usize> {
        if let Some(&idx) = self.index.get(id) {
            return Ok(idx);
        }

        match policy {
            MissingNodePolicy::Reject => Err(AppError::DataIntegrity {
                source_id: edge.source.clone(),
                target_id: edge.target.clone(),
                missing: id.to_string(),
            }),
            MissingNodePolicy::AutoCreate => {
                self.auto_created += 1;
                Ok(self.push_node(id.to_string(), NodeAttributes::default()))
            }
        }
    }

    /// Get node count
    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    /// Get distinct edge count
    pub fn edge_count(&self) -> usize {
        self.out_targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of nodes created from unknown edge endpoints
    pub fn auto_created_count(&self) -> usize {
        self.auto_created
    }

    /// Node ids in index order
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Iterate `(index, id, attributes)` in index order
    pub fn nodes(&self) -> impl Iterator<Item = (usize, &str, &NodeAttributes)> {
        self.ids
            .iter()
            .zip(self.attributes.iter())
            .enumerate()
            .map(|(idx, (id, attrs))| (idx, id.as_str(), attrs))
    }

    /// Look up the index of a node id
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Get the id at an index
    pub fn id(&self, idx: usize) -> &str {
        &self.ids[idx]
    }

    /// Get the attributes at an index
    pub fn attributes(&self, idx: usize) -> &NodeAttributes {
        &self.attributes[idx]
    }

    /// Nodes followed by `idx`
    pub fn successors(&self, idx: usize) -> &[usize] {
        &self.out_targets[self.out_offsets[idx]..self.out_offsets[idx + 1]]
    }

    /// Nodes following `idx`
    pub fn predecessors(&self, idx: usize) -> &[usize] {
        &self.in_sources[self.in_offsets[idx]..self.in_offsets[idx + 1]]
    }

    /// Get outbound edge count
    pub fn out_degree(&self, idx: usize) -> usize {
        self.out_offsets[idx + 1] - self.out_offsets[idx]
    }

    /// Get inbound edge count
    pub fn in_degree(&self, idx: usize) -> usize {
        self.in_offsets[idx + 1] - self.in_offsets[idx]
    }

    /// Nodes with no outbound edges
    pub fn dangling_nodes(&self) -> Vec<usize> {
        (0..self.node_count())
            .filter(|&idx| self.out_degree(idx) == 0)
            .collect()
    }

    /// Column-normalized transition structure for power iteration
    pub fn transition_matrix(&self) -> TransitionMatrix {
        let weights = self
            .in_sources
            .iter()
            .map(|&source| 1.0 / self.out_degree(source) as f64)
            .collect();

        TransitionMatrix::new(
            self.in_offsets.clone(),
            self.in_sources.clone(),
            weights,
            self.dangling_nodes(),
        )
    }
}

/// Build CSR offsets/columns from pairs sorted by row
fn compress(n: usize, sorted_pairs: &[(usize, usize)]) -> (Vec<usize>, Vec<usize>) {
    let mut offsets = vec![0usize; n + 1];
    for &(row, _) in sorted_pairs {
        offsets[row + 1] += 1;
    }
    for i in 0..n {
        offsets[i + 1] += offsets[i];
    }
    let columns = sorted_pairs.iter().map(|&(_, col)| col).collect();
    (offsets, columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(&str, &str)]) -> Vec<EdgeRecord> {
        pairs.iter().map(|(s, t)| EdgeRecord::new(*s, *t)).collect()
    }

    #[test]
    fn test_graph_construction() {
        let nodes = vec![NodeRecord::bare("a"), NodeRecord::bare("b"), NodeRecord::bare("c")];

        // A follows B, B follows C
        let graph = FollowGraph::load(
            nodes,
            edges(&[("a", "b"), ("b", "c")]),
            MissingNodePolicy::Reject,
        )
        .unwrap();

        let (a, b, c) = (0, 1, 2);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.successors(a), &[b]);
        assert_eq!(graph.predecessors(b), &[a]);
        assert_eq!(graph.successors(b), &[c]);
        assert_eq!(graph.dangling_nodes(), vec![c]);
    }

    #[test]
    fn test_degree_counts() {
        let nodes = vec![NodeRecord::bare("a"), NodeRecord::bare("b"), NodeRecord::bare("c")];

        // Both A and C follow B
        let graph = FollowGraph::load(
            nodes,
            edges(&[("a", "b"), ("c", "b")]),
            MissingNodePolicy::Reject,
        )
        .unwrap();

        let b = graph.index_of("b").unwrap();
        assert_eq!(graph.in_degree(b), 2);
        assert_eq!(graph.out_degree(graph.index_of("a").unwrap()), 1);
        assert_eq!(graph.out_degree(b), 0);
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let graph = FollowGraph::load(
            vec![NodeRecord::bare("a"), NodeRecord::bare("b")],
            edges(&[("a", "b"), ("a", "b"), ("a", "b")]),
            MissingNodePolicy::Reject,
        )
        .unwrap();

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.out_degree(0), 1);
        assert_eq!(graph.in_degree(1), 1);
    }

    #[test]
    fn test_self_loop_is_an_ordinary_edge() {
        let graph = FollowGraph::load(
            vec![NodeRecord::bare("a")],
            edges(&[("a", "a")]),
            MissingNodePolicy::Reject,
        )
        .unwrap();

        assert_eq!(graph.successors(0), &[0]);
        assert_eq!(graph.predecessors(0), &[0]);
        assert!(graph.dangling_nodes().is_empty());
    }

    #[test]
    fn test_reject_unknown_endpoint() {
        let err = FollowGraph::load(
            vec![NodeRecord::bare("a")],
            edges(&[("a", "ghost")]),
            MissingNodePolicy::Reject,
        )
        .unwrap_err();

        match err {
            AppError::DataIntegrity { missing, .. } => assert_eq!(missing, "ghost"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_auto_create_unknown_endpoints() {
        let graph = FollowGraph::load(
            vec![NodeRecord::with_counts("a", 10, 3)],
            edges(&[("x", "a"), ("a", "y"), ("x", "y")]),
            MissingNodePolicy::AutoCreate,
        )
        .unwrap();

        assert_eq!(graph.ids(), &["a", "x", "y"]);
        assert_eq!(graph.auto_created_count(), 2);
        assert_eq!(graph.attributes(1), &NodeAttributes::default());
        assert_eq!(graph.attributes(0).follower_count, 10);
    }

    #[test]
    fn test_duplicate_node_rows_keep_first_position() {
        let graph = FollowGraph::load(
            vec![
                NodeRecord::with_counts("a", 1, 1),
                NodeRecord::bare("b"),
                NodeRecord::with_counts("a", 7, 2),
            ],
            Vec::new(),
            MissingNodePolicy::Reject,
        )
        .unwrap();

        assert_eq!(graph.ids(), &["a", "b"]);
        assert_eq!(graph.attributes(0).follower_count, 7);
    }

    #[test]
    fn test_node_order_is_stable() {
        let build = || {
            FollowGraph::load(
                vec![NodeRecord::bare("z"), NodeRecord::bare("m"), NodeRecord::bare("a")],
                edges(&[("a", "z"), ("m", "a")]),
                MissingNodePolicy::Reject,
            )
            .unwrap()
        };
        let first: Vec<String> = build().nodes().map(|(_, id, _)| id.to_string()).collect();
        let second: Vec<String> = build().nodes().map(|(_, id, _)| id.to_string()).collect();
        assert_eq!(first, vec!["z", "m", "a"]);
        assert_eq!(first, second);
    }
}

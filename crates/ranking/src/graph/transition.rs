//! Sparse transition matrix for power iteration
//!
//! Stored row-wise over *inbound* edges so that `M · x` is a gather: row `i`
//! sums `x[j] / out_degree(j)` over every follower `j` of `i`.

/// Column-normalized follow transition matrix in CSR form
#[derive(Debug, Clone)]
pub struct TransitionMatrix {
    /// Row pointers: row i's entries are at offsets[i]..offsets[i + 1]
    offsets: Vec<usize>,

    /// Source node of each entry
    sources: Vec<usize>,

    /// 1 / out_degree(source) for each entry
    weights: Vec<f64>,

    /// Nodes with no outbound edges
    dangling: Vec<usize>,
}

impl TransitionMatrix {
    pub(crate) fn new(
        offsets: Vec<usize>,
        sources: Vec<usize>,
        weights: Vec<f64>,
        dangling: Vec<usize>,
    ) -> Self {
        debug_assert_eq!(sources.len(), weights.len());
        Self {
            offsets,
            sources,
            weights,
            dangling,
        }
    }

    /// Matrix dimension
    pub fn dim(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Stored non-zero entries
    pub fn nnz(&self) -> usize {
        self.sources.len()
    }

    /// Nodes whose column is all zero
    pub fn dangling_nodes(&self) -> &[usize] {
        &self.dangling
    }

    /// Compute `out = M · x`
    pub fn multiply(&self, x: &[f64], out: &mut [f64]) {
        debug_assert_eq!(x.len(), self.dim());
        debug_assert_eq!(out.len(), self.dim());

        for (row, slot) in out.iter_mut().enumerate() {
            let (start, end) = (self.offsets[row], self.offsets[row + 1]);
            *slot = self.sources[start..end]
                .iter()
                .zip(&self.weights[start..end])
                .map(|(&source, &weight)| x[source] * weight)
                .sum();
        }
    }

    /// Sum of `x` over dangling nodes
    pub fn dangling_mass(&self, x: &[f64]) -> f64 {
        self.dangling.iter().map(|&idx| x[idx]).sum()
    }
}

//! Exhaustive construction: every pair compared, implied edges dropped.
//!
//! O(C²) inclusion tests plus an O(C³) worst-case reduction. Only used to
//! cross-check the other strategies.

use super::frontier::LocalGraph;
use super::Checkpoint;
use crate::cluster::{Cluster, ClusterId};
use crate::core::{BitVector, Result};

/// Build the cover graph over `ids`.
pub(crate) fn build(
    clusters: &[Cluster],
    ids: &[ClusterId],
    comparisons: &mut u64,
    checkpoint: Checkpoint<'_>,
) -> Result<LocalGraph> {
    let n = ids.len();
    let vectors: Vec<&BitVector> = ids.iter().map(|id| &clusters[id.index()].vector).collect();

    // above[i] holds every j whose vector strictly contains the vector of i.
    let mut above = vec![BitVector::new(n); n];
    for i in 0..n {
        checkpoint(i, n)?;
        for j in (0..n).filter(|&j| j != i) {
            *comparisons += 1;
            if vectors[i].is_subset_of_unchecked(vectors[j]) {
                above[i].set(j, true)?;
            }
        }
    }

    let mut graph = LocalGraph::with_capacity(n, n);
    let nodes: Vec<_> = ids.iter().map(|&id| graph.add_node(id)).collect();
    for i in 0..n {
        for j in above[i].ones() {
            let implied = above[i].ones().any(|z| above[z].bit(j));
            if !implied {
                graph.add_edge(nodes[i], nodes[j], ());
            }
        }
    }
    Ok(graph)
}

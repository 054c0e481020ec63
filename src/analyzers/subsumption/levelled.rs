//! Levelled (incremental) construction.
//!
//! Clusters are inserted from the highest degree down to the lowest. A
//! cluster can only be a subset of clusters with a strictly higher degree, so
//! when `x` arrives every cluster that could sit above it is already placed
//! and no existing edge can gain `x` as an intermediate. Connecting `x` to the
//! minimal placed clusters containing it therefore keeps the placed graph a
//! complete cover graph after every step.

use std::cmp::Reverse;

use super::frontier::{Closure, LocalGraph, Walker};
use super::Checkpoint;
use crate::cluster::{Cluster, ClusterId};
use crate::core::Result;

/// Build the cover graph over `ids`.
pub(crate) fn build(
    clusters: &[Cluster],
    ids: &[ClusterId],
    walker: &mut Walker,
    comparisons: &mut u64,
    checkpoint: Checkpoint<'_>,
) -> Result<LocalGraph> {
    let mut order = ids.to_vec();
    order.sort_by_key(|id| (Reverse(clusters[id.index()].degree), *id));

    let mut placed = LocalGraph::with_capacity(order.len(), order.len());
    let mut level_degree = None;
    for (done, &id) in order.iter().enumerate() {
        let degree = clusters[id.index()].degree;
        if level_degree != Some(degree) {
            checkpoint(done, order.len())?;
            tracing::trace!(degree, placed = done, "entering level");
            level_degree = Some(degree);
        }
        place(clusters, &mut placed, id, walker, comparisons);
    }
    Ok(placed)
}

/// Insert `id` below everything already placed that contains it.
///
/// Every placed cluster must have a degree at least that of `id`.
pub(crate) fn place(
    clusters: &[Cluster],
    placed: &mut LocalGraph,
    id: ClusterId,
    walker: &mut Walker,
    comparisons: &mut u64,
) {
    let vector = &clusters[id.index()].vector;
    let above = walker.search(placed, Closure::Upward, |y| {
        vector.is_subset_of_unchecked(&clusters[y.index()].vector)
    });
    *comparisons += above.comparisons;

    let node = placed.add_node(id);
    for target in above.nodes {
        placed.add_edge(node, target, ());
    }
}

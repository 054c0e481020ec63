//! Divide-and-conquer construction.
//!
//! Pick a pivot `p` of median degree and split the remaining clusters into
//! those strictly below `p`, strictly above `p`, and those incomparable with
//! it. Each part is built recursively. Edges inside a part stay cover edges
//! in the union, and the only cross-part covers are:
//!
//! - maximal clusters below `p` into `p`, and `p` into minimal clusters above,
//! - below -> incomparable and incomparable -> above, found by a frontier
//!   search of the below/above part per incomparable cluster.
//!
//! Parts that are too small, or splits that leave almost everything
//! incomparable, fall back to the levelled strategy so recursion depth stays
//! logarithmic.

use petgraph::graph::NodeIndex;
use petgraph::Direction;

use super::frontier::{Closure, LocalGraph, Walker};
use super::{levelled, Checkpoint};
use crate::cluster::{Cluster, ClusterId};
use crate::core::{BitVector, Result};

/// Build the cover graph over `ids`.
pub(crate) fn build(
    clusters: &[Cluster],
    ids: &[ClusterId],
    leaf_size: usize,
    walker: &mut Walker,
    comparisons: &mut u64,
    checkpoint: Checkpoint<'_>,
) -> Result<LocalGraph> {
    let mut splitter = Splitter {
        clusters,
        leaf_size: leaf_size.max(2),
        walker,
        comparisons,
        checkpoint,
        done: 0,
        total: ids.len(),
    };
    splitter.solve(ids.to_vec())
}

struct Splitter<'a> {
    clusters: &'a [Cluster],
    leaf_size: usize,
    walker: &'a mut Walker,
    comparisons: &'a mut u64,
    checkpoint: Checkpoint<'a>,
    done: usize,
    total: usize,
}

impl Splitter<'_> {
    fn vector(&self, id: ClusterId) -> &BitVector {
        &self.clusters[id.index()].vector
    }

    fn degree(&self, id: ClusterId) -> usize {
        self.clusters[id.index()].degree
    }

    fn solve(&mut self, mut ids: Vec<ClusterId>) -> Result<LocalGraph> {
        (self.checkpoint)(self.done, self.total)?;
        if ids.len() <= self.leaf_size {
            return self.leaf(&ids);
        }

        ids.sort_by_key(|&id| (self.degree(id), id));
        let pivot = ids[ids.len() / 2];
        let pivot_degree = self.degree(pivot);

        let (mut below, mut above, mut apart) = (Vec::new(), Vec::new(), Vec::new());
        for &id in ids.iter().filter(|&&id| id != pivot) {
            let degree = self.degree(id);
            if degree < pivot_degree {
                *self.comparisons += 1;
                if self.vector(id).is_subset_of_unchecked(self.vector(pivot)) {
                    below.push(id);
                    continue;
                }
            } else if degree > pivot_degree {
                *self.comparisons += 1;
                if self.vector(pivot).is_subset_of_unchecked(self.vector(id)) {
                    above.push(id);
                    continue;
                }
            }
            apart.push(id);
        }

        if apart.len() * 4 > ids.len() * 3 {
            return self.leaf(&ids);
        }

        let below = self.solve(below)?;
        let above = self.solve(above)?;
        let apart = self.solve(apart)?;
        self.done += 1;
        Ok(self.splice(pivot, &below, &above, &apart))
    }

    fn leaf(&mut self, ids: &[ClusterId]) -> Result<LocalGraph> {
        self.done += ids.len();
        levelled::build(
            self.clusters,
            ids,
            self.walker,
            self.comparisons,
            &|_, _| Ok(()),
        )
    }

    fn splice(
        &mut self,
        pivot: ClusterId,
        below: &LocalGraph,
        above: &LocalGraph,
        apart: &LocalGraph,
    ) -> LocalGraph {
        let nodes = below.node_count() + above.node_count() + apart.node_count() + 1;
        let mut graph = LocalGraph::with_capacity(nodes, nodes);
        let below_at = copy_into(&mut graph, below);
        let p = graph.add_node(pivot);
        let above_at = copy_into(&mut graph, above);
        let apart_at = copy_into(&mut graph, apart);

        for v in below.externals(Direction::Outgoing) {
            graph.add_edge(below_at[v.index()], p, ());
        }
        for v in above.externals(Direction::Incoming) {
            graph.add_edge(p, above_at[v.index()], ());
        }

        let clusters = self.clusters;
        for w in apart.node_indices() {
            let wv = &clusters[apart[w].index()].vector;

            let under = self.walker.search(below, Closure::Downward, |u| {
                clusters[u.index()].vector.is_subset_of_unchecked(wv)
            });
            *self.comparisons += under.comparisons;
            let preds = neighbor_vectors(clusters, apart, w, Direction::Incoming);
            for u in under.nodes {
                let uv = &clusters[below[u].index()].vector;
                if !self.any_between(&preds, |q| uv.is_subset_of_unchecked(q)) {
                    graph.add_edge(below_at[u.index()], apart_at[w.index()], ());
                }
            }

            let over = self.walker.search(above, Closure::Upward, |v| {
                wv.is_subset_of_unchecked(&clusters[v.index()].vector)
            });
            *self.comparisons += over.comparisons;
            let succs = neighbor_vectors(clusters, apart, w, Direction::Outgoing);
            for v in over.nodes {
                let vv = &clusters[above[v].index()].vector;
                if !self.any_between(&succs, |q| q.is_subset_of_unchecked(vv)) {
                    graph.add_edge(apart_at[w.index()], above_at[v.index()], ());
                }
            }
        }
        graph
    }

    /// Does any incomparable neighbour sit strictly between the endpoints?
    fn any_between(&mut self, candidates: &[&BitVector], test: impl Fn(&BitVector) -> bool) -> bool {
        for &q in candidates {
            *self.comparisons += 1;
            if test(q) {
                return true;
            }
        }
        false
    }
}

fn neighbor_vectors<'c>(
    clusters: &'c [Cluster],
    graph: &LocalGraph,
    node: NodeIndex,
    direction: Direction,
) -> Vec<&'c BitVector> {
    graph
        .neighbors_directed(node, direction)
        .map(|q| &clusters[graph[q].index()].vector)
        .collect()
}

fn copy_into(target: &mut LocalGraph, source: &LocalGraph) -> Vec<NodeIndex> {
    let at: Vec<NodeIndex> = source
        .node_indices()
        .map(|v| target.add_node(source[v]))
        .collect();
    for edge in source.raw_edges() {
        target.add_edge(at[edge.source().index()], at[edge.target().index()], ());
    }
    at
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Clustering;
    use crate::config::Traversal;
    use crate::core::Element;

    fn sorted_edges(graph: &LocalGraph) -> Vec<(usize, usize)> {
        let mut edges: Vec<(usize, usize)> = graph
            .raw_edges()
            .iter()
            .map(|e| (graph[e.source()].index(), graph[e.target()].index()))
            .collect();
        edges.sort_unstable();
        edges
    }

    #[test]
    fn test_matches_levelled_on_powerset() {
        // Every 4-bit vector: the boolean lattice, cover edges flip one bit.
        let mut clustering = Clustering::new();
        for bits in 0..16usize {
            let v = BitVector::from_ones(4, (0..4).filter(|b| bits & (1 << b) != 0)).unwrap();
            clustering.insert(Element::new(bits, v)).unwrap();
        }
        let ids: Vec<ClusterId> = clustering.clusters().iter().map(|c| c.id).collect();

        let mut comparisons = 0;
        let split = build(
            clustering.clusters(),
            &ids,
            2,
            &mut Walker::new(Traversal::MaximalFirst, 0),
            &mut comparisons,
            &|_, _| Ok(()),
        )
        .unwrap();
        let flat = levelled::build(
            clustering.clusters(),
            &ids,
            &mut Walker::new(Traversal::MinimalFirst, 0),
            &mut comparisons,
            &|_, _| Ok(()),
        )
        .unwrap();

        assert_eq!(split.node_count(), 16);
        assert_eq!(sorted_edges(&split).len(), 32);
        assert_eq!(sorted_edges(&split), sorted_edges(&flat));
    }
}

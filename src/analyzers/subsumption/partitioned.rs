//! Construction over reach blocks.
//!
//! Clusters are grouped by their reach vector and each block gets its own
//! cover graph. If `x ⊂ y` then `x ⊆ y ⊆ reach(y)`, so for a non-zero `x`
//! the two blocks' reach vectors intersect and only those block pairs need
//! to be joined. The all-zero cluster sits below everything and is attached
//! to the global minima last.

use std::collections::HashMap;

use petgraph::graph::NodeIndex;
use petgraph::Direction;

use super::frontier::{Closure, LocalGraph, Walker};
use super::{build_local, Checkpoint};
use crate::cluster::{Cluster, ClusterId, Trie};
use crate::config::GraphConfig;
use crate::core::{BitVector, Result};

struct Block<'c> {
    reach: &'c BitVector,
    members: Vec<ClusterId>,
    graph: LocalGraph,
}

/// Build the cover graph over `ids`, returning it with the block count.
pub(crate) fn build(
    clusters: &[Cluster],
    ids: &[ClusterId],
    config: &GraphConfig,
    walker: &mut Walker,
    comparisons: &mut u64,
    checkpoint: Checkpoint<'_>,
) -> Result<(LocalGraph, usize)> {
    let mut trie: Trie<usize> = Trie::new();
    let mut blocks: Vec<Block<'_>> = Vec::new();
    let mut zero = None;
    for &id in ids {
        let cluster = &clusters[id.index()];
        if cluster.is_equivalent() {
            zero = Some(id);
            continue;
        }
        let next = blocks.len();
        let (&mut b, fresh) = trie.get_or_insert_with(&cluster.reach, || next)?;
        if fresh {
            blocks.push(Block {
                reach: &cluster.reach,
                members: Vec::new(),
                graph: LocalGraph::new(),
            });
        }
        blocks[b].members.push(id);
    }
    tracing::debug!(blocks = blocks.len(), "partitioned clusters by reach");

    let total = blocks.len() * 2;
    for (b, block) in blocks.iter_mut().enumerate() {
        checkpoint(b, total)?;
        block.graph = build_local(
            config.strategy,
            config.leaf_size,
            clusters,
            &block.members,
            walker,
            comparisons,
            &|_, _| Ok(()),
        )?;
    }

    let mut compatible = vec![Vec::new(); blocks.len()];
    for a in 0..blocks.len() {
        for b in (a + 1)..blocks.len() {
            if blocks[a].reach.intersects(blocks[b].reach)? {
                compatible[a].push(b);
                compatible[b].push(a);
            }
        }
    }

    let mut graph = LocalGraph::with_capacity(ids.len(), ids.len());
    let at: HashMap<ClusterId, NodeIndex> =
        ids.iter().map(|&id| (id, graph.add_node(id))).collect();

    for (b, block) in blocks.iter().enumerate() {
        checkpoint(blocks.len() + b, total)?;
        for v in block.graph.node_indices() {
            let x = block.graph[v];
            let xv = &clusters[x.index()].vector;

            let mut candidates: Vec<ClusterId> = block
                .graph
                .neighbors_directed(v, Direction::Outgoing)
                .map(|w| block.graph[w])
                .collect();
            for &c in &compatible[b] {
                let other = &blocks[c];
                *comparisons += 1;
                if !xv.is_subset_of_unchecked(other.reach) {
                    continue;
                }
                let found = walker.search(&other.graph, Closure::Upward, |y| {
                    xv.is_subset_of_unchecked(&clusters[y.index()].vector)
                });
                *comparisons += found.comparisons;
                candidates.extend(found.nodes.iter().map(|&w| other.graph[w]));
            }

            for y in minimal_among(clusters, &candidates, comparisons) {
                graph.add_edge(at[&x], at[&y], ());
            }
        }
    }

    if let Some(z) = zero {
        let bottom = at[&z];
        let minima: Vec<NodeIndex> = graph
            .externals(Direction::Incoming)
            .filter(|&n| n != bottom)
            .collect();
        for n in minima {
            graph.add_edge(bottom, n, ());
        }
    }
    Ok((graph, blocks.len()))
}

/// Candidates with no other candidate strictly below them.
fn minimal_among(clusters: &[Cluster], candidates: &[ClusterId], comparisons: &mut u64) -> Vec<ClusterId> {
    if candidates.len() < 2 {
        return candidates.to_vec();
    }
    let mut keep = Vec::with_capacity(candidates.len());
    for &y in candidates {
        let yv = &clusters[y.index()].vector;
        let covered = candidates.iter().filter(|&&z| z != y).any(|z| {
            *comparisons += 1;
            clusters[z.index()].vector.is_subset_of_unchecked(yv)
        });
        if !covered {
            keep.push(y);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Clustering;
    use crate::config::{Strategy, Traversal};
    use crate::core::Element;

    fn edges(graph: &LocalGraph) -> Vec<(usize, usize)> {
        let mut edges: Vec<(usize, usize)> = graph
            .raw_edges()
            .iter()
            .map(|e| (graph[e.source()].index(), graph[e.target()].index()))
            .collect();
        edges.sort_unstable();
        edges
    }

    fn sample() -> Clustering {
        // Reach over probes {0,1,2} and {2,3}, sharing probe 2.
        let rows = [
            ("1000", "1110"),
            ("1100", "1110"),
            ("0010", "1110"),
            ("1110", "1110"),
            ("0011", "0011"),
            ("0010", "0011"),
            ("0001", "0011"),
            ("0000", "0011"),
        ];
        let mut clustering = Clustering::new();
        for (id, (outcome, reach)) in rows.iter().enumerate() {
            clustering
                .insert(Element::new(id, outcome.parse().unwrap()).with_reach(reach.parse().unwrap()))
                .unwrap();
        }
        clustering
    }

    #[test]
    fn test_matches_whole_universe() {
        let clustering = sample();
        let ids: Vec<ClusterId> = clustering.clusters().iter().map(|c| c.id).collect();
        let config = GraphConfig {
            partition_by_reach: true,
            ..GraphConfig::default()
        };

        let mut comparisons = 0;
        let (split, blocks) = build(
            clustering.clusters(),
            &ids,
            &config,
            &mut Walker::new(Traversal::MaximalFirst, 0),
            &mut comparisons,
            &|_, _| Ok(()),
        )
        .unwrap();
        let whole = build_local(
            Strategy::Exhaustive,
            config.leaf_size,
            clustering.clusters(),
            &ids,
            &mut Walker::new(Traversal::MaximalFirst, 0),
            &mut comparisons,
            &|_, _| Ok(()),
        )
        .unwrap();

        // "0010" is seen under both reach vectors; its cluster reach is the
        // union, which makes it a block of its own.
        assert_eq!(blocks, 3);
        assert_eq!(edges(&split), edges(&whole));
    }

    #[test]
    fn test_minimal_among() {
        let clustering = sample();
        let mut comparisons = 0;
        // 1100 ⊂ 1110, 0011 incomparable with both.
        let kept = minimal_among(
            clustering.clusters(),
            &[ClusterId(3), ClusterId(1), ClusterId(4)],
            &mut comparisons,
        );
        assert_eq!(kept, vec![ClusterId(1), ClusterId(4)]);
        assert!(comparisons > 0);
    }
}

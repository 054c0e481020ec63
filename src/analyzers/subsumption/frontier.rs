//! Frontier search over a partially built cover graph.
//!
//! Given a cover graph `G` (edge `a -> b` means `a ⊂ b`) and a predicate that
//! is upward closed in `G` (once true at `y`, true at everything above `y`),
//! find the minimal nodes satisfying it. The downward-closed mirror finds the
//! maximal nodes instead. This is the `DirectlyAbove(x)` / `DirectlyBelow(x)`
//! step of every construction strategy.
//!
//! Each node is resolved once. A node is only visited after all of its
//! neighbours on the side the sweep starts from are resolved, so one
//! comparison at a node can settle a whole region:
//!
//! - a node inside the set rules out its neighbours further out as answers,
//! - a node outside the set rules out everything further in.

use std::collections::VecDeque;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::cluster::ClusterId;
use crate::config::Traversal;

/// Cover graph over a subset of clusters; node weights are cluster ids.
pub(crate) type LocalGraph = DiGraph<ClusterId, ()>;

/// Direction in which the searched set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Closure {
    /// Closed toward supersets; the answer is the set's minimal nodes.
    Upward,
    /// Closed toward subsets; the answer is the set's maximal nodes.
    Downward,
}

impl Closure {
    /// Edge direction pointing away from the answer, deeper into the set.
    fn outward(self) -> Direction {
        match self {
            Self::Upward => Direction::Outgoing,
            Self::Downward => Direction::Incoming,
        }
    }
}

/// Result of one search.
#[derive(Debug, Default)]
pub(crate) struct Found {
    /// Answer nodes, ascending.
    pub nodes: Vec<NodeIndex>,
    /// Predicate evaluations performed.
    pub comparisons: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unknown,
    Inside,
    Outside,
}

#[derive(Debug, Clone, Copy)]
enum Sweep {
    /// Start at nodes with no outward neighbour and move inward.
    Outermost,
    /// Start at nodes with no inward neighbour and move outward.
    Innermost,
    Shuffled,
}

/// Frontier searcher carrying the traversal order and its random source.
#[derive(Debug, Clone)]
pub(crate) struct Walker {
    traversal: Traversal,
    rng: StdRng,
}

impl Walker {
    pub(crate) fn new(traversal: Traversal, seed: u64) -> Self {
        Self {
            traversal,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Minimal (for [`Closure::Upward`]) or maximal nodes of `graph` for
    /// which `inside` holds.
    pub(crate) fn search<F>(&mut self, graph: &LocalGraph, closure: Closure, inside: F) -> Found
    where
        F: FnMut(ClusterId) -> bool,
    {
        let sweep = match (self.traversal, closure) {
            (Traversal::Randomized, _) => Sweep::Shuffled,
            (Traversal::MaximalFirst, Closure::Upward)
            | (Traversal::MinimalFirst, Closure::Downward) => Sweep::Outermost,
            (Traversal::MinimalFirst, Closure::Upward)
            | (Traversal::MaximalFirst, Closure::Downward) => Sweep::Innermost,
        };

        let mut search = Search::new(graph, closure);
        match sweep {
            Sweep::Outermost => search.outermost(inside),
            Sweep::Innermost => search.innermost(inside),
            Sweep::Shuffled => {
                let mut order: Vec<NodeIndex> = graph.node_indices().collect();
                order.shuffle(&mut self.rng);
                search.shuffled(order, inside)
            }
        }
        search.finish()
    }
}

struct Search<'g> {
    graph: &'g LocalGraph,
    outward: Direction,
    inward: Direction,
    marks: Vec<Mark>,
    answer: Vec<bool>,
    comparisons: u64,
}

impl<'g> Search<'g> {
    fn new(graph: &'g LocalGraph, closure: Closure) -> Self {
        let outward = closure.outward();
        Self {
            graph,
            outward,
            inward: outward.opposite(),
            marks: vec![Mark::Unknown; graph.node_count()],
            answer: vec![false; graph.node_count()],
            comparisons: 0,
        }
    }

    fn outermost<F: FnMut(ClusterId) -> bool>(&mut self, mut inside: F) {
        let (graph, outward, inward) = (self.graph, self.outward, self.inward);
        for v in self.topological(outward) {
            if self.marks[v.index()] != Mark::Unknown {
                continue;
            }
            self.comparisons += 1;
            if inside(graph[v]) {
                self.marks[v.index()] = Mark::Inside;
                self.answer[v.index()] = true;
                for w in graph.neighbors_directed(v, outward) {
                    self.answer[w.index()] = false;
                }
            } else {
                self.spread(v, inward, Mark::Outside);
            }
        }
    }

    fn innermost<F: FnMut(ClusterId) -> bool>(&mut self, mut inside: F) {
        let (graph, outward, inward) = (self.graph, self.outward, self.inward);
        for v in self.topological(inward) {
            if self.marks[v.index()] != Mark::Unknown {
                continue;
            }
            self.comparisons += 1;
            if inside(graph[v]) {
                self.answer[v.index()] = true;
                self.spread(v, outward, Mark::Inside);
            } else {
                self.marks[v.index()] = Mark::Outside;
            }
        }
    }

    fn shuffled<F: FnMut(ClusterId) -> bool>(&mut self, order: Vec<NodeIndex>, mut inside: F) {
        let (graph, outward, inward) = (self.graph, self.outward, self.inward);
        for v in order {
            if self.marks[v.index()] != Mark::Unknown {
                continue;
            }
            self.comparisons += 1;
            if inside(graph[v]) {
                self.answer[v.index()] = true;
                self.spread(v, outward, Mark::Inside);
            } else {
                self.spread(v, inward, Mark::Outside);
            }
        }
    }

    /// Nodes ordered so each one comes after all its `from`-side neighbours.
    fn topological(&self, from: Direction) -> Vec<NodeIndex> {
        let graph = self.graph;
        let mut pending: Vec<usize> = graph
            .node_indices()
            .map(|v| graph.neighbors_directed(v, from).count())
            .collect();
        let mut queue: VecDeque<NodeIndex> = graph
            .node_indices()
            .filter(|v| pending[v.index()] == 0)
            .collect();
        let mut order = Vec::with_capacity(graph.node_count());
        while let Some(v) = queue.pop_front() {
            order.push(v);
            for w in graph.neighbors_directed(v, from.opposite()) {
                pending[w.index()] -= 1;
                if pending[w.index()] == 0 {
                    queue.push_back(w);
                }
            }
        }
        order
    }

    /// Mark `start` and every still-unknown node reachable from it along
    /// `direction`. `start` itself keeps an existing mark.
    fn spread(&mut self, start: NodeIndex, direction: Direction, mark: Mark) {
        if self.marks[start.index()] == Mark::Unknown {
            self.marks[start.index()] = mark;
        }
        let graph = self.graph;
        let mut stack = vec![start];
        while let Some(v) = stack.pop() {
            for w in graph.neighbors_directed(v, direction) {
                if self.marks[w.index()] == Mark::Unknown {
                    self.marks[w.index()] = mark;
                    stack.push(w);
                }
            }
        }
    }

    /// Drop answer nodes reachable outward from another answer node.
    fn finish(mut self) -> Found {
        let (graph, outward) = (self.graph, self.outward);
        let seeds: Vec<NodeIndex> = graph
            .node_indices()
            .filter(|v| self.answer[v.index()])
            .collect();
        if seeds.len() > 1 {
            let mut seen = vec![false; graph.node_count()];
            let mut stack: Vec<NodeIndex> = seeds
                .iter()
                .flat_map(|&v| graph.neighbors_directed(v, outward))
                .collect();
            while let Some(v) = stack.pop() {
                if std::mem::replace(&mut seen[v.index()], true) {
                    continue;
                }
                self.answer[v.index()] = false;
                stack.extend(graph.neighbors_directed(v, outward));
            }
        }
        Found {
            nodes: seeds
                .into_iter()
                .filter(|v| self.answer[v.index()])
                .collect(),
            comparisons: self.comparisons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Chain 0 -> 1 -> 2 plus a side node 3 above 0.
    fn sample() -> LocalGraph {
        let mut graph = LocalGraph::new();
        let n: Vec<NodeIndex> = (0..4).map(|i| graph.add_node(ClusterId(i))).collect();
        graph.add_edge(n[0], n[1], ());
        graph.add_edge(n[1], n[2], ());
        graph.add_edge(n[0], n[3], ());
        graph
    }

    fn ids(graph: &LocalGraph, found: &Found) -> Vec<usize> {
        found.nodes.iter().map(|&v| graph[v].index()).collect()
    }

    const ALL: [Traversal; 3] = [
        Traversal::MaximalFirst,
        Traversal::MinimalFirst,
        Traversal::Randomized,
    ];

    #[test]
    fn test_upward_minimal_answer() {
        let graph = sample();
        for traversal in ALL {
            let mut walker = Walker::new(traversal, 3);
            let found = walker.search(&graph, Closure::Upward, |c| c.index() != 0);
            assert_eq!(ids(&graph, &found), vec![1, 3], "{traversal}");
        }
    }

    #[test]
    fn test_downward_maximal_answer() {
        let graph = sample();
        for traversal in ALL {
            let mut walker = Walker::new(traversal, 11);
            let found = walker.search(&graph, Closure::Downward, |c| c.index() <= 1);
            assert_eq!(ids(&graph, &found), vec![1], "{traversal}");
        }
    }

    #[test]
    fn test_empty_answer() {
        let graph = sample();
        for traversal in ALL {
            let found = Walker::new(traversal, 0).search(&graph, Closure::Upward, |_| false);
            assert!(found.nodes.is_empty());
        }
    }

    #[test]
    fn test_maximal_first_prunes_below_non_members() {
        let graph = sample();
        let found = Walker::new(Traversal::MaximalFirst, 0).search(&graph, Closure::Upward, |_| false);
        // Nodes 2 and 3 are compared; 1 and 0 sit below node 2 and are pruned.
        assert_eq!(found.comparisons, 2);
    }

    #[test]
    fn test_empty_graph() {
        let graph = LocalGraph::new();
        let found = Walker::new(Traversal::MinimalFirst, 0).search(&graph, Closure::Upward, |_| true);
        assert!(found.nodes.is_empty());
        assert_eq!(found.comparisons, 0);
    }
}

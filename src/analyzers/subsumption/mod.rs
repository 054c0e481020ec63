//! Mutant subsumption graph.
//!
//! Mutant `a` subsumes mutant `b` when every probe that kills `a` also kills
//! `b`, i.e. when the outcome vector of `a` is a subset of the outcome vector
//! of `b`. Elements with identical vectors are clustered first; the graph
//! then holds only the cover edges of the inclusion order between clusters
//! (its transitive reduction). An edge `x -> y` means `x ⊂ y`.
//!
//! Construction runs as an explicit session through [`GraphBuilder`]:
//! `open`, feed elements, `build`, query, then `close` or `clear`.

mod divide;
mod exhaustive;
mod frontier;
mod levelled;
mod partitioned;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;

use self::frontier::{LocalGraph, Walker};
use super::Checkpoint;
use crate::cluster::{Cluster, ClusterId, Clustering, Hierarchy};
use crate::config::{Config, GraphConfig, Strategy, Traversal};
use crate::core::{
    AnalysisContext, Analyzer as AnalyzerTrait, BitVector, Element, ElementId, ElementSource,
    Error, Result, Summary,
};

/// Build the cover graph over `ids` with one whole-universe strategy.
pub(crate) fn build_local(
    strategy: Strategy,
    leaf_size: usize,
    clusters: &[Cluster],
    ids: &[ClusterId],
    walker: &mut Walker,
    comparisons: &mut u64,
    checkpoint: Checkpoint<'_>,
) -> Result<LocalGraph> {
    match strategy {
        Strategy::Exhaustive => exhaustive::build(clusters, ids, comparisons, checkpoint),
        Strategy::Levelled => levelled::build(clusters, ids, walker, comparisons, checkpoint),
        Strategy::DivideAndConquer => {
            divide::build(clusters, ids, leaf_size, walker, comparisons, checkpoint)
        }
    }
}

/// How a graph was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    /// Strategy used per block.
    pub strategy: Strategy,
    /// Frontier traversal order.
    pub traversal: Traversal,
    /// Reach blocks built separately; 1 for a whole-universe build.
    pub blocks: usize,
    /// Inclusion tests performed.
    pub comparisons: u64,
}

/// Aggregate counts over a built graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphSummary {
    /// Elements consumed.
    pub elements: usize,
    /// Distinct outcome vectors.
    pub clusters: usize,
    /// Cover edges.
    pub edges: usize,
    /// Distinct degrees.
    pub levels: usize,
    /// Clusters with no incoming edge.
    pub minimal: usize,
    /// Clusters with no outgoing edge.
    pub maximal: usize,
    /// Elements killed by at least one probe.
    pub killed_elements: usize,
    /// Elements killed by no probe.
    pub equivalent_elements: usize,
    /// Inclusion tests performed during the build.
    pub comparisons: u64,
}

/// Cover-edge DAG over the clusters of one analysis run.
///
/// Node `i` of the underlying graph is cluster `ClusterId(i)`.
#[derive(Debug, Clone)]
pub struct SubsumptionGraph {
    clusters: Vec<Cluster>,
    index: HashMap<ElementId, ClusterId>,
    hierarchy: Hierarchy,
    graph: DiGraph<ClusterId, ()>,
    stats: BuildStats,
}

impl SubsumptionGraph {
    fn assemble(clustering: Clustering, local: &LocalGraph, stats: BuildStats) -> Self {
        let hierarchy = clustering.hierarchy();
        let (clusters, index) = clustering.into_parts();

        let mut edges: Vec<(usize, usize)> = local
            .raw_edges()
            .iter()
            .map(|e| (local[e.source()].index(), local[e.target()].index()))
            .collect();
        edges.sort_unstable();

        let mut graph = DiGraph::with_capacity(clusters.len(), edges.len());
        for cluster in &clusters {
            graph.add_node(cluster.id);
        }
        for (a, b) in edges {
            graph.add_edge(NodeIndex::new(a), NodeIndex::new(b), ());
        }

        Self {
            clusters,
            index,
            hierarchy,
            graph,
            stats,
        }
    }

    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// True if the graph has no clusters.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Number of elements across all clusters.
    pub fn element_count(&self) -> usize {
        self.index.len()
    }

    /// All clusters, indexed by [`ClusterId`].
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Cluster by id.
    pub fn cluster(&self, id: ClusterId) -> Result<&Cluster> {
        self.clusters
            .get(id.index())
            .ok_or_else(|| Error::out_of_range(id.index(), self.clusters.len()))
    }

    /// Cluster owning `element`.
    pub fn cluster_of(&self, element: ElementId) -> Option<&Cluster> {
        self.index.get(&element).map(|id| &self.clusters[id.index()])
    }

    /// Cover edges `(x, y)` with `x ⊂ y`, ascending.
    pub fn edges(&self) -> impl Iterator<Item = (ClusterId, ClusterId)> + '_ {
        self.graph
            .raw_edges()
            .iter()
            .map(|e| (self.graph[e.source()], self.graph[e.target()]))
    }

    /// Number of cover edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Clusters directly above `id`.
    pub fn covers(&self, id: ClusterId) -> Result<Vec<ClusterId>> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Clusters directly below `id`.
    pub fn covered_by(&self, id: ClusterId) -> Result<Vec<ClusterId>> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Clusters with no cluster strictly below them.
    pub fn minimal(&self) -> Vec<ClusterId> {
        self.externals(Direction::Incoming)
    }

    /// Clusters with no cluster strictly above them.
    pub fn maximal(&self) -> Vec<ClusterId> {
        self.externals(Direction::Outgoing)
    }

    /// Clusters grouped by degree.
    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// True if every probe killing `a` also kills `b`.
    pub fn subsumes(&self, a: ClusterId, b: ClusterId) -> Result<bool> {
        self.cluster(a)?.vector.is_subset_of(&self.cluster(b)?.vector)
    }

    /// Build statistics.
    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Underlying petgraph graph.
    pub fn as_graph(&self) -> &DiGraph<ClusterId, ()> {
        &self.graph
    }

    /// Aggregate counts.
    pub fn summary(&self) -> GraphSummary {
        let equivalent_elements = self
            .clusters
            .iter()
            .filter(|c| c.is_equivalent())
            .map(Cluster::size)
            .sum();
        GraphSummary {
            elements: self.element_count(),
            clusters: self.len(),
            edges: self.edge_count(),
            levels: self.hierarchy.len(),
            minimal: self.minimal().len(),
            maximal: self.maximal().len(),
            killed_elements: self.element_count() - equivalent_elements,
            equivalent_elements,
            comparisons: self.stats.comparisons,
        }
    }

    fn neighbors(&self, id: ClusterId, direction: Direction) -> Result<Vec<ClusterId>> {
        self.cluster(id)?;
        let mut out: Vec<ClusterId> = self
            .graph
            .neighbors_directed(NodeIndex::new(id.index()), direction)
            .map(|n| self.graph[n])
            .collect();
        out.sort_unstable();
        Ok(out)
    }

    fn externals(&self, direction: Direction) -> Vec<ClusterId> {
        self.graph
            .externals(direction)
            .map(|n| self.graph[n])
            .collect()
    }
}

impl Serialize for SubsumptionGraph {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct View<'a> {
            summary: GraphSummary,
            stats: &'a BuildStats,
            clusters: &'a [Cluster],
            edges: Vec<(ClusterId, ClusterId)>,
            minimal: Vec<ClusterId>,
            maximal: Vec<ClusterId>,
            hierarchy: &'a Hierarchy,
        }

        View {
            summary: self.summary(),
            stats: &self.stats,
            clusters: &self.clusters,
            edges: self.edges().collect(),
            minimal: self.minimal(),
            maximal: self.maximal(),
            hierarchy: &self.hierarchy,
        }
        .serialize(serializer)
    }
}

#[derive(Debug)]
enum Session {
    Closed,
    Open(Clustering),
    Built(SubsumptionGraph),
}

/// Session-based graph construction.
#[derive(Debug)]
pub struct GraphBuilder {
    config: GraphConfig,
    session: Session,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new(GraphConfig::default())
    }
}

impl GraphBuilder {
    /// Closed builder using `config`.
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            session: Session::Closed,
        }
    }

    /// Builder configuration.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// True while a session is open, built or not.
    pub fn is_open(&self) -> bool {
        !matches!(self.session, Session::Closed)
    }

    /// True once [`build`](Self::build) has succeeded in this session.
    pub fn is_built(&self) -> bool {
        matches!(self.session, Session::Built(_))
    }

    /// Start a session.
    pub fn open(&mut self) -> Result<()> {
        match self.session {
            Session::Closed => {
                self.session = Session::Open(Clustering::new());
                Ok(())
            }
            Session::Open(_) => Err(Error::runtime("session is already open")),
            Session::Built(_) => Err(Error::runtime("graph already built; clear it first")),
        }
    }

    /// Add one element, returning the cluster it joined.
    pub fn insert(&mut self, element: Element) -> Result<ClusterId> {
        self.clustering()?.insert(element)
    }

    /// Add one element from its id and outcome vector.
    pub fn add(&mut self, id: impl Into<ElementId>, outcome: BitVector) -> Result<ClusterId> {
        self.insert(Element::new(id, outcome))
    }

    /// Drain `source`, returning the number of elements consumed.
    ///
    /// All or nothing: if any element is rejected the session keeps exactly
    /// the clusters it had before the call.
    pub fn consume(&mut self, source: &mut dyn ElementSource) -> Result<usize> {
        let clustering = self.clustering()?;
        let mut staged = clustering.clone();
        let mut consumed = 0;
        while let Some(element) = source.produce() {
            staged.insert(element)?;
            consumed += 1;
        }
        *clustering = staged;
        Ok(consumed)
    }

    /// Compute the cover edges over everything inserted so far.
    pub fn build(&mut self) -> Result<&SubsumptionGraph> {
        self.build_with(&|_, _| Ok(()))
    }

    /// Like [`build`](Self::build), reporting progress to `ctx` and
    /// honouring its cancellation predicate.
    pub fn build_with_context(&mut self, ctx: &AnalysisContext<'_>) -> Result<&SubsumptionGraph> {
        self.build_with(&|done, total| {
            ctx.check_cancelled()?;
            ctx.report_progress(done, total);
            Ok(())
        })
    }

    /// The built graph.
    pub fn graph(&self) -> Result<&SubsumptionGraph> {
        match &self.session {
            Session::Built(graph) => Ok(graph),
            Session::Open(_) => Err(Error::runtime("graph is not built yet")),
            Session::Closed => Err(Error::runtime("no open session")),
        }
    }

    /// Drop all clusters and any built graph, keeping the session open.
    pub fn clear(&mut self) -> Result<()> {
        if !self.is_open() {
            return Err(Error::runtime("no open session"));
        }
        self.session = Session::Open(Clustering::new());
        Ok(())
    }

    /// End the session, handing back the graph if one was built.
    pub fn close(&mut self) -> Result<Option<SubsumptionGraph>> {
        match std::mem::replace(&mut self.session, Session::Closed) {
            Session::Closed => Err(Error::runtime("session is already closed")),
            Session::Open(_) => Ok(None),
            Session::Built(graph) => Ok(Some(graph)),
        }
    }

    fn clustering(&mut self) -> Result<&mut Clustering> {
        match &mut self.session {
            Session::Open(clustering) => Ok(clustering),
            Session::Built(_) => Err(Error::runtime("graph already built; clear it first")),
            Session::Closed => Err(Error::runtime("no open session")),
        }
    }

    fn build_with(&mut self, checkpoint: Checkpoint<'_>) -> Result<&SubsumptionGraph> {
        let clustering = match std::mem::replace(&mut self.session, Session::Closed) {
            Session::Open(clustering) => clustering,
            other => {
                self.session = other;
                return Err(match self.session {
                    Session::Built(_) => Error::runtime("graph already built; clear it first"),
                    _ => Error::runtime("no open session"),
                });
            }
        };

        match construct(&self.config, &clustering, checkpoint) {
            Ok((local, stats)) => {
                self.session = Session::Built(SubsumptionGraph::assemble(clustering, &local, stats));
                self.graph()
            }
            Err(err) => {
                self.session = Session::Open(clustering);
                Err(err)
            }
        }
    }
}

fn construct(
    config: &GraphConfig,
    clustering: &Clustering,
    checkpoint: Checkpoint<'_>,
) -> Result<(LocalGraph, BuildStats)> {
    let start = Instant::now();
    let clusters = clustering.clusters();
    let ids: Vec<ClusterId> = clusters.iter().map(|c| c.id).collect();
    let mut walker = Walker::new(config.traversal, config.seed);
    let mut comparisons = 0;

    tracing::debug!(
        clusters = ids.len(),
        strategy = %config.strategy,
        traversal = %config.traversal,
        "building subsumption graph"
    );
    if config.strategy.is_oracle() {
        tracing::warn!(
            "Strategy '{}' compares every pair of clusters; use it to cross-check, not in production",
            config.strategy
        );
    }

    let (local, blocks) = if config.partition_by_reach && clustering.has_reach() {
        partitioned::build(clusters, &ids, config, &mut walker, &mut comparisons, checkpoint)?
    } else {
        let local = build_local(
            config.strategy,
            config.leaf_size,
            clusters,
            &ids,
            &mut walker,
            &mut comparisons,
            checkpoint,
        )?;
        (local, 1)
    };
    checkpoint(ids.len(), ids.len())?;

    tracing::info!(
        "Subsumption graph built in {:?}: {} clusters, {} edges, {} comparisons",
        start.elapsed(),
        ids.len(),
        local.edge_count(),
        comparisons
    );

    let stats = BuildStats {
        strategy: config.strategy,
        traversal: config.traversal,
        blocks,
        comparisons,
    };
    Ok((local, stats))
}

/// Subsumption graph analyzer.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: Option<GraphConfig>,
}

impl Analyzer {
    /// Analyzer using the context's graph configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyzer pinned to `config`, ignoring the context's.
    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            config: Some(config),
        }
    }
}

impl AnalyzerTrait for Analyzer {
    type Output = SubsumptionGraph;

    fn name(&self) -> &'static str {
        "subsumption"
    }

    fn description(&self) -> &'static str {
        "Cluster mutants by outcome and compute the cover edges of the subsumption order"
    }

    fn analyze(
        &self,
        ctx: &AnalysisContext<'_>,
        source: &mut dyn ElementSource,
    ) -> Result<Self::Output> {
        let config = self.config.as_ref().unwrap_or(&ctx.config.graph);
        let mut builder = GraphBuilder::new(config.clone());
        builder.open()?;
        builder.consume(source)?;
        builder.build_with_context(ctx)?;
        builder
            .close()?
            .ok_or_else(|| Error::runtime("session closed without a graph"))
    }

    fn summarize(&self, output: &Self::Output) -> Summary {
        Summary::new(output.element_count(), output.stats.comparisons, Duration::ZERO)
    }

    fn configure(&mut self, config: &Config) -> Result<()> {
        self.config = Some(config.graph.clone());
        Ok(())
    }
}

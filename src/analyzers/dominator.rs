//! Dominator set extraction.
//!
//! Keeps a minimal subset of the mutants such that every other mutant killed
//! by some probe is redundant: its outcome vector contains the outcome vector
//! of a retained mutant, so any test suite killing the retained mutants kills
//! it too. Mutants killed by nothing are reported as equivalent and never
//! retained.
//!
//! Unlike the subsumption graph this works on the raw element universe, one
//! representative per distinct minimal vector.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::Checkpoint;
use crate::cluster::Trie;
use crate::config::{Config, DominatorAlgorithm, DominatorConfig};
use crate::core::{
    AnalysisContext, Analyzer as AnalyzerTrait, BitVector, Element, ElementId, ElementSet,
    ElementSource, Error, Result, Summary,
};

/// The closed set of elements an extraction runs over.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    elements: Vec<Element>,
    ids: HashSet<ElementId>,
    width: Option<usize>,
}

impl Universe {
    /// Ids index the output [`ElementSet`]s, so they must stay below this.
    pub const MAX_ID: usize = u32::MAX as usize;

    /// Empty universe; the first element fixes the vector width.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain `source` into a new universe.
    pub fn from_source(source: &mut dyn ElementSource) -> Result<Self> {
        let mut universe = Self::new();
        while let Some(element) = source.produce() {
            universe.insert(element)?;
        }
        Ok(universe)
    }

    /// Add one element.
    pub fn insert(&mut self, element: Element) -> Result<()> {
        element.validate()?;
        if element.id.index() >= Self::MAX_ID {
            return Err(Error::invalid_argument(format!(
                "element {} is beyond the id space of {} elements",
                element.id,
                Self::MAX_ID
            )));
        }
        if let Some(width) = self.width {
            if element.outcome.len() != width {
                return Err(Error::invalid_argument(format!(
                    "bit-vector length mismatch: {} vs {width}",
                    element.outcome.len()
                )));
            }
        }
        if !self.ids.insert(element.id) {
            return Err(Error::invalid_argument(format!(
                "element {} is already indexed",
                element.id
            )));
        }
        self.width = Some(element.outcome.len());
        self.elements.push(element);
        Ok(())
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Vector width, once known.
    pub fn width(&self) -> Option<usize> {
        self.width
    }

    /// Size of the id space: one past the largest id.
    pub fn capacity(&self) -> usize {
        self.elements.iter().map(|e| e.id.index() + 1).max().unwrap_or(0)
    }

    /// Elements in insertion order.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// True if some element carried a reach vector.
    pub fn has_reach(&self) -> bool {
        self.elements.iter().any(|e| e.reach.is_some())
    }
}

/// Counters collected during one extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DominatorStats {
    /// Algorithm that produced the set.
    pub algorithm: DominatorAlgorithm,
    /// Elements in the universe.
    pub elements: usize,
    /// Inclusion tests performed.
    pub comparisons: u64,
    /// Candidate-set size after each processed element, if recorded.
    pub candidate_history: Vec<usize>,
    /// Reach blocks; 1 for the greedy algorithm.
    pub blocks: usize,
}

/// Result of a dominator extraction.
#[derive(Debug, Clone, Serialize)]
pub struct DominatorSet {
    /// Retained elements.
    pub retained: ElementSet,
    /// Elements killed by no probe.
    pub equivalents: ElementSet,
    /// Number of equivalent elements.
    pub equivalent_count: usize,
    /// Extraction counters.
    pub stats: DominatorStats,
}

impl DominatorSet {
    /// Retained element ids, ascending.
    pub fn retained_ids(&self) -> Vec<ElementId> {
        self.retained.iter().collect()
    }

    /// Equivalent element ids, ascending.
    pub fn equivalent_ids(&self) -> Vec<ElementId> {
        self.equivalents.iter().collect()
    }

    /// Number of retained elements.
    pub fn len(&self) -> usize {
        self.retained.len()
    }

    /// True if nothing was retained.
    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }
}

/// Extract the dominator set of `universe`.
pub fn extract(universe: &Universe, config: &DominatorConfig) -> Result<DominatorSet> {
    extract_with(universe, config, &|_, _| Ok(()))
}

struct Tally {
    comparisons: u64,
    history: Option<Vec<usize>>,
}

impl Tally {
    fn record(&mut self, alive: &ElementSet) {
        if let Some(history) = self.history.as_mut() {
            history.push(alive.len());
        }
    }
}

fn extract_with(
    universe: &Universe,
    config: &DominatorConfig,
    checkpoint: Checkpoint<'_>,
) -> Result<DominatorSet> {
    let mut order: Vec<&Element> = universe.elements().iter().collect();
    order.sort_by_key(|e| e.id);
    let (zero, live): (Vec<&Element>, Vec<&Element>) =
        order.into_iter().partition(|e| e.outcome.is_zero());

    // Work on dense slots into `live`; ids only matter for the output sets.
    let mut alive = ElementSet::new(live.len());
    for slot in 0..live.len() {
        alive.insert(ElementId(slot))?;
    }

    let mut tally = Tally {
        comparisons: 0,
        history: config.record_history.then(Vec::new),
    };
    let blocks = match config.algorithm {
        DominatorAlgorithm::Greedy => {
            let rows: Vec<(ElementId, &BitVector)> = live
                .iter()
                .enumerate()
                .map(|(slot, e)| (ElementId(slot), &e.outcome))
                .collect();
            reduce(&rows, &mut alive, &mut tally, checkpoint)?;
            1
        }
        DominatorAlgorithm::Partitioned => partitioned(&live, &mut alive, &mut tally, checkpoint)?,
    };

    let capacity = universe.capacity();
    let mut retained = ElementSet::new(capacity);
    for slot in alive.iter() {
        retained.insert(live[slot.index()].id)?;
    }
    let mut equivalents = ElementSet::new(capacity);
    for element in &zero {
        equivalents.insert(element.id)?;
    }

    Ok(DominatorSet {
        retained,
        equivalents,
        equivalent_count: zero.len(),
        stats: DominatorStats {
            algorithm: config.algorithm,
            elements: universe.len(),
            comparisons: tally.comparisons,
            candidate_history: tally.history.unwrap_or_default(),
            blocks,
        },
    })
}

/// Greedy pass: each still-alive `m` removes every other alive row whose
/// vector contains its own.
fn reduce(
    rows: &[(ElementId, &BitVector)],
    alive: &mut ElementSet,
    tally: &mut Tally,
    checkpoint: Checkpoint<'_>,
) -> Result<()> {
    for (i, &(m, mv)) in rows.iter().enumerate() {
        checkpoint(i, rows.len())?;
        if !alive.contains_unchecked(m) {
            continue;
        }
        for &(e, ev) in rows {
            if e == m || !alive.contains_unchecked(e) {
                continue;
            }
            tally.comparisons += 1;
            if mv.is_subset_of_unchecked(ev) {
                alive.remove(e)?;
            }
        }
        tally.record(alive);
    }
    Ok(())
}

struct Block<'u> {
    reach: &'u BitVector,
    members: Vec<(ElementId, &'u Element)>,
}

/// Reduce inside each reach block on projected vectors, then across blocks
/// whose reach vectors intersect. Rows are keyed by their slot in `live`.
/// Returns the block count.
fn partitioned(
    live: &[&Element],
    alive: &mut ElementSet,
    tally: &mut Tally,
    checkpoint: Checkpoint<'_>,
) -> Result<usize> {
    let mut trie: Trie<usize> = Trie::new();
    let mut blocks: Vec<Block<'_>> = Vec::new();
    for (slot, &element) in live.iter().enumerate() {
        let reach = element.effective_reach();
        let next = blocks.len();
        let (&mut b, fresh) = trie.get_or_insert_with(reach, || next)?;
        if fresh {
            blocks.push(Block {
                reach,
                members: Vec::new(),
            });
        }
        blocks[b].members.push((ElementId(slot), element));
    }
    tracing::debug!(blocks = blocks.len(), "partitioned elements by reach");

    let total = blocks.len() * 2;
    for (b, block) in blocks.iter().enumerate() {
        checkpoint(b, total)?;
        let projected = block
            .members
            .iter()
            .map(|&(slot, e)| e.outcome.compress(block.reach).map(|v| (slot, v)))
            .collect::<Result<Vec<(ElementId, BitVector)>>>()?;
        let rows: Vec<(ElementId, &BitVector)> = projected.iter().map(|(id, v)| (*id, v)).collect();
        reduce(&rows, alive, tally, &|_, _| Ok(()))?;
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

    for (a, block) in blocks.iter().enumerate() {
        checkpoint(blocks.len() + a, total)?;
        for &(xs, x) in &block.members {
            if !alive.contains_unchecked(xs) {
                continue;
            }
            for &b in &compatible[a] {
                let other = &blocks[b];
                tally.comparisons += 1;
                if !x.outcome.is_subset_of_unchecked(other.reach) {
                    continue;
                }
                for &(ys, y) in &other.members {
                    if !alive.contains_unchecked(ys) {
                        continue;
                    }
                    tally.comparisons += 1;
                    if x.outcome.is_subset_of_unchecked(&y.outcome) {
                        alive.remove(ys)?;
                    }
                }
            }
            tally.record(alive);
        }
    }
    Ok(blocks.len())
}

/// Dominator set analyzer.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: Option<DominatorConfig>,
}

impl Analyzer {
    /// Analyzer using the context's dominator configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyzer pinned to `config`, ignoring the context's.
    pub fn with_config(config: DominatorConfig) -> Self {
        Self {
            config: Some(config),
        }
    }
}

impl AnalyzerTrait for Analyzer {
    type Output = DominatorSet;

    fn name(&self) -> &'static str {
        "dominator"
    }

    fn description(&self) -> &'static str {
        "Extract a minimal set of mutants that makes every other killable mutant redundant"
    }

    fn analyze(
        &self,
        ctx: &AnalysisContext<'_>,
        source: &mut dyn ElementSource,
    ) -> Result<Self::Output> {
        let start = Instant::now();
        let config = self.config.as_ref().unwrap_or(&ctx.config.dominator);
        let universe = Universe::from_source(source)?;

        let set = extract_with(&universe, config, &|done, total| {
            ctx.check_cancelled()?;
            ctx.report_progress(done, total);
            Ok(())
        })?;

        tracing::info!(
            "Dominator extraction completed in {:?}: {} elements, {} retained, {} equivalent, {} comparisons",
            start.elapsed(),
            universe.len(),
            set.len(),
            set.equivalent_count,
            set.stats.comparisons
        );
        Ok(set)
    }

    fn summarize(&self, output: &Self::Output) -> Summary {
        Summary::new(
            output.stats.elements,
            output.stats.comparisons,
            Duration::ZERO,
        )
    }

    fn configure(&mut self, config: &Config) -> Result<()> {
        self.config = Some(config.dominator.clone());
        Ok(())
    }
}

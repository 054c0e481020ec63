//! Deduplication of elements into clusters and stratification by degree.
//!
//! Mutants that are killed by exactly the same tests are indistinguishable
//! for subsumption purposes. [`Clustering`] groups them through a [`Trie`]
//! keyed on the outcome vector, and [`Hierarchy`] arranges the resulting
//! clusters into levels by population count.

mod trie;

pub use trie::Trie;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;

use crate::core::{BitVector, Element, ElementId, Error, Result};

/// Dense cluster identifier, assigned in order of first sight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ClusterId(pub usize);

impl ClusterId {
    /// Position of the cluster in its clustering.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// All elements sharing one bit-identical outcome vector.
#[derive(Debug, Clone, Serialize)]
pub struct Cluster {
    /// Cluster id.
    pub id: ClusterId,
    /// Shared outcome vector.
    pub vector: BitVector,
    /// Population count of `vector`.
    pub degree: usize,
    /// Members, in arrival order.
    pub members: Vec<ElementId>,
    /// Union of the members' reach vectors.
    #[serde(skip)]
    pub reach: BitVector,
}

impl Cluster {
    fn new(id: ClusterId, element: Element) -> Self {
        let reach = element.reach.unwrap_or_else(|| element.outcome.clone());
        Self {
            id,
            degree: element.outcome.popcount(),
            vector: element.outcome,
            members: vec![element.id],
            reach,
        }
    }

    /// Killed by no probe at all.
    pub fn is_equivalent(&self) -> bool {
        self.degree == 0
    }

    /// Number of member elements.
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// Trie-backed grouping of a stream of elements into clusters.
#[derive(Debug, Clone, Default)]
pub struct Clustering {
    trie: Trie<ClusterId>,
    clusters: Vec<Cluster>,
    index: HashMap<ElementId, ClusterId>,
    has_reach: bool,
}

impl Clustering {
    /// Empty clustering; the first element fixes the vector width.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty clustering accepting only `width`-bit vectors.
    pub fn with_width(width: usize) -> Self {
        Self {
            trie: Trie::with_width(width),
            ..Self::default()
        }
    }

    /// Absorb one element, returning the cluster it joined.
    ///
    /// Rejects duplicate ids, width mismatches and reach vectors that do not
    /// cover the outcome vector, all before anything is modified.
    pub fn insert(&mut self, element: Element) -> Result<ClusterId> {
        element.validate()?;
        if self.index.contains_key(&element.id) {
            return Err(Error::invalid_argument(format!(
                "element {} is already indexed",
                element.id
            )));
        }

        let next = ClusterId(self.clusters.len());
        let (&mut id, fresh) = self.trie.get_or_insert_with(&element.outcome, || next)?;

        self.has_reach |= element.reach.is_some();
        self.index.insert(element.id, id);
        if fresh {
            self.clusters.push(Cluster::new(id, element));
        } else {
            let cluster = &mut self.clusters[id.index()];
            cluster.reach.union_with(element.effective_reach())?;
            cluster.members.push(element.id);
        }
        Ok(id)
    }

    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// True if no element was inserted.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Number of elements absorbed.
    pub fn element_count(&self) -> usize {
        self.index.len()
    }

    /// Vector width, once known.
    pub fn width(&self) -> Option<usize> {
        self.trie.width()
    }

    /// True if any element carried a reach vector.
    pub fn has_reach(&self) -> bool {
        self.has_reach
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

    /// Cluster id owning the outcome vector `vector`, if seen.
    pub fn find(&self, vector: &BitVector) -> Result<Option<ClusterId>> {
        Ok(self.trie.get(vector)?.copied())
    }

    /// Stratify the current clusters by degree.
    pub fn hierarchy(&self) -> Hierarchy {
        Hierarchy::build(&self.clusters)
    }

    pub(crate) fn into_parts(self) -> (Vec<Cluster>, HashMap<ElementId, ClusterId>) {
        (self.clusters, self.index)
    }
}

/// Clusters sharing one degree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyLevel {
    /// Population count shared by every cluster on the level.
    pub degree: usize,
    /// Clusters on the level, ascending by id.
    pub clusters: Vec<ClusterId>,
}

/// Clusters grouped into levels by degree, ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Hierarchy {
    levels: Vec<HierarchyLevel>,
}

impl Hierarchy {
    /// Group `clusters` by degree.
    pub fn build(clusters: &[Cluster]) -> Self {
        let mut by_degree: BTreeMap<usize, Vec<ClusterId>> = BTreeMap::new();
        for cluster in clusters {
            by_degree.entry(cluster.degree).or_default().push(cluster.id);
        }
        Self {
            levels: by_degree
                .into_iter()
                .map(|(degree, clusters)| HierarchyLevel { degree, clusters })
                .collect(),
        }
    }

    /// Levels, ascending by degree.
    pub fn levels(&self) -> &[HierarchyLevel] {
        &self.levels
    }

    /// Number of distinct degrees.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// True if there are no clusters.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Level holding clusters of exactly `degree`.
    pub fn level(&self, degree: usize) -> Option<&HierarchyLevel> {
        self.levels
            .binary_search_by_key(&degree, |l| l.degree)
            .ok()
            .map(|i| &self.levels[i])
    }

    /// Cluster ids from the highest degree down to the lowest.
    pub fn descending(&self) -> impl Iterator<Item = ClusterId> + '_ {
        self.levels
            .iter()
            .rev()
            .flat_map(|level| level.clusters.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(id: usize, outcome: &str) -> Element {
        Element::new(id, outcome.parse().unwrap())
    }

    fn scenario() -> Clustering {
        let mut clustering = Clustering::new();
        for (id, v) in ["1111", "1100", "1110", "0000", "1111"].iter().enumerate() {
            clustering.insert(element(id, v)).unwrap();
        }
        clustering
    }

    #[test]
    fn test_scenario_clusters() {
        let clustering = scenario();
        assert_eq!(clustering.len(), 4);
        assert_eq!(clustering.element_count(), 5);

        let ca = clustering.cluster_of(ElementId(0)).unwrap();
        assert_eq!(ca.members, vec![ElementId(0), ElementId(4)]);
        assert_eq!(ca.degree, 4);
        assert_eq!(clustering.cluster_of(ElementId(1)).unwrap().degree, 2);
        assert_eq!(clustering.cluster_of(ElementId(2)).unwrap().degree, 3);
        assert!(clustering.cluster_of(ElementId(3)).unwrap().is_equivalent());
        assert!(clustering.cluster_of(ElementId(9)).is_none());
    }

    #[test]
    fn test_duplicate_id_rejected_without_side_effects() {
        let mut clustering = scenario();
        let err = clustering.insert(element(1, "0001")).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(clustering.len(), 4);
        assert_eq!(clustering.find(&"0001".parse().unwrap()).unwrap(), None);
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let mut clustering = scenario();
        assert!(clustering.insert(element(7, "111")).is_err());
        assert!(clustering.cluster_of(ElementId(7)).is_none());
        assert_eq!(clustering.element_count(), 5);
    }

    #[test]
    fn test_reach_union() {
        let mut clustering = Clustering::new();
        clustering
            .insert(element(0, "0100").with_reach("0110".parse().unwrap()))
            .unwrap();
        clustering
            .insert(element(1, "0100").with_reach("1100".parse().unwrap()))
            .unwrap();
        clustering.insert(element(2, "0001")).unwrap();
        assert!(clustering.has_reach());
        assert_eq!(clustering.clusters()[0].reach.to_string(), "1110");
        assert_eq!(clustering.clusters()[1].reach.to_string(), "0001");
    }

    #[test]
    fn test_cluster_out_of_range() {
        let clustering = scenario();
        assert!(matches!(
            clustering.cluster(ClusterId(4)),
            Err(Error::OutOfRange { index: 4, len: 4 })
        ));
    }

    #[test]
    fn test_hierarchy_levels() {
        let hierarchy = scenario().hierarchy();
        let degrees: Vec<usize> = hierarchy.levels().iter().map(|l| l.degree).collect();
        assert_eq!(degrees, vec![0, 2, 3, 4]);
        assert_eq!(hierarchy.level(3).unwrap().clusters, vec![ClusterId(2)]);
        assert!(hierarchy.level(1).is_none());
        let order: Vec<ClusterId> = hierarchy.descending().collect();
        assert_eq!(
            order,
            vec![ClusterId(0), ClusterId(2), ClusterId(1), ClusterId(3)]
        );
    }
}

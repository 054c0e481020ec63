use std::collections::BTreeSet;

use proptest::prelude::*;

use subsume::analyzers::dominator::{self, Universe};
use subsume::analyzers::subsumption::{GraphBuilder, SubsumptionGraph};
use subsume::cluster::{ClusterId, Clustering};
use subsume::config::{
    DominatorAlgorithm, DominatorConfig, GraphConfig, Strategy as BuildStrategy, Traversal,
};
use subsume::{BitVector, Element, ElementId};

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn vector(width: usize) -> impl Strategy<Value = BitVector> {
    prop::collection::vec(any::<bool>(), width).prop_map(|bits| BitVector::from_bits(&bits))
}

/// Outcome vectors of one width, few enough bits that collisions and
/// comparable pairs are common.
fn outcomes() -> impl Strategy<Value = Vec<BitVector>> {
    (1usize..7).prop_flat_map(|width| prop::collection::vec(vector(width), 0..28))
}

/// `(outcome, reach)` rows; reach is the outcome plus a few extra probes.
fn rows_with_reach() -> impl Strategy<Value = Vec<(BitVector, BitVector)>> {
    (1usize..7).prop_flat_map(|width| {
        prop::collection::vec(
            (vector(width), vector(width)).prop_map(|(outcome, extra)| {
                let reach = outcome.or(&extra).unwrap();
                (outcome, reach)
            }),
            0..24,
        )
    })
}

fn elements(outcomes: &[BitVector]) -> Vec<Element> {
    outcomes
        .iter()
        .enumerate()
        .map(|(id, v)| Element::new(id, v.clone()))
        .collect()
}

fn build(elements: Vec<Element>, config: GraphConfig) -> SubsumptionGraph {
    let mut builder = GraphBuilder::new(config);
    builder.open().unwrap();
    builder.consume(&mut elements.into_iter()).unwrap();
    builder.build().unwrap();
    builder.close().unwrap().unwrap()
}

fn edge_vectors(graph: &SubsumptionGraph) -> BTreeSet<(String, String)> {
    graph
        .edges()
        .map(|(a, b)| {
            (
                graph.clusters()[a.index()].vector.to_string(),
                graph.clusters()[b.index()].vector.to_string(),
            )
        })
        .collect()
}

fn strictly_below(a: &BitVector, b: &BitVector) -> bool {
    a != b && a.is_subset_of(b).unwrap()
}

// ---------------------------------------------------------------------------
// Bit vector laws
// ---------------------------------------------------------------------------

proptest! {
    /// Inclusion is reflexive, antisymmetric and transitive.
    #[test]
    fn inclusion_is_partial_order(
        (a, b, c) in (1usize..40).prop_flat_map(|w| (vector(w), vector(w), vector(w)))
    ) {
        prop_assert!(a.is_subset_of(&a).unwrap());
        if a.is_subset_of(&b).unwrap() && b.is_subset_of(&a).unwrap() {
            prop_assert_eq!(&a, &b);
        }
        if a.is_subset_of(&b).unwrap() && b.is_subset_of(&c).unwrap() {
            prop_assert!(a.is_subset_of(&c).unwrap());
        }
        prop_assert_eq!(a.is_subset_of(&b).unwrap(), a.and(&b).unwrap() == a);
    }

    /// Popcount matches the number of set positions, and the complement
    /// accounts for every other bit.
    #[test]
    fn popcount_and_not(v in (0usize..70).prop_flat_map(vector)) {
        prop_assert_eq!(v.popcount(), v.ones().count());
        prop_assert_eq!(v.popcount() + v.not().popcount(), v.len());
        prop_assert!(v.and(&v.not()).unwrap().is_zero());
    }

    /// Text form parses back to the same vector.
    #[test]
    fn display_parses_back(v in (0usize..50).prop_flat_map(vector)) {
        let parsed: BitVector = v.to_string().parse().unwrap();
        prop_assert_eq!(parsed, v);
    }
}

// ---------------------------------------------------------------------------
// Clustering
// ---------------------------------------------------------------------------

fn partition(outcomes: &[BitVector], order: &[usize]) -> BTreeSet<Vec<usize>> {
    let mut clustering = Clustering::new();
    for &i in order {
        clustering
            .insert(Element::new(i, outcomes[i].clone()))
            .unwrap();
    }
    clustering
        .clusters()
        .iter()
        .map(|c| {
            let mut members: Vec<usize> = c.members.iter().map(|m| m.index()).collect();
            members.sort_unstable();
            members
        })
        .collect()
}

proptest! {
    /// Any arrival order yields the same partition into clusters.
    #[test]
    fn clustering_is_permutation_invariant(
        (outcomes, order) in outcomes().prop_flat_map(|o| {
            let n = o.len();
            (Just(o), Just((0..n).collect::<Vec<usize>>()).prop_shuffle())
        })
    ) {
        let forward: Vec<usize> = (0..outcomes.len()).collect();
        prop_assert_eq!(partition(&outcomes, &forward), partition(&outcomes, &order));
    }

    /// One cluster per distinct vector, each holding exactly its elements.
    #[test]
    fn clusters_are_distinct_vectors(outcomes in outcomes()) {
        let mut clustering = Clustering::new();
        for e in elements(&outcomes) {
            clustering.insert(e).unwrap();
        }
        let distinct: BTreeSet<String> = outcomes.iter().map(|v| v.to_string()).collect();
        prop_assert_eq!(clustering.len(), distinct.len());
        for (i, v) in outcomes.iter().enumerate() {
            let cluster = clustering.cluster_of(ElementId(i)).unwrap();
            prop_assert_eq!(&cluster.vector, v);
            prop_assert_eq!(cluster.degree, v.popcount());
        }
    }
}

// ---------------------------------------------------------------------------
// Subsumption graph
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Every strategy and traversal produces the exhaustive oracle's edges.
    #[test]
    fn strategies_agree(outcomes in outcomes(), seed in any::<u64>()) {
        let oracle = build(elements(&outcomes), GraphConfig {
            strategy: BuildStrategy::Exhaustive,
            ..GraphConfig::default()
        });
        let expected = edge_vectors(&oracle);

        for strategy in [BuildStrategy::Levelled, BuildStrategy::DivideAndConquer] {
            for traversal in [Traversal::MinimalFirst, Traversal::MaximalFirst, Traversal::Randomized] {
                let graph = build(elements(&outcomes), GraphConfig {
                    strategy,
                    traversal,
                    seed,
                    leaf_size: 3,
                    ..GraphConfig::default()
                });
                prop_assert_eq!(graph.len(), oracle.len());
                prop_assert_eq!(&edge_vectors(&graph), &expected, "{} {}", strategy, traversal);
            }
        }
    }

    /// Edges are exactly the cover pairs of the inclusion order.
    #[test]
    fn edges_are_exactly_covers(outcomes in outcomes()) {
        let graph = build(elements(&outcomes), GraphConfig::default());
        let clusters = graph.clusters();
        let edges: BTreeSet<(ClusterId, ClusterId)> = graph.edges().collect();

        for x in clusters {
            for y in clusters {
                let covers = strictly_below(&x.vector, &y.vector)
                    && !clusters.iter().any(|z| {
                        strictly_below(&x.vector, &z.vector) && strictly_below(&z.vector, &y.vector)
                    });
                prop_assert_eq!(edges.contains(&(x.id, y.id)), covers, "{} -> {}", x.vector, y.vector);
            }
        }
    }

    /// Minimal and maximal clusters match their order-theoretic definition.
    #[test]
    fn minimal_and_maximal_are_correct(outcomes in outcomes()) {
        let graph = build(elements(&outcomes), GraphConfig {
            traversal: Traversal::MinimalFirst,
            ..GraphConfig::default()
        });
        let clusters = graph.clusters();
        let minimal: BTreeSet<ClusterId> = graph.minimal().into_iter().collect();
        let maximal: BTreeSet<ClusterId> = graph.maximal().into_iter().collect();
        for x in clusters {
            let has_below = clusters.iter().any(|z| strictly_below(&z.vector, &x.vector));
            let has_above = clusters.iter().any(|z| strictly_below(&x.vector, &z.vector));
            prop_assert_eq!(minimal.contains(&x.id), !has_below);
            prop_assert_eq!(maximal.contains(&x.id), !has_above);
        }
    }

    /// Building per reach block gives the whole-universe graph.
    #[test]
    fn partitioned_matches_whole(rows in rows_with_reach(), strategy in prop_oneof![
        Just(BuildStrategy::Exhaustive), Just(BuildStrategy::Levelled), Just(BuildStrategy::DivideAndConquer)
    ]) {
        let elements = || -> Vec<Element> {
            rows.iter()
                .enumerate()
                .map(|(id, (o, r))| Element::new(id, o.clone()).with_reach(r.clone()))
                .collect()
        };
        let whole = build(elements(), GraphConfig { strategy, ..GraphConfig::default() });
        let split = build(elements(), GraphConfig {
            strategy,
            partition_by_reach: true,
            leaf_size: 2,
            ..GraphConfig::default()
        });
        prop_assert_eq!(edge_vectors(&split), edge_vectors(&whole));
    }
}

// ---------------------------------------------------------------------------
// Dominator set
// ---------------------------------------------------------------------------

fn check_minimal(universe: &Universe, set: &dominator::DominatorSet) -> Result<(), TestCaseError> {
    let retained: Vec<&Element> = universe
        .elements()
        .iter()
        .filter(|e| set.retained.contains(e.id).unwrap())
        .collect();

    for e in universe.elements() {
        if e.outcome.is_zero() {
            prop_assert!(set.equivalents.contains(e.id).unwrap());
            prop_assert!(!set.retained.contains(e.id).unwrap());
            continue;
        }
        prop_assert!(
            retained.iter().any(|r| r.outcome.is_subset_of(&e.outcome).unwrap()),
            "{} has no retained subset",
            e.id
        );
    }
    // Retained vectors are pairwise incomparable, so dropping any one of
    // them leaves that element itself uncovered.
    for a in &retained {
        for b in &retained {
            if a.id != b.id {
                prop_assert!(!a.outcome.is_subset_of(&b.outcome).unwrap());
            }
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn greedy_dominators_are_minimal(outcomes in outcomes()) {
        let mut universe = Universe::new();
        for e in elements(&outcomes) {
            universe.insert(e).unwrap();
        }
        let set = dominator::extract(&universe, &DominatorConfig::default()).unwrap();
        check_minimal(&universe, &set)?;
        prop_assert_eq!(
            set.equivalent_count,
            outcomes.iter().filter(|v| v.is_zero()).count()
        );
    }

    #[test]
    fn partitioned_dominators_are_minimal(rows in rows_with_reach()) {
        let mut universe = Universe::new();
        for (id, (o, r)) in rows.iter().enumerate() {
            universe.insert(Element::new(id, o.clone()).with_reach(r.clone())).unwrap();
        }
        let greedy = dominator::extract(&universe, &DominatorConfig::default()).unwrap();
        let split = dominator::extract(&universe, &DominatorConfig {
            algorithm: DominatorAlgorithm::Partitioned,
            record_history: false,
        })
        .unwrap();
        check_minimal(&universe, &split)?;
        // Same minimal vectors, possibly different representatives.
        prop_assert_eq!(split.len(), greedy.len());
        prop_assert_eq!(split.equivalent_count, greedy.equivalent_count);
    }
}

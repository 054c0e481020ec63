//! Elements (mutants), element sets and the single-pass input protocol.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{BitVector, Error, Result};

/// Opaque element (mutant) identifier.
///
/// Ids double as positions in an [`ElementSet`], so producers should keep
/// them dense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub usize);

impl ElementId {
    /// Position of this element in an [`ElementSet`].
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for ElementId {
    fn from(id: usize) -> Self {
        Self(id)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// One produced record: an element id, its outcome vector and, optionally,
/// its reach vector.
///
/// The outcome vector says which probes (tests) detect the element. The
/// reach vector, when present, says which probes exercise it at all and must
/// be a superset of the outcome vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Element id.
    pub id: ElementId,
    /// Outcome (kill) vector.
    pub outcome: BitVector,
    /// Coarser reach (coverage) vector.
    pub reach: Option<BitVector>,
}

impl Element {
    /// Create an element without a reach vector.
    pub fn new(id: impl Into<ElementId>, outcome: BitVector) -> Self {
        Self {
            id: id.into(),
            outcome,
            reach: None,
        }
    }

    /// Attach a reach vector.
    pub fn with_reach(mut self, reach: BitVector) -> Self {
        self.reach = Some(reach);
        self
    }

    /// Check the reach vector against the outcome vector.
    pub fn validate(&self) -> Result<()> {
        if let Some(reach) = &self.reach {
            if !self.outcome.is_subset_of(reach)? {
                return Err(Error::invalid_argument(format!(
                    "reach vector of {} does not cover its outcome vector",
                    self.id
                )));
            }
        }
        Ok(())
    }

    /// Reach vector, falling back to the outcome vector.
    pub fn effective_reach(&self) -> &BitVector {
        self.reach.as_ref().unwrap_or(&self.outcome)
    }
}

/// Pull-based producer of elements.
///
/// Each produced [`Element`] is moved to the consumer, which releases it by
/// dropping it once absorbed; nothing is shared or reference counted.
pub trait ElementSource {
    /// Next element, or `None` at end of stream.
    fn produce(&mut self) -> Option<Element>;
}

impl<I> ElementSource for I
where
    I: Iterator<Item = Element>,
{
    fn produce(&mut self) -> Option<Element> {
        self.next()
    }
}

/// A subset of the element universe, as a bit vector indexed by element id.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct ElementSet {
    bits: BitVector,
}

impl ElementSet {
    /// Empty set over a universe of `capacity` ids.
    pub fn new(capacity: usize) -> Self {
        Self {
            bits: BitVector::new(capacity),
        }
    }

    /// Size of the id space.
    pub fn capacity(&self) -> usize {
        self.bits.len()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.bits.popcount()
    }

    /// True if there are no members.
    pub fn is_empty(&self) -> bool {
        self.bits.is_zero()
    }

    /// Membership test.
    pub fn contains(&self, id: ElementId) -> Result<bool> {
        self.bits.get(id.index())
    }

    /// Add a member.
    pub fn insert(&mut self, id: ElementId) -> Result<()> {
        self.bits.set(id.index(), true)
    }

    /// Remove a member.
    pub fn remove(&mut self, id: ElementId) -> Result<()> {
        self.bits.set(id.index(), false)
    }

    /// Members in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.bits.ones().map(ElementId)
    }

    /// Underlying bit vector.
    pub fn as_bits(&self) -> &BitVector {
        &self.bits
    }

    pub(crate) fn contains_unchecked(&self, id: ElementId) -> bool {
        self.bits.bit(id.index())
    }
}

impl fmt::Debug for ElementSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serialize for ElementSet {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.iter())
    }
}

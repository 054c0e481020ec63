//! Analyses over a stream of mutant outcome vectors.

pub mod dominator;
pub mod subsumption;

use crate::core::Result;

/// Hook run between top-level steps of an analysis: `(done, total)`.
///
/// Returning an error aborts the analysis; this is how progress reporting
/// and cooperative cancellation reach the inner loops.
pub(crate) type Checkpoint<'a> = &'a dyn Fn(usize, usize) -> Result<()>;

// Re-export analyzer types for convenience
pub use dominator::Analyzer as DominatorAnalyzer;
pub use subsumption::Analyzer as SubsumptionAnalyzer;

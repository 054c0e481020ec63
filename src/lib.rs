//! Subsume - mutant subsumption analysis library.
//!
//! Subsume takes the outcome of running every probe (test case) against every
//! element (mutant) and works out which elements are redundant. It clusters
//! elements with identical outcome vectors, computes the cover-edge graph of
//! the inclusion order between clusters, and extracts a minimal dominator
//! set of elements.
//!
//! The library is in-memory and single-threaded. Producing the outcome
//! vectors (running tests, parsing reports) is the caller's job.
//!
//! # Example
//!
//! ```
//! use subsume::analyzers::subsumption::GraphBuilder;
//! use subsume::config::GraphConfig;
//!
//! let mut builder = GraphBuilder::new(GraphConfig::default());
//! builder.open().unwrap();
//! for (id, outcome) in ["1111", "1100", "1110", "0000"].iter().enumerate() {
//!     builder.add(id, outcome.parse().unwrap()).unwrap();
//! }
//! let graph = builder.build().unwrap();
//! assert_eq!(graph.edge_count(), 3);
//! ```

pub mod analyzers;
pub mod cluster;
pub mod config;
pub mod core;

pub use core::{
    AnalysisContext, AnalysisResult, Analyzer, BitVector, Element, ElementId, ElementSet,
    ElementSource, Error, Result,
};

//! Core types and traits for subsumption analysis.

mod analyzer;
mod bitvec;
mod element;
mod error;

pub use analyzer::{AnalysisContext, AnalysisResult, Analyzer, Summary};
pub use bitvec::BitVector;
pub use element::{Element, ElementId, ElementSet, ElementSource};
pub use error::{Error, Result};

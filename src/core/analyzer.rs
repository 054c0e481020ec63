//! Analyzer trait and common types.

use std::time::{Duration, Instant};

use serde::Serialize;

use super::{ElementSource, Error, Result};
use crate::config::Config;

/// Trait implemented by all analyzers.
pub trait Analyzer {
    /// The result type produced by this analyzer.
    type Output: Serialize;

    /// Unique identifier for this analyzer.
    fn name(&self) -> &'static str;

    /// Human-readable description.
    fn description(&self) -> &'static str;

    /// Drain `source` and return the analysis.
    fn analyze(
        &self,
        ctx: &AnalysisContext<'_>,
        source: &mut dyn ElementSource,
    ) -> Result<Self::Output>;

    /// Headline counts for an output; the duration is filled in by
    /// [`run`](Self::run).
    fn summarize(&self, output: &Self::Output) -> Summary;

    /// Configure the analyzer from config.
    fn configure(&mut self, _config: &Config) -> Result<()> {
        Ok(())
    }

    /// Analyze, then wrap the output in a type-erased [`AnalysisResult`].
    fn run(
        &self,
        ctx: &AnalysisContext<'_>,
        source: &mut dyn ElementSource,
    ) -> Result<AnalysisResult> {
        let start = Instant::now();
        let output = self.analyze(ctx, source)?;
        let mut summary = self.summarize(&output);
        summary.duration = start.elapsed();
        AnalysisResult::new(self.name(), &output, summary)
    }
}

/// Context shared by all analyzers during analysis.
///
/// Both callbacks are invoked synchronously between top-level iterations
/// (hierarchy levels, processed elements); the engine never spawns threads.
pub struct AnalysisContext<'a> {
    /// Configuration.
    pub config: &'a Config,
    /// Progress callback.
    pub on_progress: Option<Box<dyn Fn(usize, usize) + 'a>>,
    /// Cooperative cancellation predicate.
    pub should_cancel: Option<Box<dyn Fn() -> bool + 'a>>,
}

impl<'a> AnalysisContext<'a> {
    /// Create a new analysis context.
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            on_progress: None,
            should_cancel: None,
        }
    }

    /// Add progress callback.
    pub fn with_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, usize) + 'a,
    {
        self.on_progress = Some(Box::new(f));
        self
    }

    /// Add a cancellation predicate.
    pub fn with_cancel<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + 'a,
    {
        self.should_cancel = Some(Box::new(f));
        self
    }

    /// Report progress if callback is set.
    pub fn report_progress(&self, current: usize, total: usize) {
        if let Some(ref f) = self.on_progress {
            f(current, total);
        }
    }

    /// Fail with [`Error::Cancelled`] if the host asked to stop.
    pub fn check_cancelled(&self) -> Result<()> {
        match self.should_cancel {
            Some(ref f) if f() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }
}

/// Type-erased analysis result container.
#[derive(Debug)]
pub struct AnalysisResult {
    /// Name of the analyzer that produced this result.
    pub analyzer: &'static str,
    /// Serialized result data (JSON).
    pub data: serde_json::Value,
    /// Quick summary statistics.
    pub summary: Summary,
}

impl AnalysisResult {
    /// Create a new analysis result.
    pub fn new<T: Serialize>(analyzer: &'static str, data: &T, summary: Summary) -> Result<Self> {
        Ok(Self {
            analyzer,
            data: serde_json::to_value(data)?,
            summary,
        })
    }
}

/// Quick summary statistics for display.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    /// Number of elements consumed from the source.
    pub elements_analyzed: usize,
    /// Number of inclusion tests performed.
    pub comparisons: u64,
    /// Analysis duration.
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
}

impl Summary {
    /// Create a new summary.
    pub fn new(elements_analyzed: usize, comparisons: u64, duration: Duration) -> Self {
        Self {
            elements_analyzed,
            comparisons,
            duration,
        }
    }
}

fn serialize_secs<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

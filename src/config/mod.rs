//! Configuration loading and management.

use std::fmt;
use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Subsumption graph construction.
    pub graph: GraphConfig,
    /// Dominator set extraction.
    pub dominator: DominatorConfig,
}

impl Config {
    /// Load configuration from an explicit file path.
    ///
    /// Errors if the file does not exist.
    /// Env vars with `SUBSUME_` prefix override file values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file_exact(path))
            .merge(Env::prefixed("SUBSUME_").split("__"))
            .extract()
            .map_err(|e| Error::config(e.to_string()))
    }

    /// Load configuration from directory, looking for subsume.toml or
    /// .subsume/subsume.toml.
    ///
    /// Missing files are silently skipped (defaults are used).
    pub fn load_default(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(dir.join("subsume.toml")))
            .merge(Toml::file(dir.join(".subsume/subsume.toml")))
            .merge(Env::prefixed("SUBSUME_").split("__"))
            .extract()
            .map_err(|e| Error::config(e.to_string()))
    }

    /// Parse configuration from TOML text, without env overrides.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Default config file content.
    pub fn default_toml() -> &'static str {
        include_str!("default_config.toml")
    }
}

/// Subsumption graph configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Construction strategy.
    pub strategy: Strategy,
    /// Frontier traversal order for the levelled strategy.
    pub traversal: Traversal,
    /// Seed for [`Traversal::Randomized`].
    pub seed: u64,
    /// Build per reach block, then splice blocks together.
    pub partition_by_reach: bool,
    /// Divide-and-conquer stops splitting below this many clusters.
    pub leaf_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Levelled,
            traversal: Traversal::MaximalFirst,
            seed: 0,
            partition_by_reach: false,
            leaf_size: 64,
        }
    }
}

/// Dominator extraction configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DominatorConfig {
    /// Extraction algorithm.
    pub algorithm: DominatorAlgorithm,
    /// Record the candidate-set size after every processed element.
    pub record_history: bool,
}

impl Default for DominatorConfig {
    fn default() -> Self {
        Self {
            algorithm: DominatorAlgorithm::Greedy,
            record_history: true,
        }
    }
}

/// Cover-edge construction strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Compare every pair of clusters, then drop implied edges. Test oracle.
    Exhaustive,
    /// Insert levels from highest degree to lowest via frontier search.
    #[default]
    Levelled,
    /// Split around a pivot, build each part, splice frontiers.
    DivideAndConquer,
}

/// Order in which the frontier search visits the placed graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Traversal {
    /// Start from the minimal clusters and walk upward.
    MinimalFirst,
    /// Start from the maximal clusters and walk downward.
    #[default]
    MaximalFirst,
    /// Visit clusters in a seeded random order.
    Randomized,
}

/// Dominator extraction algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DominatorAlgorithm {
    /// Remove supersets of each element in turn over the whole universe.
    #[default]
    Greedy,
    /// Reduce inside each reach block first, then across compatible blocks.
    Partitioned,
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exhaustive" => Ok(Self::Exhaustive),
            "levelled" | "leveled" | "incremental" => Ok(Self::Levelled),
            "divide-and-conquer" | "dnc" => Ok(Self::DivideAndConquer),
            _ => Err(format!(
                "Unknown strategy: {s}. Use 'levelled', 'exhaustive' or 'divide-and-conquer'"
            )),
        }
    }
}

impl std::str::FromStr for Traversal {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minimal-first" | "min" => Ok(Self::MinimalFirst),
            "maximal-first" | "max" => Ok(Self::MaximalFirst),
            "randomized" | "random" => Ok(Self::Randomized),
            _ => Err(format!(
                "Unknown traversal: {s}. Use 'minimal-first', 'maximal-first' or 'randomized'"
            )),
        }
    }
}

impl std::str::FromStr for DominatorAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "greedy" => Ok(Self::Greedy),
            "partitioned" => Ok(Self::Partitioned),
            _ => Err(format!(
                "Unknown dominator algorithm: {s}. Use 'greedy' or 'partitioned'"
            )),
        }
    }
}

impl Strategy {
    /// True for the quadratic reference strategy, meant for cross-checking
    /// the others rather than for production runs.
    pub fn is_oracle(self) -> bool {
        matches!(self, Self::Exhaustive)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exhaustive => "exhaustive",
            Self::Levelled => "levelled",
            Self::DivideAndConquer => "divide-and-conquer",
        })
    }
}

impl fmt::Display for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MinimalFirst => "minimal-first",
            Self::MaximalFirst => "maximal-first",
            Self::Randomized => "randomized",
        })
    }
}

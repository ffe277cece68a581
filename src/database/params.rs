//! Index and search parameters
//!
//! Typed replacements for the loose `{"index_type": .., "params": {..}}`
//! maps vector databases usually accept. Ranges follow the common IVF
//! limits: 1..=65536 partitions and probes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ConfigError;

pub const DEFAULT_PARTITIONS: u32 = 128;
pub const DEFAULT_PROBES: u32 = 10;
pub const DEFAULT_TOP_K: usize = 5;
pub const MAX_PARTITIONS: u32 = 65_536;
pub const MAX_TOP_K: usize = 16_384;

/// Kind of ANN index built over the vector field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexKind {
    /// Inverted file with flat (uncompressed) vectors per partition
    #[default]
    IvfFlat,
}

/// Distance metric. Lower distance always means more similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Metric {
    /// Squared Euclidean distance, no normalization
    #[default]
    L2,
    /// `1 - cos(a, b)`
    Cosine,
    /// `1 - a·b`
    Ip,
}

impl Metric {
    /// Distance between two equal-length vectors
    #[inline]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len(), "vector dimensions must match");
        match self {
            Self::L2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| {
                    let d = x - y;
                    d * d
                })
                .sum(),
            Self::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0
                } else {
                    1.0 - dot / (norm_a * norm_b)
                }
            }
            Self::Ip => 1.0 - a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>(),
        }
    }
}

impl fmt::Display for Metric {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::L2 => "L2",
            Self::Cosine => "COSINE",
            Self::Ip => "IP",
        };
        f.write_str(name)
    }
}

impl fmt::Display for IndexKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IvfFlat => f.write_str("IVF_FLAT"),
        }
    }
}

/// Index build parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub kind: IndexKind,
    pub metric: Metric,
    /// Number of IVF partitions (`nlist`)
    pub partitions: u32,
}

impl Default for IndexConfig {
    #[inline]
    fn default() -> Self {
        Self {
            kind: IndexKind::IvfFlat,
            metric: Metric::L2,
            partitions: DEFAULT_PARTITIONS,
        }
    }
}

impl IndexConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_PARTITIONS).contains(&self.partitions) {
            return Err(ConfigError::InvalidPartitions(self.partitions));
        }
        Ok(())
    }
}

/// Search-time parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub metric: Metric,
    /// Number of partitions probed per query (`nprobe`)
    pub probes: u32,
    pub default_top_k: usize,
}

impl Default for SearchConfig {
    #[inline]
    fn default() -> Self {
        Self {
            metric: Metric::L2,
            probes: DEFAULT_PROBES,
            default_top_k: DEFAULT_TOP_K,
        }
    }
}

impl SearchConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_PARTITIONS).contains(&self.probes) {
            return Err(ConfigError::InvalidProbes(self.probes));
        }
        if !(1..=MAX_TOP_K).contains(&self.default_top_k) {
            return Err(ConfigError::InvalidTopK(self.default_top_k));
        }
        Ok(())
    }
}

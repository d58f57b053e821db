#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{graph::node::RenderCtx, Sample};

/// Construction-time context shared by every unit.
///
/// Units size their delay buffers from `sample_rate` and seed their random
/// generators (spacing mode `rand`, delay-time modulators) from `seed`, so two
/// units built from the same config render identically.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioConfig {
    pub sample_rate: Sample,
    pub seed: u64,
}

impl AudioConfig {
    pub fn new(sample_rate: Sample) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Render context for a block starting at frame zero.
    pub fn ctx(&self) -> RenderCtx {
        RenderCtx::new(self.sample_rate)
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            seed: 0x5EED,
        }
    }
}

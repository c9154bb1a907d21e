//! Run configuration.

use serde::{Deserialize, Serialize};

/// Limits for one interpreter run. Every field has a default, so hosts may
/// pass partial JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Initial value of the loop trap counter.
    pub loop_budget: u32,
    /// Micro-steps per grader slice before control returns to the host.
    pub yield_interval: u64,
    /// Micro-steps a run may take in total.
    pub max_micro_steps: u64,
    pub max_call_depth: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            loop_budget: 1000,
            yield_interval: 256,
            max_micro_steps: 2_000_000,
            max_call_depth: 128,
        }
    }
}

//! Engine-wide configuration: the options in spec §6 that apply across all
//! markets rather than per-market (those live in [`crate::market::MarketParams`]).
//!
//! Grounded on the `rtavarezz-perps-market` test files' `EngineConfig::default()`
//! usage — a single aggregate struct with a `Default` impl carrying the
//! documented defaults, rather than scattered constants.

use serde::{Deserialize, Serialize};

/// Engine-wide defaults and resource limits (spec §6's configuration list,
/// minus the per-market options already on [`crate::market::MarketParams`]).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on liquidations processed in a single epoch, across all
    /// markets (spec §6 `max_liquidations_per_epoch`).
    pub max_liquidations_per_epoch: usize,
    /// Size of a `BatchPlace` chunk handed to a single worker (spec §6
    /// `batch_size`).
    pub batch_size: usize,
    /// Fixed worker pool size for per-market parallel batch matching
    /// (spec §5/§6 `worker_count`).
    pub worker_count: usize,
    /// Per-worker wall-clock budget before a market's batch is abandoned
    /// and its orders rejected as `Busy` (spec §6 `worker_timeout_s`).
    pub worker_timeout_s: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_liquidations_per_epoch: 100,
            batch_size: 500,
            worker_count: 16,
            worker_timeout_s: 10,
        }
    }
}

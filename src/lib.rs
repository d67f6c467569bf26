//! Wallet reputation scoring and reward claims.
//!
//! Scoring (`scoring`) is pure: activity counters in, a capped score and
//! trust tier out. Rewards (`rewards`) are stateful: each scan diffs the new
//! activity snapshot against the stored one and queues pending rewards,
//! which become permanent only when claimed under per-category caps.

pub mod config;
pub mod core;
pub mod db;
pub mod rewards;
pub mod scoring;

pub use crate::core::{
    ActivityCounters, ActivitySnapshot, ClaimedTotals, GenesisFacts, LevelProgress, PendingReward,
    ReputationResult, RewardCategory, Silo, TOTAL_CAP, TrustTier,
};
pub use rewards::claim::{ClaimOutcome, claim};
pub use rewards::differ::diff_snapshot;
pub use rewards::ledger::{RewardLedger, RewardStore, StoreError};
pub use rewards::{RewardState, ScanReport};
pub use scoring::genesis::compute_genesis;
pub use scoring::level::level_progress;
pub use scoring::tables::{ConfigError, RuleTables};
pub use scoring::{ReputationEngine, compute_reputation};

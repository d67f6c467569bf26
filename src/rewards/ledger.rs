use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::info;

use super::claim::ClaimOutcome;
use super::{RewardState, ScanReport};
use crate::core::{ActivitySnapshot, GenesisFacts, PendingReward};
use crate::scoring::tables::{ConfigError, RuleTables};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("state encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("lock poisoned for user {0}")]
    Poisoned(String),
}

/// Read/write contract for per-user reward state.
///
/// `RewardLedger` serializes every read-modify-write for a given user, so
/// only `commit_claim` has to be atomic.
pub trait RewardStore {
    /// Load a user's state, or a fresh one if the user is unknown.
    fn load_reward_state(&self, user_id: &str) -> Result<RewardState, StoreError>;

    fn save_reward_state(&self, state: &RewardState) -> Result<(), StoreError>;

    /// Save the post-claim `state` and append `outcome` to the claim history.
    /// Either both writes land or neither does.
    fn commit_claim(&self, state: &RewardState, outcome: &ClaimOutcome, at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// Runs scans, claims and engagement actions against a store, one user at a time.
pub struct RewardLedger<S> {
    store: S,
    tables: RuleTables,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: RewardStore> RewardLedger<S> {
    /// Validates `tables` up front so per-user calls never see a bad config.
    pub fn new(store: S, tables: RuleTables) -> Result<Self, ConfigError> {
        tables.validate()?;
        Ok(Self {
            store,
            tables,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn tables(&self) -> &RuleTables {
        &self.tables
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn user_lock(&self, user_id: &str) -> Result<Arc<Mutex<()>>, StoreError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| StoreError::Poisoned(user_id.to_string()))?;
        Ok(locks.entry(user_id.to_string()).or_default().clone())
    }

    /// Drop the user's lock entry unless another caller holds or awaits it.
    fn release_lock(&self, user_id: &str, lock: &Arc<Mutex<()>>) {
        if let Ok(mut locks) = self.locks.lock() {
            // One reference in the map, one in `lock`. Clones are only taken
            // under the map lock, so nobody can pick it up in between.
            if Arc::strong_count(lock) == 2 {
                locks.remove(user_id);
            }
        }
    }

    /// Run `f` while holding the user's lock.
    fn locked<T>(&self, user_id: &str, f: impl FnOnce() -> Result<T, StoreError>) -> Result<T, StoreError> {
        let lock = self.user_lock(user_id)?;
        let result = match lock.lock() {
            Ok(_guard) => f(),
            Err(_) => Err(StoreError::Poisoned(user_id.to_string())),
        };
        self.release_lock(user_id, &lock);
        result
    }

    /// Hold the user's lock across load, `f`, and save.
    fn with_state<T>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut RewardState, &RuleTables) -> T,
    ) -> Result<T, StoreError> {
        self.locked(user_id, || {
            let mut state = self.store.load_reward_state(user_id)?;
            let result = f(&mut state, &self.tables);
            self.store.save_reward_state(&state)?;
            Ok(result)
        })
    }

    /// Number of users with a live lock entry.
    pub fn tracked_users(&self) -> usize {
        self.locks.lock().map_or(0, |locks| locks.len())
    }

    pub fn scan(
        &self,
        user_id: &str,
        snapshot: &ActivitySnapshot,
        genesis: Option<&GenesisFacts>,
    ) -> Result<ScanReport, StoreError> {
        let report = self.with_state(user_id, |state, tables| state.apply_scan(snapshot, genesis, tables))?;
        info!(
            "Scan for {user_id}: {} new pending rewards (first_scan={})",
            report.new_rewards.len(),
            report.first_scan
        );
        Ok(report)
    }

    pub fn claim(&self, user_id: &str, now: DateTime<Utc>) -> Result<ClaimOutcome, StoreError> {
        let outcome = self.locked(user_id, || {
            let mut state = self.store.load_reward_state(user_id)?;
            let outcome = state.apply_claim(&self.tables, now);
            if outcome.requested_points > 0 {
                self.store.commit_claim(&state, &outcome, now)?;
            }
            Ok(outcome)
        })?;
        info!(
            "Claim for {user_id}: admitted {} of {} points",
            outcome.admitted_points, outcome.requested_points
        );
        Ok(outcome)
    }

    pub fn check_in(&self, user_id: &str, now: DateTime<Utc>) -> Result<Option<PendingReward>, StoreError> {
        self.with_state(user_id, |state, tables| state.record_check_in(tables, now))
    }

    pub fn referral(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<PendingReward>, StoreError> {
        self.with_state(user_id, |state, tables| state.record_referral(tables, now))
    }

    pub fn task_completed(&self, user_id: &str, task: &str, now: DateTime<Utc>) -> Result<PendingReward, StoreError> {
        self.with_state(user_id, |state, tables| state.record_task_completed(task, tables, now))
    }

    /// Current state, read under the user's lock.
    pub fn state(&self, user_id: &str) -> Result<RewardState, StoreError> {
        self.locked(user_id, || self.store.load_reward_state(user_id))
    }
}

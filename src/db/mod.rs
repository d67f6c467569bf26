pub mod schema;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::ClaimedTotals;
use crate::rewards::RewardState;
use crate::rewards::claim::ClaimOutcome;
use crate::rewards::ledger::{RewardStore, StoreError};

/// A persisted claim from the audit history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub id: i64,
    pub user_id: String,
    pub requested_points: u64,
    pub admitted_points: u64,
    pub claimed_totals: ClaimedTotals,
    pub admitted_rewards_json: String,
    pub created_at: String,
}

pub struct Database {
    conn: Connection,
}

/// Thread-safe wrapper around Database.
#[derive(Clone)]
pub struct SharedDatabase {
    inner: Arc<Mutex<Database>>,
}

impl SharedDatabase {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let db = Database::open(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(db)),
        })
    }

    fn db(&self) -> Result<MutexGuard<'_, Database>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Poisoned("database".to_string()))
    }

    /// Most recent claims for a user, newest first.
    pub fn recent_claims(&self, user_id: &str, limit: usize) -> Result<Vec<ClaimRecord>, StoreError> {
        self.db()?.recent_claims(user_id, limit)
    }

    /// Number of users with stored state.
    pub fn user_count(&self) -> Result<usize, StoreError> {
        Ok(self.db()?.user_count()?)
    }
}

impl RewardStore for SharedDatabase {
    fn load_reward_state(&self, user_id: &str) -> Result<RewardState, StoreError> {
        self.db()?.load_reward_state(user_id)
    }

    fn save_reward_state(&self, state: &RewardState) -> Result<(), StoreError> {
        self.db()?.save_reward_state(state)
    }

    fn commit_claim(&self, state: &RewardState, outcome: &ClaimOutcome, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.db()?.commit_claim(state, outcome, at)
    }
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn load_reward_state(&self, user_id: &str) -> Result<RewardState, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT state FROM reward_state WHERE user_id = ?1")?;
        let mut rows = stmt.query(rusqlite::params![user_id])?;
        if let Some(row) = rows.next()? {
            let json: String = row.get(0)?;
            Ok(serde_json::from_str(&json)?)
        } else {
            Ok(RewardState::new(user_id))
        }
    }

    pub fn save_reward_state(&self, state: &RewardState) -> Result<(), StoreError> {
        write_state(&self.conn, state)
    }

    pub fn record_claim(&self, user_id: &str, outcome: &ClaimOutcome, at: DateTime<Utc>) -> Result<(), StoreError> {
        insert_claim(&self.conn, user_id, outcome, at)
    }

    /// Save the post-claim state and its history row in one transaction.
    pub fn commit_claim(&mut self, state: &RewardState, outcome: &ClaimOutcome, at: DateTime<Utc>) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        write_state(&tx, state)?;
        insert_claim(&tx, &state.user_id, outcome, at)?;
        tx.commit()?;
        Ok(())
    }

    pub fn recent_claims(&self, user_id: &str, limit: usize) -> Result<Vec<ClaimRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, requested_points, admitted_points, claimed_totals, admitted_rewards, created_at
             FROM claim_history WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![user_id, limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, user_id, requested, admitted, totals_json, admitted_rewards_json, created_at) = row?;
            records.push(ClaimRecord {
                id,
                user_id,
                requested_points: requested as u64,
                admitted_points: admitted as u64,
                claimed_totals: serde_json::from_str(&totals_json)?,
                admitted_rewards_json,
                created_at,
            });
        }
        Ok(records)
    }

    pub fn user_count(&self) -> Result<usize, rusqlite::Error> {
        self.conn.query_row("SELECT COUNT(*) FROM reward_state", [], |row| {
            row.get::<_, i64>(0).map(|c| c as usize)
        })
    }
}

fn write_state(conn: &Connection, state: &RewardState) -> Result<(), StoreError> {
    let json = serde_json::to_string(state)?;
    conn.execute(
        "INSERT OR REPLACE INTO reward_state (user_id, state, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        rusqlite::params![state.user_id, json],
    )?;
    Ok(())
}

fn insert_claim(conn: &Connection, user_id: &str, outcome: &ClaimOutcome, at: DateTime<Utc>) -> Result<(), StoreError> {
    let totals = serde_json::to_string(&outcome.new_claimed_totals)?;
    let admitted = serde_json::to_string(&outcome.admitted_rewards)?;
    conn.execute(
        "INSERT INTO claim_history (user_id, requested_points, admitted_points, claimed_totals, admitted_rewards, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            user_id,
            outcome.requested_points as i64,
            outcome.admitted_points as i64,
            totals,
            admitted,
            at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

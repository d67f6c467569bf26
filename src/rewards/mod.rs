pub mod claim;
pub mod differ;
pub mod ledger;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::{ActivitySnapshot, ClaimedTotals, GenesisFacts, PendingReward, RewardCategory};
use crate::scoring::genesis::compute_genesis;
use crate::scoring::tables::RuleTables;
use claim::ClaimOutcome;

/// Per-user persisted reward aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardState {
    pub user_id: String,
    #[serde(default)]
    pub last_snapshot: Option<ActivitySnapshot>,
    #[serde(default)]
    pub pending_rewards: Vec<PendingReward>,
    #[serde(default)]
    pub claimed_totals: ClaimedTotals,
    #[serde(default)]
    pub genesis_awarded: bool,
    #[serde(default)]
    pub total_referrals: u32,
    #[serde(default)]
    pub completed_tasks: u32,
    #[serde(default)]
    pub weekly_claims: u32,
    #[serde(default)]
    pub daily_check_ins: u32,
    #[serde(default)]
    pub last_claim_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_check_in_on: Option<NaiveDate>,
    /// Rewards queued so far; suffixes every reward id.
    #[serde(default)]
    pub reward_seq: u64,
}

/// What a single scan added to the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub first_scan: bool,
    pub new_rewards: Vec<PendingReward>,
    /// Cumulative counters that went backwards since the last snapshot.
    pub anomalies: Vec<String>,
}

impl RewardState {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            last_snapshot: None,
            pending_rewards: Vec::new(),
            claimed_totals: ClaimedTotals::new(),
            genesis_awarded: false,
            total_referrals: 0,
            completed_tasks: 0,
            weekly_claims: 0,
            daily_check_ins: 0,
            last_claim_at: None,
            last_check_in_on: None,
            reward_seq: 0,
        }
    }

    /// Give `reward` an id unique within this state and queue it.
    fn queue(&mut self, mut reward: PendingReward) -> PendingReward {
        self.reward_seq += 1;
        reward.id = format!("{}#{}", reward.id, self.reward_seq);
        self.pending_rewards.push(reward.clone());
        reward
    }

    /// Permanently claimed score across all categories.
    pub fn claimed_score(&self) -> u64 {
        self.claimed_totals
            .values()
            .fold(0u64, |acc, points| acc.saturating_add(*points))
    }

    pub fn pending_points(&self) -> u64 {
        self.pending_rewards
            .iter()
            .fold(0u64, |acc, reward| acc.saturating_add(reward.points))
    }

    /// Diff `current` against the stored snapshot, queue the resulting rewards
    /// and fold `current` into the baseline.
    ///
    /// Cumulative counters in the baseline never go down, so activity hidden
    /// by a stale snapshot is not rewarded again once it reappears.
    ///
    /// On the first scan the Genesis bonus is queued instead, once, when
    /// `genesis` facts are supplied.
    pub fn apply_scan(
        &mut self,
        current: &ActivitySnapshot,
        genesis: Option<&GenesisFacts>,
        tables: &RuleTables,
    ) -> ScanReport {
        let current = current.sanitized();
        let previous = match self.last_snapshot.take() {
            Some(prev) if prev.wallet_address == current.wallet_address => Some(prev),
            Some(prev) => {
                info!(
                    "User {} switched wallet {} -> {}, starting a new baseline",
                    self.user_id, prev.wallet_address, current.wallet_address
                );
                None
            }
            None => None,
        };

        let mut report = ScanReport {
            first_scan: previous.is_none(),
            new_rewards: Vec::new(),
            anomalies: Vec::new(),
        };

        let mut found = Vec::new();
        match previous.as_ref() {
            Some(prev) => {
                report.anomalies = differ::snapshot_anomalies(&current, prev)
                    .into_iter()
                    .map(String::from)
                    .collect();
                if !report.anomalies.is_empty() {
                    warn!(
                        "Snapshot for {} has decreasing counters {:?}; treating as no new activity",
                        current.wallet_address, report.anomalies
                    );
                }
                found = differ::diff_snapshot(&current, Some(prev), tables);
            }
            None => {
                if let Some(facts) = genesis.filter(|_| !self.genesis_awarded) {
                    let result = compute_genesis(facts, tables);
                    self.genesis_awarded = true;
                    if result.total > 0 {
                        found.push(PendingReward::new(
                            &current.wallet_address,
                            RewardCategory::Genesis,
                            "genesis_bonus",
                            result.total,
                            current.taken_at,
                            format!("Genesis bonus from {} lifetime facts", result.items.len()),
                        ));
                    }
                }
            }
        }

        report.new_rewards = found.into_iter().map(|reward| self.queue(reward)).collect();
        debug!(
            "Scan for {} queued {} rewards (first_scan={})",
            self.user_id,
            report.new_rewards.len(),
            report.first_scan
        );
        self.last_snapshot = Some(match previous {
            Some(prev) => differ::next_baseline(&current, &prev),
            None => current,
        });
        report
    }

    /// Collect every pending reward under the category caps.
    ///
    /// All pending rewards are consumed, admitted or not.
    pub fn apply_claim(&mut self, tables: &RuleTables, now: DateTime<Utc>) -> ClaimOutcome {
        if self.pending_rewards.is_empty() {
            return ClaimOutcome {
                new_claimed_totals: self.claimed_totals.clone(),
                ..Default::default()
            };
        }

        let outcome = claim::claim(&self.pending_rewards, &self.claimed_totals, &tables.category_caps);
        self.claimed_totals = outcome.new_claimed_totals.clone();
        self.pending_rewards.clear();

        if outcome.admitted_points > 0 {
            let week_elapsed = self
                .last_claim_at
                .is_none_or(|last| (now - last).num_days() >= tables.engagement.claim_week_days);
            if week_elapsed {
                self.weekly_claims += 1;
                self.last_claim_at = Some(now);
            }
        }
        if outcome.dropped_points() > 0 {
            info!(
                "Claim for {} dropped {} points at category caps",
                self.user_id,
                outcome.dropped_points()
            );
        }
        outcome
    }

    /// Queue the daily check-in reward; `None` if already checked in today (UTC).
    pub fn record_check_in(&mut self, tables: &RuleTables, now: DateTime<Utc>) -> Option<PendingReward> {
        let today = now.date_naive();
        if self.last_check_in_on == Some(today) {
            return None;
        }
        self.last_check_in_on = Some(today);
        self.daily_check_ins += 1;

        let reward = PendingReward::new(
            &self.user_id,
            RewardCategory::AppEngagement,
            "daily_check_in",
            tables.engagement.check_in,
            now,
            format!("Daily check-in on {today}"),
        );
        Some(self.queue(reward))
    }

    /// Queue a referral reward, plus a milestone bonus every N referrals.
    pub fn record_referral(&mut self, tables: &RuleTables, now: DateTime<Utc>) -> Vec<PendingReward> {
        self.total_referrals += 1;
        let n = self.total_referrals;
        let owner = self.user_id.clone();
        let engagement = &tables.engagement;

        let mut rewards = vec![PendingReward::new(
            &owner,
            RewardCategory::AppEngagement,
            "referral",
            engagement.referral,
            now,
            format!("Referral #{n}"),
        )];
        if engagement.referral_milestone_every > 0 && n % engagement.referral_milestone_every == 0 {
            rewards.push(PendingReward::new(
                &owner,
                RewardCategory::AppEngagement,
                "referral_milestone",
                engagement.referral_milestone_bonus,
                now,
                format!("{n} referrals milestone"),
            ));
        }
        rewards.into_iter().map(|reward| self.queue(reward)).collect()
    }

    pub fn record_task_completed(&mut self, task: &str, tables: &RuleTables, now: DateTime<Utc>) -> PendingReward {
        self.completed_tasks += 1;
        let reward = PendingReward::new(
            &self.user_id,
            RewardCategory::AppEngagement,
            "task_completed",
            tables.engagement.task,
            now,
            format!("Completed task: {task}"),
        );
        self.queue(reward)
    }
}

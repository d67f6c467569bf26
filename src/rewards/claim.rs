use serde::{Deserialize, Serialize};

use crate::core::{ClaimedTotals, PendingReward, RewardCategory};
use crate::scoring::tables::CategoryCaps;

/// Result of collecting all pending rewards at once.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClaimOutcome {
    /// Sum of every pending reward offered to the claim.
    pub requested_points: u64,
    /// Points that fit under the category caps.
    pub admitted_points: u64,
    pub new_claimed_totals: ClaimedTotals,
    /// Rewards admitted in full or in part; partial ones carry the truncated amount.
    pub admitted_rewards: Vec<PendingReward>,
}

impl ClaimOutcome {
    /// Points offered but voided by cap exhaustion.
    pub fn dropped_points(&self) -> u64 {
        self.requested_points.saturating_sub(self.admitted_points)
    }
}

/// Admit pending rewards in order until each category's cap is reached.
///
/// Points beyond a category's remaining room are dropped, not carried over.
pub fn claim(pending: &[PendingReward], claimed: &ClaimedTotals, caps: &CategoryCaps) -> ClaimOutcome {
    let mut totals: ClaimedTotals = RewardCategory::ALL
        .iter()
        .map(|&category| {
            let so_far = claimed.get(&category).copied().unwrap_or(0);
            (category, so_far.min(caps.cap(category)))
        })
        .collect();

    let mut outcome = ClaimOutcome::default();
    for reward in pending {
        outcome.requested_points = outcome.requested_points.saturating_add(reward.points);

        let cap = caps.cap(reward.category);
        let total = totals.entry(reward.category).or_insert(0);
        let room = cap.saturating_sub(*total);
        let admitted = reward.points.min(room);
        if admitted == 0 {
            continue;
        }

        *total += admitted;
        outcome.admitted_points += admitted;
        outcome.admitted_rewards.push(PendingReward {
            points: admitted,
            ..reward.clone()
        });
    }

    outcome.new_claimed_totals = totals;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn make_reward(id: &str, category: RewardCategory, points: u64) -> PendingReward {
        PendingReward {
            id: id.to_string(),
            category,
            action: "test".to_string(),
            points,
            created_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            description: String::new(),
        }
    }

    #[test]
    fn empty_claim_is_noop() {
        let mut claimed = ClaimedTotals::new();
        claimed.insert(RewardCategory::Recurring, 1_234);
        let outcome = claim(&[], &claimed, &CategoryCaps::default());
        assert_eq!(outcome.admitted_points, 0);
        assert_eq!(outcome.requested_points, 0);
        assert!(outcome.admitted_rewards.is_empty());
        assert_eq!(outcome.new_claimed_totals[&RewardCategory::Recurring], 1_234);
    }

    #[test]
    fn admits_everything_under_cap() {
        let pending = vec![
            make_reward("a", RewardCategory::Recurring, 1_500),
            make_reward("b", RewardCategory::AppEngagement, 2_000),
        ];
        let outcome = claim(&pending, &ClaimedTotals::new(), &CategoryCaps::default());
        assert_eq!(outcome.admitted_points, 3_500);
        assert_eq!(outcome.dropped_points(), 0);
        assert_eq!(outcome.admitted_rewards, pending);
        assert_eq!(outcome.new_claimed_totals[&RewardCategory::Recurring], 1_500);
        assert_eq!(outcome.new_claimed_totals[&RewardCategory::AppEngagement], 2_000);
        assert_eq!(outcome.new_claimed_totals[&RewardCategory::Genesis], 0);
    }

    #[test]
    fn partial_admission_truncates_and_drops_rest() {
        let caps = CategoryCaps::default();
        let mut claimed = ClaimedTotals::new();
        claimed.insert(RewardCategory::Recurring, caps.recurring - 1_000);

        let pending = vec![
            make_reward("a", RewardCategory::Recurring, 600),
            make_reward("b", RewardCategory::Recurring, 600),
            make_reward("c", RewardCategory::Recurring, 600),
            make_reward("d", RewardCategory::Genesis, 50),
        ];
        let outcome = claim(&pending, &claimed, &caps);

        assert_eq!(outcome.requested_points, 1_850);
        assert_eq!(outcome.admitted_points, 1_050);
        assert_eq!(outcome.dropped_points(), 800);
        let admitted: Vec<(&str, u64)> = outcome
            .admitted_rewards
            .iter()
            .map(|r| (r.id.as_str(), r.points))
            .collect();
        assert_eq!(admitted, vec![("a", 600), ("b", 400), ("d", 50)]);
        assert_eq!(outcome.new_claimed_totals[&RewardCategory::Recurring], caps.recurring);
    }

    #[test]
    fn saturated_category_admits_nothing() {
        let caps = CategoryCaps::default();
        let mut claimed = ClaimedTotals::new();
        claimed.insert(RewardCategory::AppEngagement, caps.app_engagement);
        let pending = vec![make_reward("a", RewardCategory::AppEngagement, 10)];
        let outcome = claim(&pending, &claimed, &caps);
        assert_eq!(outcome.admitted_points, 0);
        assert!(outcome.admitted_rewards.is_empty());
    }

    #[test]
    fn totals_above_cap_are_clamped() {
        let caps = CategoryCaps::default();
        let mut claimed = ClaimedTotals::new();
        claimed.insert(RewardCategory::Genesis, caps.genesis * 3);
        let outcome = claim(&[], &claimed, &caps);
        assert_eq!(outcome.new_claimed_totals[&RewardCategory::Genesis], caps.genesis);
    }

    #[test]
    fn conservation_holds_for_large_requests() {
        let caps = CategoryCaps::default();
        let pending: Vec<PendingReward> = (0..50)
            .map(|i| {
                let category = RewardCategory::ALL[i % 3];
                make_reward(&format!("r{i}"), category, 37_000)
            })
            .collect();
        let outcome = claim(&pending, &ClaimedTotals::new(), &caps);
        let requested: u64 = pending.iter().map(|r| r.points).sum();
        assert!(outcome.admitted_points <= requested);
        for category in RewardCategory::ALL {
            assert!(outcome.new_claimed_totals[&category] <= caps.cap(category));
        }
    }
}

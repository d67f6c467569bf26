use crate::core::{ActivitySnapshot, PendingReward, RewardCategory, sanitize, whole};
use crate::scoring::tables::RuleTables;

/// Non-negative growth of a cumulative counter between two snapshots.
fn delta(current: f64, previous: f64) -> f64 {
    (sanitize(current) - sanitize(previous)).max(0.0)
}

/// Turn activity observed since `previous` into pending rewards.
///
/// With no previous snapshot (first scan) nothing is emitted; the one-time
/// Genesis bonus covers that scan. Counters that went backwards count as no
/// new activity. Rewards are stamped with `current.taken_at`, so the output
/// depends only on the two snapshots and the tables.
pub fn diff_snapshot(
    current: &ActivitySnapshot,
    previous: Option<&ActivitySnapshot>,
    tables: &RuleTables,
) -> Vec<PendingReward> {
    let Some(previous) = previous else {
        return Vec::new();
    };
    let current = current.sanitized();
    let previous = previous.sanitized();
    let owner = current.wallet_address.as_str();
    let at = current.taken_at;
    let rates = &tables.scan;

    let mut rewards = Vec::new();
    let mut emit = |category, action: &str, points: u64, description: String| {
        if points > 0 {
            rewards.push(PendingReward::new(owner, category, action, points, at, description));
        }
    };

    let sent = whole(delta(current.sent_count, previous.sent_count));
    emit(
        RewardCategory::Recurring,
        "new_sent_transactions",
        sent.saturating_mul(rates.per_sent_tx),
        format!("{sent} new sent transactions"),
    );

    let received = whole(delta(current.received_count, previous.received_count));
    emit(
        RewardCategory::Recurring,
        "new_received_transactions",
        received.saturating_mul(rates.per_received_tx),
        format!("{received} new received transactions"),
    );

    let tokens = whole(delta(current.unique_tokens, previous.unique_tokens));
    emit(
        RewardCategory::Recurring,
        "new_tokens",
        tokens.saturating_mul(rates.per_new_token),
        format!("{tokens} new tokens held"),
    );

    let dapps = whole(delta(current.unique_dapps, previous.unique_dapps));
    emit(
        RewardCategory::AppEngagement,
        "new_dapps",
        dapps.saturating_mul(rates.per_new_dapp),
        format!("{dapps} new dapps used"),
    );

    let volume = delta(current.total_volume, previous.total_volume);
    emit(
        RewardCategory::Recurring,
        "volume_increase",
        whole(volume).saturating_mul(rates.per_volume_unit),
        format!("Trading volume up {volume:.2}"),
    );

    if current.staking_detected && !previous.staking_detected {
        emit(
            RewardCategory::Recurring,
            "first_staking",
            rates.first_staking,
            "Staking detected for the first time".into(),
        );
    }
    if current.dex_trade_detected && !previous.dex_trade_detected {
        emit(
            RewardCategory::Recurring,
            "first_dex_trade",
            rates.first_dex_trade,
            "First dex trade detected".into(),
        );
    }

    let gap_days = (current.taken_at - previous.taken_at).num_days();
    if gap_days >= tables.monthly.threshold_days {
        let monthly = &tables.monthly;
        if current.balance > previous.balance {
            emit(
                RewardCategory::Recurring,
                "balance_increase",
                monthly.balance_increase,
                format!("Balance grew over {gap_days} days"),
            );
        }
        if delta(current.tx_count, previous.tx_count) > 0.0 || sent + received > 0 {
            emit(
                RewardCategory::Recurring,
                "continued_activity",
                monthly.continued_activity,
                format!("Wallet stayed active over {gap_days} days"),
            );
        }
        if dapps > 0 {
            emit(
                RewardCategory::AppEngagement,
                "new_dapp_usage",
                monthly.new_dapp_usage,
                format!("New dapps used over {gap_days} days"),
            );
        }
        if volume > 0.0 {
            emit(
                RewardCategory::Recurring,
                "volume_growth",
                monthly.volume_growth,
                format!("Volume grew over {gap_days} days"),
            );
        }
    }

    rewards
}

/// Baseline to diff the next scan against: the high-water mark of every
/// cumulative counter and flag. Balance follows the newer snapshot.
pub fn next_baseline(current: &ActivitySnapshot, previous: &ActivitySnapshot) -> ActivitySnapshot {
    let current = current.sanitized();
    let previous = previous.sanitized();
    let newer = if current.taken_at >= previous.taken_at { &current } else { &previous };
    ActivitySnapshot {
        wallet_address: current.wallet_address.clone(),
        balance: newer.balance,
        tx_count: current.tx_count.max(previous.tx_count),
        sent_count: current.sent_count.max(previous.sent_count),
        received_count: current.received_count.max(previous.received_count),
        total_volume: current.total_volume.max(previous.total_volume),
        unique_contacts: current.unique_contacts.max(previous.unique_contacts),
        unique_tokens: current.unique_tokens.max(previous.unique_tokens),
        unique_dapps: current.unique_dapps.max(previous.unique_dapps),
        staking_detected: current.staking_detected || previous.staking_detected,
        dex_trade_detected: current.dex_trade_detected || previous.dex_trade_detected,
        taken_at: newer.taken_at,
    }
}

/// Names of cumulative counters that decreased between two snapshots.
pub fn snapshot_anomalies(current: &ActivitySnapshot, previous: &ActivitySnapshot) -> Vec<&'static str> {
    let current = current.sanitized();
    let previous = previous.sanitized();
    [
        ("tx_count", current.tx_count, previous.tx_count),
        ("sent_count", current.sent_count, previous.sent_count),
        ("received_count", current.received_count, previous.received_count),
        ("total_volume", current.total_volume, previous.total_volume),
        ("unique_contacts", current.unique_contacts, previous.unique_contacts),
        ("unique_tokens", current.unique_tokens, previous.unique_tokens),
        ("unique_dapps", current.unique_dapps, previous.unique_dapps),
    ]
    .into_iter()
    .filter(|(_, now, before)| now < before)
    .map(|(name, _, _)| name)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn make_snapshot(sent: f64, received: f64, balance: f64, at: DateTime<Utc>) -> ActivitySnapshot {
        ActivitySnapshot {
            sent_count: sent,
            received_count: received,
            balance,
            ..ActivitySnapshot::empty("GWALLET", at)
        }
    }

    #[test]
    fn first_scan_emits_nothing() {
        let current = ActivitySnapshot {
            sent_count: 500.0,
            unique_dapps: 9.0,
            staking_detected: true,
            ..ActivitySnapshot::empty("GWALLET", t0())
        };
        assert!(diff_snapshot(&current, None, &RuleTables::default()).is_empty());
    }

    #[test]
    fn identical_snapshots_emit_nothing() {
        let snap = ActivitySnapshot {
            sent_count: 10.0,
            total_volume: 55.5,
            staking_detected: true,
            ..ActivitySnapshot::empty("GWALLET", t0())
        };
        assert!(diff_snapshot(&snap, Some(&snap), &RuleTables::default()).is_empty());
    }

    #[test]
    fn sent_delta_within_a_month() {
        let tables = RuleTables::default();
        let previous = make_snapshot(10.0, 5.0, 100.0, t0());
        let current = make_snapshot(13.0, 5.0, 140.0, t0() + Duration::days(3));
        let rewards = diff_snapshot(&current, Some(&previous), &tables);
        assert_eq!(rewards.len(), 1);
        assert_eq!(rewards[0].action, "new_sent_transactions");
        assert_eq!(rewards[0].category, RewardCategory::Recurring);
        assert_eq!(rewards[0].points, 3 * tables.scan.per_sent_tx);
        assert_eq!(rewards[0].created_at, current.taken_at);
    }

    #[test]
    fn monthly_triggers_after_threshold() {
        let tables = RuleTables::default();
        let previous = make_snapshot(10.0, 5.0, 100.0, t0());
        let current = make_snapshot(13.0, 5.0, 140.0, t0() + Duration::days(28));
        let rewards = diff_snapshot(&current, Some(&previous), &tables);
        let actions: Vec<&str> = rewards.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["new_sent_transactions", "balance_increase", "continued_activity"]);
        assert_eq!(rewards[1].points, tables.monthly.balance_increase);
    }

    #[test]
    fn monthly_not_triggered_at_27_days() {
        let previous = make_snapshot(0.0, 0.0, 100.0, t0());
        let current = make_snapshot(0.0, 0.0, 900.0, t0() + Duration::days(27));
        assert!(diff_snapshot(&current, Some(&previous), &RuleTables::default()).is_empty());
    }

    #[test]
    fn decreased_counters_are_zero_delta() {
        let previous = ActivitySnapshot {
            sent_count: 50.0,
            received_count: 40.0,
            unique_tokens: 5.0,
            unique_dapps: 3.0,
            total_volume: 900.0,
            ..ActivitySnapshot::empty("GWALLET", t0())
        };
        let current = ActivitySnapshot {
            sent_count: 20.0,
            received_count: 10.0,
            unique_tokens: 1.0,
            unique_dapps: 0.0,
            total_volume: 100.0,
            ..ActivitySnapshot::empty("GWALLET", t0() + Duration::days(60))
        };
        assert!(diff_snapshot(&current, Some(&previous), &RuleTables::default()).is_empty());
        assert_eq!(
            snapshot_anomalies(&current, &previous),
            vec!["sent_count", "received_count", "total_volume", "unique_tokens", "unique_dapps"]
        );
    }

    #[test]
    fn boolean_transitions_only_on_false_to_true() {
        let tables = RuleTables::default();
        let previous = ActivitySnapshot::empty("GWALLET", t0());
        let current = ActivitySnapshot {
            staking_detected: true,
            dex_trade_detected: true,
            ..ActivitySnapshot::empty("GWALLET", t0() + Duration::hours(1))
        };
        let rewards = diff_snapshot(&current, Some(&previous), &tables);
        let actions: Vec<&str> = rewards.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["first_staking", "first_dex_trade"]);

        // true -> false -> nothing; true -> true -> nothing
        assert!(diff_snapshot(&previous, Some(&current), &tables).is_empty());
        assert!(diff_snapshot(&current, Some(&current), &tables).is_empty());
    }

    #[test]
    fn dapps_go_to_app_engagement() {
        let previous = ActivitySnapshot::empty("GWALLET", t0());
        let current = ActivitySnapshot {
            unique_dapps: 2.0,
            ..ActivitySnapshot::empty("GWALLET", t0() + Duration::days(30))
        };
        let rewards = diff_snapshot(&current, Some(&previous), &RuleTables::default());
        assert_eq!(rewards.len(), 2);
        assert!(rewards.iter().all(|r| r.category == RewardCategory::AppEngagement));
        assert_eq!(rewards[0].points, 4_000);
        assert_eq!(rewards[1].action, "new_dapp_usage");
    }

    #[test]
    fn small_volume_delta_rounds_to_nothing() {
        let previous = ActivitySnapshot {
            total_volume: 10.0,
            ..ActivitySnapshot::empty("GWALLET", t0())
        };
        let current = ActivitySnapshot {
            total_volume: 10.6,
            ..ActivitySnapshot::empty("GWALLET", t0() + Duration::days(1))
        };
        assert!(diff_snapshot(&current, Some(&previous), &RuleTables::default()).is_empty());
    }

    #[test]
    fn malformed_values_never_reward() {
        let previous = ActivitySnapshot::empty("GWALLET", t0());
        let current = ActivitySnapshot {
            sent_count: f64::NAN,
            received_count: f64::INFINITY,
            total_volume: -40.0,
            ..ActivitySnapshot::empty("GWALLET", t0() + Duration::days(1))
        };
        assert!(diff_snapshot(&current, Some(&previous), &RuleTables::default()).is_empty());
    }

    #[test]
    fn same_inputs_same_rewards() {
        let tables = RuleTables::default();
        let previous = make_snapshot(1.0, 1.0, 1.0, t0());
        let current = make_snapshot(4.0, 9.0, 2.0, t0() + Duration::days(40));
        assert_eq!(
            diff_snapshot(&current, Some(&previous), &tables),
            diff_snapshot(&current, Some(&previous), &tables)
        );
    }

    #[test]
    fn reward_ids_unique_within_scan() {
        let previous = ActivitySnapshot::empty("GWALLET", t0());
        let current = ActivitySnapshot {
            sent_count: 1.0,
            received_count: 1.0,
            unique_tokens: 1.0,
            unique_dapps: 1.0,
            total_volume: 10.0,
            balance: 5.0,
            staking_detected: true,
            dex_trade_detected: true,
            ..ActivitySnapshot::empty("GWALLET", t0() + Duration::days(31))
        };
        let rewards = diff_snapshot(&current, Some(&previous), &RuleTables::default());
        let mut ids: Vec<&str> = rewards.iter().map(|r| r.id.as_str()).collect();
        let len = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(len, ids.len());
        assert_eq!(len, 11);
    }

    #[test]
    fn baseline_keeps_high_water_counters() {
        let previous = ActivitySnapshot {
            staking_detected: true,
            ..make_snapshot(10.0, 7.0, 100.0, t0() + Duration::days(2))
        };
        let stale = make_snapshot(4.0, 9.0, 40.0, t0() + Duration::days(1));
        let baseline = next_baseline(&stale, &previous);
        assert_eq!(baseline.sent_count, 10.0);
        assert_eq!(baseline.received_count, 9.0);
        assert!(baseline.staking_detected);
        // The older snapshot neither rewinds time nor the balance.
        assert_eq!(baseline.taken_at, previous.taken_at);
        assert_eq!(baseline.balance, 100.0);

        let fresh = make_snapshot(11.0, 9.0, 80.0, t0() + Duration::days(3));
        let baseline = next_baseline(&fresh, &previous);
        assert_eq!(baseline.balance, 80.0);
        assert_eq!(baseline.taken_at, fresh.taken_at);
    }
}

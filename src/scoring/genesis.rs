use serde::{Deserialize, Serialize};

use crate::core::{GenesisFacts, ItemCategory, ScoreItem, sanitize, whole};
use crate::scoring::tables::{RuleTables, resolve_tier};

/// One-time bonus awarded on a wallet's first successful scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenesisResult {
    /// Sum of `items`, capped at the Genesis category cap.
    pub total: u64,
    pub items: Vec<ScoreItem>,
}

/// Compute the Genesis bonus from lifetime wallet facts.
///
/// Pure: identical facts and tables always give the identical result.
pub fn compute_genesis(facts: &GenesisFacts, tables: &RuleTables) -> GenesisResult {
    let mut items = Vec::new();
    let mut push = |action: &str, points: u64, explanation: String| {
        if points > 0 {
            items.push(ScoreItem::new(ItemCategory::Genesis, action, points, explanation));
        }
    };

    let links = &tables.links;
    if facts.account_linked {
        push("account_linked", links.account, "Account linked".into());
    }
    if facts.first_analysis_done {
        push("first_analysis", links.first_analysis, "First wallet analysis completed".into());
    }
    if facts.mainnet_linked {
        push("mainnet_linked", links.mainnet, "Mainnet wallet linked".into());
    }
    if facts.testnet_linked {
        push("testnet_linked", links.testnet, "Testnet wallet linked".into());
    }

    let age = sanitize(facts.wallet_age_months);
    if let Some(entry) = resolve_tier(&tables.wallet_age_tiers, age) {
        push(
            "wallet_age",
            entry.points,
            format!("Wallet age {age} months (tier >= {} months)", entry.threshold),
        );
    }

    let tx = sanitize(facts.lifetime_tx_count);
    if let Some(entry) = resolve_tier(&tables.lifetime_activity_tiers, tx) {
        push(
            "lifetime_activity",
            entry.points,
            format!("{tx} lifetime transactions (tier >= {})", entry.threshold),
        );
    }

    let volume = sanitize(facts.lifetime_volume);
    if let Some(entry) = resolve_tier(&tables.lifetime_volume_tiers, volume) {
        push(
            "lifetime_volume",
            entry.points,
            format!("Lifetime volume {volume:.2} (tier >= {})", entry.threshold),
        );
    }

    let rates = &tables.genesis;
    let tokens = whole(facts.tokens_discovered);
    push(
        "tokens_discovered",
        tokens.saturating_mul(rates.per_token),
        format!("{tokens} tokens discovered"),
    );
    let dapps = whole(facts.dapps_discovered);
    push(
        "dapps_discovered",
        dapps.saturating_mul(rates.per_dapp),
        format!("{dapps} dapps discovered"),
    );
    if facts.staking_discovered {
        push("staking_discovered", rates.staking, "Staking activity discovered".into());
    }

    let sum = items
        .iter()
        .fold(0u64, |acc, item| acc.saturating_add(item.points));
    GenesisResult {
        total: sum.min(tables.category_caps.genesis),
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_points(result: &GenesisResult, action: &str) -> Option<u64> {
        result
            .items
            .iter()
            .find(|item| item.action == action)
            .map(|item| item.points)
    }

    #[test]
    fn empty_facts_score_zero() {
        let result = compute_genesis(&GenesisFacts::default(), &RuleTables::default());
        assert_eq!(result.total, 0);
        assert!(result.items.is_empty());
    }

    #[test]
    fn tier_lookup_is_threshold_based() {
        let tables = RuleTables::default();
        let facts = GenesisFacts {
            wallet_age_months: 50.0,
            lifetime_tx_count: 1200.0,
            ..Default::default()
        };
        let result = compute_genesis(&facts, &tables);
        assert_eq!(item_points(&result, "wallet_age"), Some(60_000));
        assert_eq!(item_points(&result, "lifetime_activity"), Some(80_000));
        assert_eq!(result.total, 140_000);

        // Far beyond the top thresholds still lands in the same tiers.
        let older = GenesisFacts {
            wallet_age_months: 120.0,
            lifetime_tx_count: 90_000.0,
            ..Default::default()
        };
        assert_eq!(compute_genesis(&older, &tables).total, 140_000);
    }

    #[test]
    fn link_and_ecosystem_bonuses() {
        let tables = RuleTables::default();
        let facts = GenesisFacts {
            account_linked: true,
            first_analysis_done: true,
            mainnet_linked: true,
            testnet_linked: true,
            tokens_discovered: 3.0,
            dapps_discovered: 2.0,
            staking_discovered: true,
            ..Default::default()
        };
        let result = compute_genesis(&facts, &tables);
        let expected = 10_000 + 5_000 + 15_000 + 5_000 + 3 * 2_000 + 2 * 3_000 + 20_000;
        assert_eq!(result.total, expected);
        assert_eq!(result.items.len(), 7);
    }

    #[test]
    fn capped_at_genesis_cap() {
        let tables = RuleTables::default();
        let facts = GenesisFacts {
            tokens_discovered: 1_000_000.0,
            ..Default::default()
        };
        assert_eq!(compute_genesis(&facts, &tables).total, tables.category_caps.genesis);
    }

    #[test]
    fn malformed_facts_are_sanitized() {
        let facts = GenesisFacts {
            wallet_age_months: f64::NAN,
            lifetime_tx_count: -50.0,
            lifetime_volume: f64::INFINITY,
            tokens_discovered: -3.0,
            ..Default::default()
        };
        assert_eq!(compute_genesis(&facts, &RuleTables::default()).total, 0);
    }

    #[test]
    fn monotonic_in_lifetime_inputs() {
        let tables = RuleTables::default();
        let mut last = 0;
        for step in 0..200 {
            let facts = GenesisFacts {
                wallet_age_months: step as f64 * 0.5,
                lifetime_tx_count: step as f64 * 10.0,
                lifetime_volume: step as f64 * 700.0,
                ..Default::default()
            };
            let total = compute_genesis(&facts, &tables).total;
            assert!(total >= last, "step {step}: {total} < {last}");
            last = total;
        }
    }

    #[test]
    fn idempotent() {
        let tables = RuleTables::default();
        let facts = GenesisFacts {
            account_linked: true,
            wallet_age_months: 13.0,
            lifetime_tx_count: 77.0,
            ..Default::default()
        };
        assert_eq!(compute_genesis(&facts, &tables), compute_genesis(&facts, &tables));
    }
}

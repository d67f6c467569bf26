use crate::core::{ActivityCounters, ItemCategory, ScoreItem, Silo, whole};
use crate::scoring::tables::{RuleTables, resolve_tier};

/// Raw point rules for one silo.
///
/// Counters passed in are already sanitized. Returned items carry only
/// positive contributions; their sum is the silo's uncapped raw score.
pub trait SiloRule {
    fn silo(&self) -> Silo;
    fn raw_items(&self, counters: &ActivityCounters, tables: &RuleTables) -> Vec<ScoreItem>;
}

/// The three silos in their display order.
pub fn default_silos() -> Vec<Box<dyn SiloRule + Send + Sync>> {
    vec![
        Box::new(MainnetSilo),
        Box::new(TestnetSilo),
        Box::new(AppEngagementSilo),
    ]
}

/// Collects per-action contributions for a single silo.
struct Items {
    category: ItemCategory,
    items: Vec<ScoreItem>,
}

impl Items {
    fn new(silo: Silo) -> Self {
        Self {
            category: ItemCategory::Silo(silo),
            items: Vec::new(),
        }
    }

    fn add(&mut self, action: &str, points: u64, explanation: String) {
        if points > 0 {
            self.items
                .push(ScoreItem::new(self.category, action, points, explanation));
        }
    }

    fn per_unit(&mut self, action: &str, count: f64, rate: u64, noun: &str) {
        let units = whole(count);
        self.add(action, units.saturating_mul(rate), format!("{units} {noun} x {rate}"));
    }

    fn flag(&mut self, action: &str, set: bool, points: u64, explanation: &str) {
        if set {
            self.add(action, points, explanation.to_string());
        }
    }
}

// --- Individual Silos ---

struct MainnetSilo;
impl SiloRule for MainnetSilo {
    fn silo(&self) -> Silo { Silo::Mainnet }
    fn raw_items(&self, c: &ActivityCounters, t: &RuleTables) -> Vec<ScoreItem> {
        let mut items = Items::new(self.silo());

        let months = c.wallet_age_months();
        if let Some(tier) = resolve_tier(&t.wallet_age_tiers, months) {
            items.add("wallet_age", tier.points, format!("{months} months old (tier >= {})", tier.threshold));
        }
        if let Some(tier) = resolve_tier(&t.lifetime_activity_tiers, c.lifetime_tx_count) {
            items.add(
                "lifetime_activity",
                tier.points,
                format!("{} lifetime transactions (tier >= {})", c.lifetime_tx_count, tier.threshold),
            );
        }
        if let Some(tier) = resolve_tier(&t.lifetime_volume_tiers, c.lifetime_volume) {
            items.add(
                "lifetime_volume",
                tier.points,
                format!("Lifetime volume {:.2} (tier >= {})", c.lifetime_volume, tier.threshold),
            );
        }

        items.flag("account_linked", c.account_linked, t.links.account, "Account linked");
        items.flag("mainnet_linked", c.mainnet_linked, t.links.mainnet, "Mainnet wallet linked");

        items.per_unit("mainnet_transactions", c.mainnet_tx_count, t.mainnet.per_tx, "mainnet transactions");
        items.per_unit("dex_trades", c.dex_trade_count, t.mainnet.per_dex_trade, "dex trades");

        if let Some(tier) = resolve_tier(&t.staking_tiers, c.staking_days) {
            items.add(
                "staking",
                tier.points,
                format!("{} days staked (tier >= {})", c.staking_days, tier.threshold),
            );
        }

        items.per_unit("unique_tokens", c.unique_token_count, t.mainnet.per_token, "unique tokens");
        items.items
    }
}

struct TestnetSilo;
impl SiloRule for TestnetSilo {
    fn silo(&self) -> Silo { Silo::Testnet }
    fn raw_items(&self, c: &ActivityCounters, t: &RuleTables) -> Vec<ScoreItem> {
        let mut items = Items::new(self.silo());
        items.flag("testnet_linked", c.testnet_linked, t.links.testnet, "Testnet wallet linked");
        items.per_unit("testnet_transactions", c.testnet_tx_count, t.testnet.per_tx, "testnet transactions");
        items.per_unit(
            "regular_activity",
            c.regular_activity_weeks,
            t.testnet.per_regular_week,
            "weeks of regular activity",
        );
        items.items
    }
}

struct AppEngagementSilo;
impl SiloRule for AppEngagementSilo {
    fn silo(&self) -> Silo { Silo::AppEngagement }
    fn raw_items(&self, c: &ActivityCounters, t: &RuleTables) -> Vec<ScoreItem> {
        let mut items = Items::new(self.silo());
        items.per_unit("daily_check_ins", c.daily_check_in_count, t.app.per_check_in, "daily check-ins");
        items.per_unit("ad_bonuses", c.ad_bonus_count, t.app.per_ad_bonus, "ad bonuses");
        items.per_unit("reports", c.report_usage_count, t.app.per_report, "reports generated");
        items.per_unit("tools", c.tool_usage_count, t.app.per_tool_use, "tool uses");
        items.items
    }
}

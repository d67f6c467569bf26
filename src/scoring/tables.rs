use serde::Deserialize;

use crate::core::{RewardCategory, Silo, TOTAL_CAP};

/// Rule-table contract violations, detected once at load time.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("category caps sum to {actual}, expected {expected}")]
    CategoryCapSum { expected: u64, actual: u64 },

    #[error("silo weights sum to {0}, expected 1.0")]
    WeightSum(f64),

    #[error("{silo:?} weight {weight} is negative or not finite")]
    InvalidWeight { silo: Silo, weight: f64 },

    #[error("{silo:?} performance cap {cap} must be in 1..={share}")]
    PerformanceCap { silo: Silo, cap: u64, share: u64 },

    #[error("tier table `{0}` must be strictly descending with finite, non-negative thresholds")]
    TierOrder(&'static str),

    #[error("monthly threshold must be at least one day")]
    MonthlyThreshold,
}

/// One row of a tiered bonus table.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TierEntry {
    pub threshold: f64,
    pub points: u64,
}

fn tier(threshold: f64, points: u64) -> TierEntry {
    TierEntry { threshold, points }
}

/// Highest tier whose threshold `value` meets or exceeds.
///
/// Tables are sorted descending by threshold, so the first hit wins.
pub fn resolve_tier(table: &[TierEntry], value: f64) -> Option<&TierEntry> {
    if !value.is_finite() {
        return None;
    }
    table.iter().find(|entry| value >= entry.threshold)
}

/// Points for the highest matching tier, or zero.
pub fn tier_points(table: &[TierEntry], value: f64) -> u64 {
    resolve_tier(table, value).map_or(0, |entry| entry.points)
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SiloParams {
    pub weight: f64,
    /// Raw points that count as 100% performance for the silo.
    pub performance_cap: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SiloTable {
    pub mainnet: SiloParams,
    pub testnet: SiloParams,
    pub app_engagement: SiloParams,
}

impl SiloTable {
    pub fn get(&self, silo: Silo) -> SiloParams {
        match silo {
            Silo::Mainnet => self.mainnet,
            Silo::Testnet => self.testnet,
            Silo::AppEngagement => self.app_engagement,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CategoryCaps {
    pub genesis: u64,
    pub recurring: u64,
    pub app_engagement: u64,
}

impl CategoryCaps {
    pub fn cap(&self, category: RewardCategory) -> u64 {
        match category {
            RewardCategory::Genesis => self.genesis,
            RewardCategory::Recurring => self.recurring,
            RewardCategory::AppEngagement => self.app_engagement,
        }
    }

    pub fn sum(&self) -> u64 {
        self.genesis
            .saturating_add(self.recurring)
            .saturating_add(self.app_engagement)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct LinkBonuses {
    pub account: u64,
    pub first_analysis: u64,
    pub mainnet: u64,
    pub testnet: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct GenesisRates {
    pub per_token: u64,
    pub per_dapp: u64,
    pub staking: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct MainnetRates {
    pub per_tx: u64,
    pub per_dex_trade: u64,
    pub per_token: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct TestnetRates {
    pub per_tx: u64,
    pub per_regular_week: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppRates {
    pub per_check_in: u64,
    pub per_ad_bonus: u64,
    pub per_report: u64,
    pub per_tool_use: u64,
}

/// Per-unit deductions applied to the final total only.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PenaltyWeights {
    pub small_transfer: u64,
    pub frequent_transfer: u64,
    pub sudden_exit: u64,
    pub spam: u64,
    pub farming: u64,
}

/// Rates for rewards emitted by diffing two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScanRates {
    pub per_sent_tx: u64,
    pub per_received_tx: u64,
    pub per_new_token: u64,
    pub per_new_dapp: u64,
    pub per_volume_unit: u64,
    pub first_staking: u64,
    pub first_dex_trade: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct MonthlyRewards {
    pub threshold_days: i64,
    pub balance_increase: u64,
    pub continued_activity: u64,
    pub new_dapp_usage: u64,
    pub volume_growth: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngagementRewards {
    pub check_in: u64,
    pub referral: u64,
    pub referral_milestone_every: u32,
    pub referral_milestone_bonus: u64,
    pub task: u64,
    pub claim_week_days: i64,
}

/// Every point value, threshold and cap used by scoring and rewards.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuleTables {
    pub silos: SiloTable,
    pub category_caps: CategoryCaps,
    /// Wallet age in months.
    pub wallet_age_tiers: Vec<TierEntry>,
    /// Lifetime transaction count.
    pub lifetime_activity_tiers: Vec<TierEntry>,
    pub lifetime_volume_tiers: Vec<TierEntry>,
    /// Days staked.
    pub staking_tiers: Vec<TierEntry>,
    pub links: LinkBonuses,
    pub genesis: GenesisRates,
    pub mainnet: MainnetRates,
    pub testnet: TestnetRates,
    pub app: AppRates,
    pub penalties: PenaltyWeights,
    pub scan: ScanRates,
    pub monthly: MonthlyRewards,
    pub engagement: EngagementRewards,
}

impl Default for SiloTable {
    fn default() -> Self {
        Self {
            mainnet: SiloParams { weight: 0.5, performance_cap: 400_000 },
            testnet: SiloParams { weight: 0.3, performance_cap: 200_000 },
            app_engagement: SiloParams { weight: 0.2, performance_cap: 150_000 },
        }
    }
}

impl Default for CategoryCaps {
    fn default() -> Self {
        Self {
            genesis: 500_000,
            recurring: 200_000,
            app_engagement: 300_000,
        }
    }
}

impl Default for LinkBonuses {
    fn default() -> Self {
        Self {
            account: 10_000,
            first_analysis: 5_000,
            mainnet: 15_000,
            testnet: 5_000,
        }
    }
}

impl Default for GenesisRates {
    fn default() -> Self {
        Self {
            per_token: 2_000,
            per_dapp: 3_000,
            staking: 20_000,
        }
    }
}

impl Default for MainnetRates {
    fn default() -> Self {
        Self {
            per_tx: 100,
            per_dex_trade: 500,
            per_token: 1_000,
        }
    }
}

impl Default for TestnetRates {
    fn default() -> Self {
        Self {
            per_tx: 200,
            per_regular_week: 1_500,
        }
    }
}

impl Default for AppRates {
    fn default() -> Self {
        Self {
            per_check_in: 1_000,
            per_ad_bonus: 300,
            per_report: 2_000,
            per_tool_use: 1_000,
        }
    }
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            small_transfer: 500,
            frequent_transfer: 1_000,
            sudden_exit: 5_000,
            spam: 2_000,
            farming: 10_000,
        }
    }
}

impl Default for ScanRates {
    fn default() -> Self {
        Self {
            per_sent_tx: 500,
            per_received_tx: 250,
            per_new_token: 1_000,
            per_new_dapp: 2_000,
            per_volume_unit: 10,
            first_staking: 10_000,
            first_dex_trade: 5_000,
        }
    }
}

impl Default for MonthlyRewards {
    fn default() -> Self {
        Self {
            threshold_days: 28,
            balance_increase: 5_000,
            continued_activity: 3_000,
            new_dapp_usage: 4_000,
            volume_growth: 4_000,
        }
    }
}

impl Default for EngagementRewards {
    fn default() -> Self {
        Self {
            check_in: 1_000,
            referral: 5_000,
            referral_milestone_every: 5,
            referral_milestone_bonus: 15_000,
            task: 2_000,
            claim_week_days: 7,
        }
    }
}

impl Default for RuleTables {
    fn default() -> Self {
        Self {
            silos: SiloTable::default(),
            category_caps: CategoryCaps::default(),
            wallet_age_tiers: vec![
                tier(48.0, 60_000),
                tier(36.0, 45_000),
                tier(24.0, 30_000),
                tier(12.0, 18_000),
                tier(6.0, 9_000),
                tier(1.0, 3_000),
            ],
            lifetime_activity_tiers: vec![
                tier(1000.0, 80_000),
                tier(500.0, 50_000),
                tier(100.0, 25_000),
                tier(50.0, 12_000),
                tier(10.0, 5_000),
                tier(1.0, 1_000),
            ],
            lifetime_volume_tiers: vec![
                tier(100_000.0, 60_000),
                tier(10_000.0, 35_000),
                tier(1_000.0, 15_000),
                tier(100.0, 5_000),
                tier(10.0, 1_000),
            ],
            staking_tiers: vec![
                tier(365.0, 40_000),
                tier(180.0, 25_000),
                tier(90.0, 15_000),
                tier(30.0, 7_000),
                tier(1.0, 2_000),
            ],
            links: LinkBonuses::default(),
            genesis: GenesisRates::default(),
            mainnet: MainnetRates::default(),
            testnet: TestnetRates::default(),
            app: AppRates::default(),
            penalties: PenaltyWeights::default(),
            scan: ScanRates::default(),
            monthly: MonthlyRewards::default(),
            engagement: EngagementRewards::default(),
        }
    }
}

fn check_descending(name: &'static str, table: &[TierEntry]) -> Result<(), ConfigError> {
    let finite = table
        .iter()
        .all(|entry| entry.threshold.is_finite() && entry.threshold >= 0.0);
    let descending = table.windows(2).all(|pair| pair[0].threshold > pair[1].threshold);
    if finite && descending {
        Ok(())
    } else {
        Err(ConfigError::TierOrder(name))
    }
}

impl RuleTables {
    /// Check the table contracts. Run once when configuration is loaded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cap_sum = self.category_caps.sum();
        if cap_sum != TOTAL_CAP {
            return Err(ConfigError::CategoryCapSum {
                expected: TOTAL_CAP,
                actual: cap_sum,
            });
        }

        let mut weight_sum = 0.0;
        for silo in Silo::ALL {
            let params = self.silos.get(silo);
            if !params.weight.is_finite() || params.weight < 0.0 {
                return Err(ConfigError::InvalidWeight { silo, weight: params.weight });
            }
            weight_sum += params.weight;
        }
        if (weight_sum - 1.0).abs() > 1e-9 {
            return Err(ConfigError::WeightSum(weight_sum));
        }

        for silo in Silo::ALL {
            let params = self.silos.get(silo);
            let share = (params.weight * TOTAL_CAP as f64).round() as u64;
            if params.performance_cap == 0 || params.performance_cap > share {
                return Err(ConfigError::PerformanceCap {
                    silo,
                    cap: params.performance_cap,
                    share,
                });
            }
        }

        check_descending("wallet_age_tiers", &self.wallet_age_tiers)?;
        check_descending("lifetime_activity_tiers", &self.lifetime_activity_tiers)?;
        check_descending("lifetime_volume_tiers", &self.lifetime_volume_tiers)?;
        check_descending("staking_tiers", &self.staking_tiers)?;

        if self.monthly.threshold_days < 1 {
            return Err(ConfigError::MonthlyThreshold);
        }
        Ok(())
    }
}

pub mod pipeline;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound for every total score and for the sum of all claimed rewards.
pub const TOTAL_CAP: u64 = 1_000_000;

/// Coerce a raw counter to a finite, non-negative value.
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 { value } else { 0.0 }
}

/// Whole units of a sanitized counter (fractional counts are floored).
pub fn whole(value: f64) -> u64 {
    sanitize(value).floor() as u64
}

/// Instantaneous per-silo activity counters used for score computation.
///
/// Counters arrive from an external fetcher and may be malformed, so every
/// numeric field is an `f64` that is sanitized before use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityCounters {
    pub account_linked: bool,
    pub mainnet_linked: bool,
    pub testnet_linked: bool,
    pub wallet_age_days: f64,
    pub lifetime_tx_count: f64,
    pub lifetime_volume: f64,
    pub mainnet_tx_count: f64,
    pub testnet_tx_count: f64,
    pub dex_trade_count: f64,
    pub unique_token_count: f64,
    pub staking_days: f64,
    pub daily_check_in_count: f64,
    pub ad_bonus_count: f64,
    pub report_usage_count: f64,
    pub tool_usage_count: f64,
    pub regular_activity_weeks: f64,
    // Negative signals
    pub small_external_transfers: f64,
    pub frequent_external_transfers: f64,
    pub sudden_exits: f64,
    pub spam_count: f64,
    pub farming_instances: f64,
}

impl ActivityCounters {
    /// Copy with every numeric field coerced to a finite, non-negative value.
    pub fn sanitized(&self) -> Self {
        Self {
            account_linked: self.account_linked,
            mainnet_linked: self.mainnet_linked,
            testnet_linked: self.testnet_linked,
            wallet_age_days: sanitize(self.wallet_age_days),
            lifetime_tx_count: sanitize(self.lifetime_tx_count),
            lifetime_volume: sanitize(self.lifetime_volume),
            mainnet_tx_count: sanitize(self.mainnet_tx_count),
            testnet_tx_count: sanitize(self.testnet_tx_count),
            dex_trade_count: sanitize(self.dex_trade_count),
            unique_token_count: sanitize(self.unique_token_count),
            staking_days: sanitize(self.staking_days),
            daily_check_in_count: sanitize(self.daily_check_in_count),
            ad_bonus_count: sanitize(self.ad_bonus_count),
            report_usage_count: sanitize(self.report_usage_count),
            tool_usage_count: sanitize(self.tool_usage_count),
            regular_activity_weeks: sanitize(self.regular_activity_weeks),
            small_external_transfers: sanitize(self.small_external_transfers),
            frequent_external_transfers: sanitize(self.frequent_external_transfers),
            sudden_exits: sanitize(self.sudden_exits),
            spam_count: sanitize(self.spam_count),
            farming_instances: sanitize(self.farming_instances),
        }
    }

    /// Wallet age in whole 30-day months.
    pub fn wallet_age_months(&self) -> f64 {
        (sanitize(self.wallet_age_days) / 30.0).floor()
    }
}

/// Point-in-time capture of cumulative wallet activity, diffed between scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySnapshot {
    pub wallet_address: String,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub tx_count: f64,
    #[serde(default)]
    pub sent_count: f64,
    #[serde(default)]
    pub received_count: f64,
    #[serde(default)]
    pub total_volume: f64,
    #[serde(default)]
    pub unique_contacts: f64,
    #[serde(default)]
    pub unique_tokens: f64,
    #[serde(default)]
    pub unique_dapps: f64,
    #[serde(default)]
    pub staking_detected: bool,
    #[serde(default)]
    pub dex_trade_detected: bool,
    pub taken_at: DateTime<Utc>,
}

impl ActivitySnapshot {
    /// An all-zero snapshot for `wallet_address` taken at `taken_at`.
    pub fn empty(wallet_address: impl Into<String>, taken_at: DateTime<Utc>) -> Self {
        Self {
            wallet_address: wallet_address.into(),
            balance: 0.0,
            tx_count: 0.0,
            sent_count: 0.0,
            received_count: 0.0,
            total_volume: 0.0,
            unique_contacts: 0.0,
            unique_tokens: 0.0,
            unique_dapps: 0.0,
            staking_detected: false,
            dex_trade_detected: false,
            taken_at,
        }
    }

    pub fn sanitized(&self) -> Self {
        Self {
            wallet_address: self.wallet_address.trim().to_string(),
            balance: sanitize(self.balance),
            tx_count: sanitize(self.tx_count),
            sent_count: sanitize(self.sent_count),
            received_count: sanitize(self.received_count),
            total_volume: sanitize(self.total_volume),
            unique_contacts: sanitize(self.unique_contacts),
            unique_tokens: sanitize(self.unique_tokens),
            unique_dapps: sanitize(self.unique_dapps),
            staking_detected: self.staking_detected,
            dex_trade_detected: self.dex_trade_detected,
            taken_at: self.taken_at,
        }
    }
}

/// Lifetime facts evaluated once, on a wallet's first successful scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisFacts {
    pub account_linked: bool,
    pub first_analysis_done: bool,
    pub mainnet_linked: bool,
    pub testnet_linked: bool,
    pub wallet_age_months: f64,
    pub lifetime_tx_count: f64,
    pub lifetime_volume: f64,
    pub tokens_discovered: f64,
    pub dapps_discovered: f64,
    pub staking_discovered: bool,
}

/// One of the three independently weighted scoring silos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Silo {
    Mainnet,
    Testnet,
    AppEngagement,
}

impl Silo {
    pub const ALL: [Silo; 3] = [Silo::Mainnet, Silo::Testnet, Silo::AppEngagement];
}

/// Derived per-silo score; recomputed on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiloScore {
    pub silo: Silo,
    /// Raw points, already clamped to `performance_cap`.
    pub raw_points: u64,
    pub performance_cap: u64,
    /// `raw_points / performance_cap` in [0, 1].
    pub performance_ratio: f64,
    pub weight: f64,
    pub weighted_contribution: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemCategory {
    Silo(Silo),
    Genesis,
    Penalty,
}

/// One auditable line of a score computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreItem {
    pub category: ItemCategory,
    pub action: String,
    pub points: u64,
    pub explanation: String,
}

impl ScoreItem {
    pub fn new(category: ItemCategory, action: &str, points: u64, explanation: String) -> Self {
        Self {
            category,
            action: action.to_string(),
            points,
            explanation,
        }
    }
}

/// Ten ordered trust tiers. Ranges are `[min_score, next.min_score)`; the
/// last tier runs to `TOTAL_CAP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrustTier {
    Newcomer,
    Explorer,
    Participant,
    Contributor,
    Trusted,
    Established,
    Respected,
    Distinguished,
    Elite,
    Legend,
}

impl TrustTier {
    pub const ALL: [TrustTier; 10] = [
        TrustTier::Newcomer,
        TrustTier::Explorer,
        TrustTier::Participant,
        TrustTier::Contributor,
        TrustTier::Trusted,
        TrustTier::Established,
        TrustTier::Respected,
        TrustTier::Distinguished,
        TrustTier::Elite,
        TrustTier::Legend,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Inclusive lower bound of the tier.
    pub fn min_score(self) -> u64 {
        match self {
            TrustTier::Newcomer => 0,
            TrustTier::Explorer => 10_000,
            TrustTier::Participant => 50_000,
            TrustTier::Contributor => 100_000,
            TrustTier::Trusted => 200_000,
            TrustTier::Established => 350_000,
            TrustTier::Respected => 500_000,
            TrustTier::Distinguished => 650_000,
            TrustTier::Elite => 800_000,
            TrustTier::Legend => 950_000,
        }
    }

    /// Exclusive upper bound; `TOTAL_CAP` for the top tier.
    pub fn max_score(self) -> u64 {
        self.next().map_or(TOTAL_CAP, TrustTier::min_score)
    }

    pub fn next(self) -> Option<TrustTier> {
        TrustTier::ALL.get(self.index() + 1).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            TrustTier::Newcomer => "Newcomer",
            TrustTier::Explorer => "Explorer",
            TrustTier::Participant => "Participant",
            TrustTier::Contributor => "Contributor",
            TrustTier::Trusted => "Trusted",
            TrustTier::Established => "Established",
            TrustTier::Respected => "Respected",
            TrustTier::Distinguished => "Distinguished",
            TrustTier::Elite => "Elite",
            TrustTier::Legend => "Legend",
        }
    }
}

/// Where a score sits within the tier ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub tier: TrustTier,
    pub tier_index: usize,
    /// Progress through the current tier, 0-100.
    pub progress_percent: f64,
    pub next_tier: Option<TrustTier>,
    pub points_to_next: u64,
}

/// Output of a reputation computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationResult {
    pub total_score: u64,
    pub silos: Vec<SiloScore>,
    pub penalty_total: u64,
    pub level: LevelProgress,
    pub items: Vec<ScoreItem>,
}

/// Claim categories, each with its own cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardCategory {
    Genesis,
    Recurring,
    AppEngagement,
}

impl RewardCategory {
    pub const ALL: [RewardCategory; 3] = [
        RewardCategory::Genesis,
        RewardCategory::Recurring,
        RewardCategory::AppEngagement,
    ];
}

/// Permanently claimed points per category.
pub type ClaimedTotals = BTreeMap<RewardCategory, u64>;

/// A reward generated from newly observed activity, awaiting a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReward {
    pub id: String,
    pub category: RewardCategory,
    pub action: String,
    pub points: u64,
    pub created_at: DateTime<Utc>,
    pub description: String,
}

impl PendingReward {
    /// Build a reward whose id is derived from `owner`, `action` and `at`.
    pub fn new(
        owner: &str,
        category: RewardCategory,
        action: &str,
        points: u64,
        at: DateTime<Utc>,
        description: String,
    ) -> Self {
        Self {
            id: format!("{owner}:{action}:{}", at.timestamp_millis()),
            category,
            action: action.to_string(),
            points,
            created_at: at,
            description,
        }
    }
}

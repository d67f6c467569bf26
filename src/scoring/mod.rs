pub mod genesis;
pub mod level;
pub mod silos;
pub mod tables;

use crate::core::{
    ActivityCounters, ItemCategory, ReputationResult, ScoreItem, Silo, SiloScore, TOTAL_CAP, whole,
};
use silos::SiloRule;
use tables::RuleTables;

/// Applies every silo rule and the penalty table to produce a capped score.
///
/// Holds no mutable state; one engine can be shared across threads.
pub struct ReputationEngine {
    tables: RuleTables,
    silos: Vec<Box<dyn SiloRule + Send + Sync>>,
}

impl ReputationEngine {
    pub fn new(tables: RuleTables) -> Self {
        Self {
            tables,
            silos: silos::default_silos(),
        }
    }

    pub fn tables(&self) -> &RuleTables {
        &self.tables
    }

    pub fn compute(&self, counters: &ActivityCounters) -> ReputationResult {
        let counters = counters.sanitized();
        let mut items = Vec::new();
        let mut silo_scores = Vec::with_capacity(self.silos.len());

        for rule in &self.silos {
            let raw_items = rule.raw_items(&counters, &self.tables);
            let raw_sum = raw_items
                .iter()
                .fold(0u64, |acc, item| acc.saturating_add(item.points));
            let params = self.tables.silos.get(rule.silo());
            silo_scores.push(score_silo(rule.silo(), raw_sum, params));
            items.extend(raw_items);
        }

        let weighted_sum = silo_scores
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.weighted_contribution));

        let penalty_items = penalty_items(&counters, &self.tables);
        let penalty_total = penalty_items
            .iter()
            .fold(0u64, |acc, item| acc.saturating_add(item.points));
        items.extend(penalty_items);

        let total_score = weighted_sum.min(TOTAL_CAP).saturating_sub(penalty_total);

        ReputationResult {
            total_score,
            silos: silo_scores,
            penalty_total,
            level: level::level_progress(total_score),
            items,
        }
    }
}

impl Default for ReputationEngine {
    fn default() -> Self {
        Self::new(RuleTables::default())
    }
}

/// Compute a reputation result with the given rule tables.
pub fn compute_reputation(counters: &ActivityCounters, tables: &RuleTables) -> ReputationResult {
    ReputationEngine::new(tables.clone()).compute(counters)
}

/// Clamp a raw silo total to its performance cap and weight it against `TOTAL_CAP`.
pub fn score_silo(silo: Silo, raw_sum: u64, params: tables::SiloParams) -> SiloScore {
    let cap = params.performance_cap;
    let raw_points = raw_sum.min(cap);
    let performance_ratio = if cap == 0 {
        0.0
    } else {
        (raw_points as f64 / cap as f64).clamp(0.0, 1.0)
    };
    let weight = if params.weight.is_finite() { params.weight.max(0.0) } else { 0.0 };
    let weighted_contribution = (performance_ratio * weight * TOTAL_CAP as f64).round() as u64;

    SiloScore {
        silo,
        raw_points,
        performance_cap: cap,
        performance_ratio,
        weight,
        weighted_contribution,
    }
}

/// Linear penalties over the negative-signal counters.
fn penalty_items(c: &ActivityCounters, t: &RuleTables) -> Vec<ScoreItem> {
    let p = &t.penalties;
    [
        ("small_transfers", c.small_external_transfers, p.small_transfer, "small external transfers"),
        ("frequent_transfers", c.frequent_external_transfers, p.frequent_transfer, "frequent external transfers"),
        ("sudden_exits", c.sudden_exits, p.sudden_exit, "sudden exits"),
        ("spam", c.spam_count, p.spam, "spam reports"),
        ("farming", c.farming_instances, p.farming, "farming instances"),
    ]
    .into_iter()
    .filter_map(|(action, count, weight, noun)| {
        let units = whole(count);
        let points = units.saturating_mul(weight);
        (points > 0).then(|| {
            ScoreItem::new(ItemCategory::Penalty, action, points, format!("{units} {noun} x -{weight}"))
        })
    })
    .collect()
}

use crate::core::{LevelProgress, TOTAL_CAP, TrustTier};

/// Resolve the trust tier for `total_score` and the progress through it.
///
/// Scores above `TOTAL_CAP` are treated as `TOTAL_CAP`.
pub fn level_progress(total_score: u64) -> LevelProgress {
    let score = total_score.min(TOTAL_CAP);
    let tier = TrustTier::ALL
        .iter()
        .copied()
        .find(|tier| score >= tier.min_score() && score < tier.max_score())
        .unwrap_or(TrustTier::Legend);

    let min = tier.min_score();
    let span = tier.max_score().saturating_sub(min);
    let progress_percent = if span == 0 {
        100.0
    } else {
        ((score - min) as f64 / span as f64 * 100.0).clamp(0.0, 100.0)
    };
    let next_tier = tier.next();
    let points_to_next = next_tier.map_or(0, |next| next.min_score().saturating_sub(score));

    LevelProgress {
        tier,
        tier_index: tier.index(),
        progress_percent,
        next_tier,
        points_to_next,
    }
}

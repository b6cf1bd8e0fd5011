//! Consensus: merges per-provider match scores into the single decision value.
//!
//! Rounding: mean rounded to the nearest integer, ties half away from zero. Scores are
//! non-negative, so a tie always rounds up (85.5 → 86). Integer arithmetic only.

/// Mean of all scores, rounded half away from zero. Empty input yields 0.
pub fn average_scores(scores: &[u32]) -> u32 {
    if scores.is_empty() {
        return 0;
    }
    let n = scores.len() as u64;
    let sum: u64 = scores.iter().map(|&s| u64::from(s)).sum();
    // floor((2·sum + n) / 2n) == round_half_up(sum / n) for non-negative sums
    ((2 * sum + n) / (2 * n)) as u32
}

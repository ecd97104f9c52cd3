//! Ebbinghaus forgetting-curve decay and spaced-repetition stability boost.
//!
//! Pure functions only - no store access, no clock reads beyond what the
//! caller supplies - so every property here is checkable without I/O.

use crate::config::DecayConfig;

/// `R(t) = clamp(S · e^(−t/τ) + I, 0, 1)`.
pub fn retrievability(stability: f64, hours_elapsed: f64, importance: f64, tau_hours: f64) -> f64 {
    let raw = stability * (-hours_elapsed / tau_hours).exp() + importance;
    raw.clamp(0.0, 1.0)
}

/// Whether a node's current retrievability flags it for reinforcement.
pub fn needs_reinforcement(retrievability: f64, config: &DecayConfig) -> bool {
    retrievability < config.reinforcement_threshold
}

/// `S' = min(1, S + (0.1 + (1 − R) · 0.3))`.
///
/// Lower retrievability at the moment of recall yields a larger boost,
/// which is the spaced-repetition property: forgetting more, then
/// recalling successfully, strengthens the memory more.
pub fn stability_boost(stability: f64, retrievability_at_recall: f64) -> f64 {
    let boost = 0.1 + (1.0 - retrievability_at_recall) * 0.3;
    (stability + boost).min(1.0)
}

/// Discrete review-interval ladder, indexed by `⌊S·7⌋`, scaled by
/// `0.5 + 0.5·R`.
pub fn optimal_review_interval_hours(stability: f64, retrievability: f64, config: &DecayConfig) -> f64 {
    let index = ((stability * 7.0).floor() as usize).min(config.review_ladder_hours.len() - 1);
    let base = config.review_ladder_hours[index];
    base * (0.5 + 0.5 * retrievability)
}

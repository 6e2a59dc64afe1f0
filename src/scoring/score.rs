//! Bounded health score from model probability plus feature deviations.
//!
//! Score policy: start from `100 * (1 - p)`, subtract one penalty per
//! weighted feature proportional to how far its value sits outside the
//! reference band, clamp to [0, 100]. Monotonic non-increasing in `p`
//! with features fixed; the penalty term is independent of `p`.

use std::cmp::Ordering;

use serde_json::Value;

use crate::config::EngineConfig;
use crate::reconcile::FeatureMap;
use crate::schema::Task;

/// Score range bounds.
pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

/// Ranked contributors are truncated to this many entries.
pub const TOP_CONTRIBUTORS: usize = 5;

/// Compute the health score and the ranked `(feature, penalty)`
/// breakdown. Missing, null, and non-numeric features contribute zero
/// and never rank. Degenerate probabilities are clamped, not raised.
pub fn compute_score(
    config: &EngineConfig,
    task: Task,
    features: &FeatureMap,
    probability: f64,
) -> (f64, Vec<(String, f64)>) {
    let p = sanitize_probability(probability);
    let base = SCORE_MAX * (1.0 - p);

    let mut contributions: Vec<(String, f64)> = Vec::new();
    for w in config.weights.for_task(task) {
        let Some(value) = features.get(&w.feature).and_then(Value::as_f64) else {
            continue;
        };
        let Some(range) = config.range_for(task, &w.feature) else {
            continue;
        };
        let half = (range.max - range.min) / 2.0;
        if half <= 0.0 {
            continue;
        }
        let mid = (range.min + range.max) / 2.0;
        let excess = (((value - mid).abs() - half).max(0.0) / half).min(1.0);
        let penalty = w.points * excess;
        if penalty > 0.0 {
            contributions.push((w.feature.clone(), penalty));
        }
    }

    let total: f64 = contributions.iter().map(|(_, p)| p).sum();
    let score = (base - total).clamp(SCORE_MIN, SCORE_MAX);

    // Stable sort keeps the schema-order declaration for equal penalties.
    contributions.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    contributions.truncate(TOP_CONTRIBUTORS);

    (score, contributions)
}

/// Clamp a degenerate model probability into [0, 1]. A non-finite
/// probability falls back to the neutral 0.5. Logged as a data-quality
/// signal either way.
fn sanitize_probability(probability: f64) -> f64 {
    if !probability.is_finite() {
        tracing::warn!(probability, "non-finite model probability; using 0.5");
        return 0.5;
    }
    if !(0.0..=1.0).contains(&probability) {
        tracing::warn!(probability, "model probability outside [0,1]; clamping");
        return probability.clamp(0.0, 1.0);
    }
    probability
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> EngineConfig {
        EngineConfig::bundled()
    }

    fn features(entries: &[(&str, Value)]) -> FeatureMap {
        let mut out = FeatureMap::new();
        for (k, v) in entries {
            out.insert(k.to_string(), v.clone());
        }
        out
    }

    #[test]
    fn in_range_features_score_from_probability_alone() {
        let config = config();
        let feats = features(&[("trestbps", json!(110.0)), ("chol", json!(180.0))]);
        let (score, breakdown) = compute_score(&config, Task::Heart, &feats, 0.2);
        assert!((score - 80.0).abs() < 1e-9, "got {score}");
        assert!(breakdown.is_empty());
    }

    #[test]
    fn out_of_band_feature_subtracts_penalty() {
        let config = config();
        // trestbps band [90, 120]: mid 105, half 15. 150 -> excess 2.0
        // capped at 1.0 -> full 12 points.
        let feats = features(&[("trestbps", json!(150.0))]);
        let (score, breakdown) = compute_score(&config, Task::Heart, &feats, 0.0);
        assert!((score - 88.0).abs() < 1e-9, "got {score}");
        assert_eq!(breakdown.len(), 1);
        assert_eq!(breakdown[0].0, "trestbps");
        assert!((breakdown[0].1 - 12.0).abs() < 1e-9);
    }

    #[test]
    fn monotonic_in_probability() {
        let config = config();
        let feats = features(&[("trestbps", json!(150.0)), ("chol", json!(245.0))]);
        let (low_p, _) = compute_score(&config, Task::Heart, &feats, 0.2);
        let (high_p, _) = compute_score(&config, Task::Heart, &feats, 0.8);
        assert!(high_p < low_p, "score must not increase with adverse probability");

        let mut last = f64::MAX;
        for i in 0..=10 {
            let p = i as f64 / 10.0;
            let (score, _) = compute_score(&config, Task::Heart, &feats, p);
            assert!(score <= last, "not monotonic at p={p}");
            last = score;
        }
    }

    #[test]
    fn score_bounded_under_extremes() {
        let config = config();
        let extreme = features(&[
            ("trestbps", json!(400.0)),
            ("chol", json!(1000.0)),
            ("thalach", json!(300.0)),
            ("oldpeak", json!(9.0)),
        ]);
        for p in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let (score, _) = compute_score(&config, Task::Heart, &extreme, p);
            assert!((SCORE_MIN..=SCORE_MAX).contains(&score), "p={p} score={score}");
        }
        let (floor, _) = compute_score(&config, Task::Heart, &extreme, 1.0);
        assert_eq!(floor, SCORE_MIN);
    }

    #[test]
    fn degenerate_probability_clamped() {
        let config = config();
        let feats = features(&[]);
        let (over, _) = compute_score(&config, Task::Heart, &feats, 1.7);
        assert_eq!(over, SCORE_MIN);
        let (under, _) = compute_score(&config, Task::Heart, &feats, -0.3);
        assert_eq!(under, SCORE_MAX);
        let (nan, _) = compute_score(&config, Task::Heart, &feats, f64::NAN);
        assert!((nan - 50.0).abs() < 1e-9);
    }

    #[test]
    fn missing_and_null_features_contribute_zero() {
        let config = config();
        let feats = features(&[
            ("trestbps", Value::Null),
            ("chol", json!("pending")),
            ("thalach", json!(140.0)),
        ]);
        let (score, breakdown) = compute_score(&config, Task::Heart, &feats, 0.0);
        assert_eq!(score, SCORE_MAX);
        assert!(breakdown.is_empty());
    }

    #[test]
    fn ranking_descends_with_schema_order_tie_break() {
        let config = config();
        // trestbps and chol both fully out of band -> equal 12-point
        // penalties; trestbps precedes chol in the heart schema.
        // thalach takes a smaller hit and ranks below both.
        let feats = features(&[
            ("chol", json!(1000.0)),
            ("trestbps", json!(400.0)),
            ("thalach", json!(188.0)),
        ]);
        let (_, breakdown) = compute_score(&config, Task::Heart, &feats, 0.5);
        let names: Vec<&str> = breakdown.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["trestbps", "chol", "thalach"]);
    }

    #[test]
    fn deterministic_across_runs() {
        let config = config();
        let feats = features(&[
            ("trestbps", json!(150.0)),
            ("chol", json!(245.0)),
            ("oldpeak", json!(2.5)),
        ]);
        let first = compute_score(&config, Task::Heart, &feats, 0.37);
        let second = compute_score(&config, Task::Heart, &feats, 0.37);
        assert_eq!(first, second);
    }

    #[test]
    fn truncates_to_top_contributors() {
        let config = config();
        let feats = features(&[
            ("trestbps", json!(400.0)),
            ("chol", json!(1000.0)),
            ("thalach", json!(300.0)),
            ("oldpeak", json!(9.0)),
        ]);
        let (_, breakdown) = compute_score(&config, Task::Heart, &feats, 0.5);
        assert!(breakdown.len() <= TOP_CONTRIBUTORS);
        assert_eq!(breakdown.len(), 4);
    }

    #[test]
    fn general_task_scores_probability_only() {
        let config = config();
        let feats = features(&[("glucose", json!(300.0))]);
        let (score, breakdown) = compute_score(&config, Task::General, &feats, 0.4);
        assert!((score - 60.0).abs() < 1e-9);
        assert!(breakdown.is_empty());
    }
}

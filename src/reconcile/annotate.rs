//! Per-feature provenance, confidence, and normal-range annotation.
//!
//! Annotation is total over the feature list: a feature whose
//! computation fails is downgraded to a low-confidence unknown record
//! with the reason surfaced, never dropped and never fatal.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::config::EngineConfig;
use crate::schema::Task;

use super::types::{ExtractionMeta, FeatureMap, NormalRange, Provenance, RawOrigin, RawPair, RawPairs};

/// Fixed confidence tiers per provenance. The contract is the strict
/// ordering parsed/llm above imputed/unknown, not the literal values.
pub mod confidence_tiers {
    /// Value observed in parsed document text.
    pub const PARSED: f64 = 0.92;

    /// Value observed by the LLM extraction pass.
    pub const LLM: f64 = 0.93;

    /// Value resolved without a matching raw pair.
    pub const IMPUTED: f64 = 0.50;

    /// No value and no raw pair.
    pub const UNKNOWN: f64 = 0.50;
}

/// Localized annotation failure. Downgraded by the batch wrapper,
/// never propagated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnnotationFailure {
    #[error("Reference range for {feature} is invalid (min {min} > max {max})")]
    InvalidRange { feature: String, min: f64, max: f64 },
}

/// Annotate every feature in `target`. Returns one record per feature
/// plus the failures that were downgraded along the way.
pub fn annotate_features(
    config: &EngineConfig,
    task: Task,
    target: &[String],
    resolved: &FeatureMap,
    raw_pairs: &RawPairs,
) -> (BTreeMap<String, ExtractionMeta>, Vec<AnnotationFailure>) {
    let mut meta = BTreeMap::new();
    let mut degraded = Vec::new();

    for feature in target {
        let record = match annotate_feature(config, task, feature, resolved.get(feature), raw_pairs)
        {
            Ok(record) => record,
            Err(failure) => {
                tracing::warn!(feature = %feature, error = %failure, "annotation degraded");
                let fallback = degraded_meta(resolved.get(feature), raw_pairs.get(feature));
                degraded.push(failure);
                fallback
            }
        };
        meta.insert(feature.clone(), record);
    }

    (meta, degraded)
}

/// Annotate one feature.
pub fn annotate_feature(
    config: &EngineConfig,
    task: Task,
    feature: &str,
    resolved: Option<&Value>,
    raw_pairs: &RawPairs,
) -> Result<ExtractionMeta, AnnotationFailure> {
    let raw = raw_pairs.get(feature);
    let value = resolved.cloned().unwrap_or(Value::Null);

    let source = match raw {
        Some(pair) => match pair.origin {
            RawOrigin::Text => Provenance::Parsed,
            RawOrigin::Llm => Provenance::Llm,
        },
        None if !value.is_null() => Provenance::Imputed,
        None => Provenance::Unknown,
    };

    let confidence = match source {
        Provenance::Parsed => confidence_tiers::PARSED,
        Provenance::Llm => confidence_tiers::LLM,
        Provenance::Imputed => confidence_tiers::IMPUTED,
        Provenance::Unknown => confidence_tiers::UNKNOWN,
    };

    let normal_range = match config.range_for(task, feature) {
        Some(r) if r.min > r.max => {
            return Err(AnnotationFailure::InvalidRange {
                feature: feature.to_string(),
                min: r.min,
                max: r.max,
            })
        }
        Some(r) => Some(NormalRange {
            min: r.min,
            max: r.max,
        }),
        None => None,
    };

    let out_of_range = match (normal_range, value.as_f64()) {
        (Some(range), Some(v)) => v < range.min || v > range.max,
        _ => false,
    };

    Ok(ExtractionMeta {
        value,
        unit: raw.map(|p| p.unit.clone()).filter(|u| !u.is_empty()),
        confidence,
        source,
        normal_range,
        out_of_range,
    })
}

fn degraded_meta(resolved: Option<&Value>, raw: Option<&RawPair>) -> ExtractionMeta {
    ExtractionMeta {
        value: resolved.cloned().unwrap_or(Value::Null),
        unit: raw.map(|p| p.unit.clone()).filter(|u| !u.is_empty()),
        confidence: confidence_tiers::UNKNOWN,
        source: Provenance::Unknown,
        normal_range: None,
        out_of_range: false,
    }
}

/// Mean confidence over features that resolved a value; 0.0 when none
/// did. Feeds the ingestion outcome.
pub fn overall_confidence(meta: &BTreeMap<String, ExtractionMeta>) -> f64 {
    let resolved: Vec<f64> = meta
        .values()
        .filter(|m| !m.value.is_null())
        .map(|m| m.confidence)
        .collect();
    if resolved.is_empty() {
        return 0.0;
    }
    resolved.iter().sum::<f64>() / resolved.len() as f64
}

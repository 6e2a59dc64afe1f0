//! Maps free-text lab pairs onto a task's canonical feature list.
//!
//! Matching is exact lowercase name first, then the versioned alias
//! table. Every raw pair either contributes to a canonical feature or
//! produces a warning; nothing is silently dropped.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::schema::{FieldKind, FieldSpec, Task};

use super::types::{MappedFeatures, MappingWarning, RawPair, RawPairs};

/// Map raw extracted pairs onto `target`, in raw insertion order.
/// Returns resolved features, the unresolved targets in target order,
/// and the warnings accumulated along the way. Pure function.
pub fn map_features(
    config: &EngineConfig,
    task: Task,
    raw_pairs: &RawPairs,
    target: &[FieldSpec],
) -> MappedFeatures {
    let mut out = MappedFeatures::default();
    // Canonical feature -> raw name that currently backs it, for the
    // deterministic last-wins duplicate policy.
    let mut backing: HashMap<String, String> = HashMap::new();

    for (raw_name, pair) in raw_pairs.iter() {
        let Some(spec) = resolve_target(config, task, raw_name, target) else {
            out.warnings.push(MappingWarning::UnmatchedLab {
                name: raw_name.to_string(),
            });
            continue;
        };

        // Explicit null means the extractor saw the lab but produced no
        // value; the feature stays missing and the pair is accounted for.
        if pair.value.is_null() {
            out.warnings.push(MappingWarning::EmptyValue {
                name: raw_name.to_string(),
            });
            continue;
        }

        let value = match spec.kind {
            FieldKind::Numeric => match coerce_numeric(&spec.name, &pair.value) {
                Ok(v) => {
                    let (converted, warning) = apply_unit(config, spec, &pair.unit, v);
                    if let Some(w) = warning {
                        out.warnings.push(w);
                    }
                    match json_number(converted) {
                        Some(value) => value,
                        None => {
                            out.warnings.push(MappingWarning::UnparsableValue {
                                feature: spec.name.clone(),
                                raw: pair.value.to_string(),
                            });
                            continue;
                        }
                    }
                }
                Err(warning) => {
                    out.warnings.push(warning);
                    continue;
                }
            },
            FieldKind::Text => match &pair.value {
                Value::String(_) | Value::Number(_) => pair.value.clone(),
                other => {
                    out.warnings.push(MappingWarning::UnparsableValue {
                        feature: spec.name.clone(),
                        raw: other.to_string(),
                    });
                    continue;
                }
            },
        };

        if let Some(previous) = backing.get(&spec.name) {
            out.warnings.push(MappingWarning::AmbiguousDuplicate {
                feature: spec.name.clone(),
                kept: raw_name.to_string(),
                discarded: previous.clone(),
            });
        }
        backing.insert(spec.name.clone(), raw_name.to_string());
        out.features.insert(spec.name.clone(), value);
    }

    out.missing = target
        .iter()
        .filter(|f| !out.features.contains_key(&f.name))
        .map(|f| f.name.clone())
        .collect();

    out
}

/// Exact lowercase match against the target list, then the alias table.
/// An alias that resolves outside the target list counts as unmatched.
fn resolve_target<'a>(
    config: &EngineConfig,
    task: Task,
    raw_name: &str,
    target: &'a [FieldSpec],
) -> Option<&'a FieldSpec> {
    if let Some(spec) = target.iter().find(|f| f.name == raw_name) {
        return Some(spec);
    }
    let canonical = config.resolve_alias(task, raw_name)?;
    target.iter().find(|f| f.name == canonical)
}

/// Coerce a raw value into f64 for a numeric field.
fn coerce_numeric(feature: &str, value: &Value) -> Result<f64, MappingWarning> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| MappingWarning::UnparsableValue {
            feature: feature.to_string(),
            raw: value.to_string(),
        }),
        Value::String(s) => numeric_token(s).ok_or_else(|| MappingWarning::UnparsableValue {
            feature: feature.to_string(),
            raw: s.clone(),
        }),
        other => Err(MappingWarning::UnparsableValue {
            feature: feature.to_string(),
            raw: other.to_string(),
        }),
    }
}

/// Convert into the canonical unit when the raw unit differs and a
/// fixed factor is known; otherwise keep the raw value and warn.
fn apply_unit(
    config: &EngineConfig,
    spec: &FieldSpec,
    raw_unit: &str,
    value: f64,
) -> (f64, Option<MappingWarning>) {
    let Some(canonical) = &spec.unit else {
        return (value, None);
    };
    let unit = normalize_unit(raw_unit);
    if unit.is_empty() || unit == *canonical {
        return (value, None);
    }

    let factor = config
        .unit_rule(&spec.name)
        .and_then(|rule| rule.conversions.iter().find(|c| c.unit == unit))
        .map(|c| c.factor);

    match factor {
        Some(factor) => (
            value * factor,
            Some(MappingWarning::UnitConverted {
                feature: spec.name.clone(),
                from_unit: unit,
                to_unit: canonical.clone(),
                factor,
            }),
        ),
        None => (
            value,
            Some(MappingWarning::UnknownUnit {
                feature: spec.name.clone(),
                unit,
            }),
        ),
    }
}

/// Lowercase and strip spaces so "mmHg", "mm Hg" and "mmhg" compare equal.
pub(crate) fn normalize_unit(unit: &str) -> String {
    unit.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Pull a leading numeric token out of a noisy extracted string:
/// "130", "~130 mmHg", "<7,2 %" all yield a number.
pub(crate) fn numeric_token(s: &str) -> Option<f64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^\s*[<>~\u{2264}\u{2265}]?\s*(-?\d+(?:[.,]\d+)?)").expect("valid regex")
    });
    let captures = re.captures(s)?;
    captures
        .get(1)?
        .as_str()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
}

/// Finite f64 -> JSON number.
pub(crate) fn json_number(v: f64) -> Option<Value> {
    serde_json::Number::from_f64(v).map(Value::Number)
}

/// Best-effort coercion for schema-free pass-through: numeric where
/// possible, otherwise the raw value unchanged.
pub fn coerce_freeform(pair: &RawPair) -> Value {
    match &pair.value {
        Value::String(s) => numeric_token(s)
            .and_then(json_number)
            .unwrap_or_else(|| pair.value.clone()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> EngineConfig {
        EngineConfig::bundled()
    }

    fn heart_target(config: &EngineConfig) -> &[FieldSpec] {
        config.registry.schema_for(Task::Heart)
    }

    #[test]
    fn exact_match_resolves_without_warning() {
        let config = config();
        let pairs = RawPairs::from([("trestbps", RawPair::new(130, "mmhg"))]);
        let target = vec![
            FieldSpec::numeric("trestbps").with_unit("mmhg"),
            FieldSpec::numeric("chol").with_unit("mg/dl"),
        ];

        let mapped = map_features(&config, Task::Heart, &pairs, &target);
        assert_eq!(mapped.features.get("trestbps"), Some(&json!(130.0)));
        assert_eq!(mapped.missing, vec!["chol"]);
        assert!(
            !mapped.warnings.iter().any(|w| w.subject() == "trestbps"),
            "unexpected warnings: {:?}",
            mapped.warnings
        );
    }

    #[test]
    fn alias_resolution_is_table_driven() {
        let mut config = config();
        let pairs = RawPairs::from([("ldl-c", RawPair::new(140, "mg/dl"))]);

        let mapped = map_features(&config, Task::Heart, &pairs, heart_target(&config));
        assert!(mapped.features.get("chol").is_none());
        assert!(mapped
            .warnings
            .iter()
            .any(|w| matches!(w, MappingWarning::UnmatchedLab { name } if name == "ldl-c")));

        // Extending the table changes matching without touching the mapper.
        config.aliases.entries.push(crate::config::AliasEntry {
            alias: "ldl-c".into(),
            canonical: "chol".into(),
            task: None,
        });
        let mapped = map_features(&config, Task::Heart, &pairs, config.registry.schema_for(Task::Heart));
        assert_eq!(mapped.features.get("chol"), Some(&json!(140.0)));
    }

    #[test]
    fn task_scoped_alias_wins() {
        let config = config();
        let pairs = RawPairs::from([("bp", RawPair::new(135, "mmhg"))]);

        let heart = map_features(&config, Task::Heart, &pairs, heart_target(&config));
        assert!(heart.features.contains_key("trestbps"));

        let diabetes = map_features(
            &config,
            Task::Diabetes,
            &pairs,
            config.registry.schema_for(Task::Diabetes),
        );
        assert!(diabetes.features.contains_key("blood_pressure"));
    }

    #[test]
    fn unit_conversion_applies_known_factor() {
        let config = config();
        let pairs = RawPairs::from([("cholesterol", RawPair::new(6.2, "mmol/L"))]);

        let mapped = map_features(&config, Task::Heart, &pairs, heart_target(&config));
        let chol = mapped.features.get("chol").and_then(Value::as_f64).unwrap();
        assert!((chol - 239.754).abs() < 0.01, "got {chol}");
        assert!(mapped
            .warnings
            .iter()
            .any(|w| matches!(w, MappingWarning::UnitConverted { feature, .. } if feature == "chol")));
    }

    #[test]
    fn unknown_unit_keeps_raw_value_and_warns() {
        let config = config();
        let pairs = RawPairs::from([("chol", RawPair::new(200, "g/l"))]);

        let mapped = map_features(&config, Task::Heart, &pairs, heart_target(&config));
        assert_eq!(mapped.features.get("chol"), Some(&json!(200.0)));
        assert!(mapped
            .warnings
            .iter()
            .any(|w| matches!(w, MappingWarning::UnknownUnit { unit, .. } if unit == "g/l")));
    }

    #[test]
    fn unit_comparison_ignores_case_and_spaces() {
        let config = config();
        let pairs = RawPairs::from([("trestbps", RawPair::new(130, "mm Hg"))]);
        let mapped = map_features(&config, Task::Heart, &pairs, heart_target(&config));
        assert!(mapped.warnings.is_empty(), "warnings: {:?}", mapped.warnings);
    }

    #[test]
    fn numeric_string_values_are_coerced() {
        let config = config();
        let pairs = RawPairs::from([
            ("trestbps", RawPair::new("~130 mmHg", "")),
            ("chol", RawPair::new("7,2", "mmol/l")),
        ]);

        let mapped = map_features(&config, Task::Heart, &pairs, heart_target(&config));
        assert_eq!(mapped.features.get("trestbps"), Some(&json!(130.0)));
        let chol = mapped.features.get("chol").and_then(Value::as_f64).unwrap();
        assert!((chol - 7.2 * 38.67).abs() < 0.01);
    }

    #[test]
    fn unparsable_value_maps_to_missing_with_warning() {
        let config = config();
        let pairs = RawPairs::from([("chol", RawPair::new("pending", "mg/dl"))]);

        let mapped = map_features(&config, Task::Heart, &pairs, heart_target(&config));
        assert!(!mapped.features.contains_key("chol"));
        assert!(mapped.missing.contains(&"chol".to_string()));
        assert!(mapped
            .warnings
            .iter()
            .any(|w| matches!(w, MappingWarning::UnparsableValue { raw, .. } if raw == "pending")));
    }

    #[test]
    fn null_value_stays_missing_but_is_accounted_for() {
        let config = config();
        let pairs = RawPairs::from([("chol", RawPair::new(Value::Null, "mg/dl"))]);

        let mapped = map_features(&config, Task::Heart, &pairs, heart_target(&config));
        assert!(!mapped.features.contains_key("chol"));
        assert!(mapped
            .warnings
            .iter()
            .any(|w| matches!(w, MappingWarning::EmptyValue { name } if name == "chol")));
    }

    #[test]
    fn duplicate_canonical_last_wins_with_warning() {
        let config = config();
        let pairs = RawPairs::from([
            ("blood pressure", RawPair::new(140, "mmhg")),
            ("bp", RawPair::new(120, "mmhg")),
        ]);

        let mapped = map_features(&config, Task::Heart, &pairs, heart_target(&config));
        assert_eq!(mapped.features.get("trestbps"), Some(&json!(120.0)));
        assert!(mapped.warnings.iter().any(|w| matches!(
            w,
            MappingWarning::AmbiguousDuplicate { kept, discarded, .. }
                if kept == "bp" && discarded == "blood pressure"
        )));
    }

    #[test]
    fn text_field_passes_strings_through() {
        let config = config();
        let pairs = RawPairs::from([("thal", RawPair::new("reversible", ""))]);

        let mapped = map_features(&config, Task::Heart, &pairs, heart_target(&config));
        assert_eq!(mapped.features.get("thal"), Some(&json!("reversible")));
    }

    #[test]
    fn missing_preserves_target_order() {
        let config = config();
        let pairs = RawPairs::from([("chol", RawPair::new(245, "mg/dl"))]);
        let target = vec![
            FieldSpec::numeric("trestbps"),
            FieldSpec::numeric("chol"),
            FieldSpec::numeric("thalach"),
        ];

        let mapped = map_features(&config, Task::Heart, &pairs, &target);
        assert_eq!(mapped.missing, vec!["trestbps", "thalach"]);
    }

    #[test]
    fn numeric_token_variants() {
        assert_eq!(numeric_token("130"), Some(130.0));
        assert_eq!(numeric_token("  7,2 %"), Some(7.2));
        assert_eq!(numeric_token("<5.4 mmol/l"), Some(5.4));
        assert_eq!(numeric_token("-0.5"), Some(-0.5));
        assert_eq!(numeric_token("pending"), None);
        assert_eq!(numeric_token(""), None);
    }

    #[test]
    fn freeform_coercion_prefers_numbers() {
        assert_eq!(coerce_freeform(&RawPair::new("12.5", "")), json!(12.5));
        assert_eq!(
            coerce_freeform(&RawPair::new("positive", "")),
            json!("positive")
        );
        assert_eq!(coerce_freeform(&RawPair::new(88, "bpm")), json!(88));
    }
}

//! Precedence merge of extracted features with user overrides.
//!
//! Pure and idempotent: re-merging a merged set with empty overrides
//! returns the same set and the same missing list.

use serde_json::Value;

use crate::schema::FieldSpec;

use super::types::{FeatureMap, MergeOutcome};

/// Schema-bound merge. Resolves each target key under the precedence
/// policy; `merged` holds only keys that resolved to a usable value and
/// `still_missing` is the rest, in target order. Keys outside the
/// target are ignored.
pub fn merge_features(
    target: &[FieldSpec],
    extracted: &FeatureMap,
    user_inputs: &FeatureMap,
    prefer_user: bool,
) -> MergeOutcome {
    let mut merged = FeatureMap::new();
    let mut still_missing = Vec::new();

    for spec in target {
        match resolve(
            prefer_user,
            extracted.get(&spec.name),
            user_inputs.get(&spec.name),
        ) {
            Some(value) => {
                merged.insert(spec.name.clone(), value.clone());
            }
            None => still_missing.push(spec.name.clone()),
        }
    }

    MergeOutcome {
        merged,
        still_missing,
    }
}

/// Schema-free merge for the pass-through task: the precedence union of
/// both inputs, extracted keys first then novel user keys, values (nulls
/// included) preserved. `still_missing` is always empty.
pub fn merge_freeform(
    extracted: &FeatureMap,
    user_inputs: &FeatureMap,
    prefer_user: bool,
) -> MergeOutcome {
    let mut merged = FeatureMap::new();

    for (key, value) in extracted {
        let resolved = resolve(prefer_user, Some(value), user_inputs.get(key));
        merged.insert(key.clone(), resolved.cloned().unwrap_or(Value::Null));
    }
    for (key, value) in user_inputs {
        if !merged.contains_key(key) {
            merged.insert(key.clone(), value.clone());
        }
    }

    MergeOutcome {
        merged,
        still_missing: Vec::new(),
    }
}

/// Precedence rule for one key: the preferred source wins unless its
/// value is null or empty, in which case fall back to the other.
fn resolve<'a>(
    prefer_user: bool,
    extracted: Option<&'a Value>,
    user: Option<&'a Value>,
) -> Option<&'a Value> {
    let (first, second) = if prefer_user {
        (user, extracted)
    } else {
        (extracted, user)
    };
    pick(first).or_else(|| pick(second))
}

fn pick(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| usable(v))
}

/// Null means "known absent"; an empty string is treated the same way.
fn usable(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Feature dictionary: canonical name -> JSON value. Insertion order is
/// preserved (serde_json `preserve_order`), which is what keeps
/// schema-ordered outputs schema-ordered.
pub type FeatureMap = serde_json::Map<String, Value>;

/// Which pass of the external extractor produced a raw pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawOrigin {
    #[default]
    Text,
    Llm,
}

/// One extracted `(value, unit)` pair tied to a free-text lab name.
/// The value may be numeric or string; the unit may be empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPair {
    pub value: Value,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub origin: RawOrigin,
}

impl RawPair {
    pub fn new(value: impl Into<Value>, unit: &str) -> Self {
        Self {
            value: value.into(),
            unit: unit.to_string(),
            origin: RawOrigin::Text,
        }
    }

    pub fn llm(value: impl Into<Value>, unit: &str) -> Self {
        Self {
            value: value.into(),
            unit: unit.to_string(),
            origin: RawOrigin::Llm,
        }
    }
}

/// Insertion-ordered raw pairs keyed by lowercase free-text lab name.
/// Re-inserting a name replaces its pair in place; order is what makes
/// the mapper's duplicate policy deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPairs(Vec<(String, RawPair)>);

impl RawPairs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, pair: RawPair) {
        let key = name.trim().to_lowercase();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = pair;
        } else {
            self.0.push((key, pair));
        }
    }

    pub fn get(&self, name: &str) -> Option<&RawPair> {
        let key = name.trim().to_lowercase();
        self.0.iter().find(|(k, _)| *k == key).map(|(_, p)| p)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawPair)> {
        self.0.iter().map(|(k, p)| (k.as_str(), p))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[(&str, RawPair); N]> for RawPairs {
    fn from(pairs: [(&str, RawPair); N]) -> Self {
        let mut out = Self::new();
        for (name, pair) in pairs {
            out.insert(name, pair);
        }
        out
    }
}

/// Origin of a resolved feature value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Parsed,
    Llm,
    Imputed,
    Unknown,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Llm => "llm",
            Self::Imputed => "imputed",
            Self::Unknown => "unknown",
        }
    }
}

/// Normal range carried on an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalRange {
    pub min: f64,
    pub max: f64,
}

/// Per-feature extraction provenance record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMeta {
    pub value: Value,
    pub unit: Option<String>,
    pub confidence: f64,
    pub source: Provenance,
    pub normal_range: Option<NormalRange>,
    pub out_of_range: bool,
}

/// Non-fatal per-pair mapping issue. Collected, never raised; rendered
/// to a human-readable string at the engine boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingWarning {
    #[error("Unrecognized lab '{name}' did not match any model feature")]
    UnmatchedLab { name: String },

    #[error("Multiple labs mapped to '{feature}'; kept '{kept}' over '{discarded}'")]
    AmbiguousDuplicate {
        feature: String,
        kept: String,
        discarded: String,
    },

    #[error("Converted {feature} from {from_unit} to {to_unit} (factor {factor})")]
    UnitConverted {
        feature: String,
        from_unit: String,
        to_unit: String,
        factor: f64,
    },

    #[error("No conversion from '{unit}' for {feature}; kept raw value")]
    UnknownUnit { feature: String, unit: String },

    #[error("Lab '{name}' was extracted without a value")]
    EmptyValue { name: String },

    #[error("Could not parse value '{raw}' for {feature}")]
    UnparsableValue { feature: String, raw: String },
}

impl MappingWarning {
    /// The canonical feature or raw lab name the warning is about.
    pub fn subject(&self) -> &str {
        match self {
            Self::UnmatchedLab { name } | Self::EmptyValue { name } => name,
            Self::AmbiguousDuplicate { feature, .. }
            | Self::UnitConverted { feature, .. }
            | Self::UnknownUnit { feature, .. }
            | Self::UnparsableValue { feature, .. } => feature,
        }
    }
}

/// Result of mapping raw pairs against a target feature list.
#[derive(Debug, Clone, Default)]
pub struct MappedFeatures {
    pub features: FeatureMap,
    pub missing: Vec<String>,
    pub warnings: Vec<MappingWarning>,
}

/// Result of the precedence merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub merged: FeatureMap,
    pub still_missing: Vec<String>,
}

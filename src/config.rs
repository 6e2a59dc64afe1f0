//! Immutable engine configuration: feature schemas, the versioned lab
//! alias table, normal-range tables, unit conversion rules, and score
//! weights.
//!
//! Loaded once at process start and shared read-only across requests.
//! `bundled()` returns the compiled-in defaults; `load()` overlays the
//! alias and range tables from JSON files so deployments can extend
//! coverage without a rebuild.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::schema::{SchemaRegistry, Task};
use crate::scoring::weights::ScoreWeights;

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    "info".into()
}

/// Normal range for one feature under one task. `task: general`
/// entries act as a shared fallback for every task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceRange {
    pub task: Task,
    pub feature: String,
    pub min: f64,
    pub max: f64,
}

/// One normalized synonym -> canonical feature mapping. Task-scoped
/// entries win over global ones, so the same shorthand can resolve
/// differently per task ("bp" is systolic for heart, diastolic for
/// diabetes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasEntry {
    pub alias: String,
    pub canonical: String,
    #[serde(default)]
    pub task: Option<Task>,
}

/// Versioned alias table. The version bumps whenever coverage changes
/// so downstream audit logs can record which table reconciled a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasTable {
    pub version: u32,
    pub entries: Vec<AliasEntry>,
}

/// Fixed conversion factor into a feature's canonical unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitConversion {
    /// Source unit, normalized (lowercase, no spaces).
    pub unit: String,
    pub factor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitRule {
    pub feature: String,
    pub conversions: Vec<UnitConversion>,
}

/// All read-only reference data the engine needs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub registry: SchemaRegistry,
    pub aliases: AliasTable,
    pub ranges: Vec<ReferenceRange>,
    pub units: Vec<UnitRule>,
    pub weights: ScoreWeights,
}

impl EngineConfig {
    /// Compiled-in defaults.
    pub fn bundled() -> Self {
        Self {
            registry: SchemaRegistry::bundled(),
            aliases: bundled_aliases(),
            ranges: bundled_ranges(),
            units: bundled_units(),
            weights: ScoreWeights::bundled(),
        }
    }

    /// Bundled config with alias and range tables overlaid from
    /// `lab_aliases.json` / `reference_ranges.json` in `resources_dir`,
    /// when present.
    pub fn load(resources_dir: &Path) -> Result<Self, EngineError> {
        let mut config = Self::bundled();

        let aliases_path = resources_dir.join("lab_aliases.json");
        if aliases_path.exists() {
            let json = std::fs::read_to_string(&aliases_path).map_err(|e| {
                EngineError::ReferenceData {
                    file: aliases_path.display().to_string(),
                    detail: e.to_string(),
                }
            })?;
            config.aliases =
                serde_json::from_str(&json).map_err(|e| EngineError::ReferenceData {
                    file: "lab_aliases.json".into(),
                    detail: e.to_string(),
                })?;
        }

        let ranges_path = resources_dir.join("reference_ranges.json");
        if ranges_path.exists() {
            let json = std::fs::read_to_string(&ranges_path).map_err(|e| {
                EngineError::ReferenceData {
                    file: ranges_path.display().to_string(),
                    detail: e.to_string(),
                }
            })?;
            config.ranges =
                serde_json::from_str(&json).map_err(|e| EngineError::ReferenceData {
                    file: "reference_ranges.json".into(),
                    detail: e.to_string(),
                })?;
        }

        Ok(config)
    }

    /// Normal range for a feature: exact task match first, then the
    /// shared `general` entries.
    pub fn range_for(&self, task: Task, feature: &str) -> Option<&ReferenceRange> {
        self.ranges
            .iter()
            .find(|r| r.task == task && r.feature == feature)
            .or_else(|| {
                self.ranges
                    .iter()
                    .find(|r| r.task == Task::General && r.feature == feature)
            })
    }

    /// Resolve a free-text lab name through the alias table.
    pub fn resolve_alias(&self, task: Task, name: &str) -> Option<&str> {
        let normalized = name.trim().to_lowercase();
        self.aliases
            .entries
            .iter()
            .find(|e| e.alias == normalized && e.task == Some(task))
            .or_else(|| {
                self.aliases
                    .entries
                    .iter()
                    .find(|e| e.alias == normalized && e.task.is_none())
            })
            .map(|e| e.canonical.as_str())
    }

    pub fn unit_rule(&self, feature: &str) -> Option<&UnitRule> {
        self.units.iter().find(|u| u.feature == feature)
    }
}

fn alias(alias: &str, canonical: &str) -> AliasEntry {
    AliasEntry {
        alias: alias.into(),
        canonical: canonical.into(),
        task: None,
    }
}

fn task_alias(task: Task, alias: &str, canonical: &str) -> AliasEntry {
    AliasEntry {
        alias: alias.into(),
        canonical: canonical.into(),
        task: Some(task),
    }
}

fn bundled_aliases() -> AliasTable {
    AliasTable {
        version: 3,
        entries: vec![
            // Heart
            task_alias(Task::Heart, "bp", "trestbps"),
            task_alias(Task::Heart, "blood pressure", "trestbps"),
            alias("resting blood pressure", "trestbps"),
            alias("systolic blood pressure", "trestbps"),
            alias("cholesterol", "chol"),
            alias("total cholesterol", "chol"),
            alias("serum cholesterol", "chol"),
            alias("max heart rate", "thalach"),
            alias("maximum heart rate", "thalach"),
            alias("max hr", "thalach"),
            alias("st depression", "oldpeak"),
            task_alias(Task::Heart, "fasting blood sugar", "fbs"),
            alias("gender", "sex"),
            alias("chest pain type", "cp"),
            // Diabetes
            task_alias(Task::Diabetes, "bp", "blood_pressure"),
            task_alias(Task::Diabetes, "blood pressure", "blood_pressure"),
            alias("diastolic blood pressure", "blood_pressure"),
            alias("blood sugar", "glucose"),
            alias("fasting glucose", "glucose"),
            alias("plasma glucose", "glucose"),
            alias("serum insulin", "insulin"),
            alias("body mass index", "bmi"),
            alias("triceps skin fold", "skin_thickness"),
            alias("skin fold thickness", "skin_thickness"),
            alias("pedigree", "diabetes_pedigree"),
            alias("diabetes pedigree function", "diabetes_pedigree"),
        ],
    }
}

fn range(task: Task, feature: &str, min: f64, max: f64) -> ReferenceRange {
    ReferenceRange {
        task,
        feature: feature.into(),
        min,
        max,
    }
}

fn bundled_ranges() -> Vec<ReferenceRange> {
    vec![
        range(Task::Heart, "trestbps", 90.0, 120.0),
        range(Task::Heart, "chol", 125.0, 200.0),
        range(Task::Heart, "thalach", 100.0, 170.0),
        range(Task::Heart, "oldpeak", 0.0, 1.0),
        range(Task::Diabetes, "glucose", 70.0, 110.0),
        range(Task::Diabetes, "blood_pressure", 60.0, 80.0),
        range(Task::Diabetes, "skin_thickness", 10.0, 50.0),
        range(Task::Diabetes, "insulin", 16.0, 166.0),
        range(Task::Diabetes, "bmi", 18.5, 24.9),
        // Shared fallbacks for pass-through reports
        range(Task::General, "glucose", 70.0, 110.0),
        range(Task::General, "chol", 125.0, 200.0),
        range(Task::General, "hemoglobin", 12.0, 17.5),
        range(Task::General, "creatinine", 0.6, 1.3),
    ]
}

fn unit_rule(feature: &str, conversions: &[(&str, f64)]) -> UnitRule {
    UnitRule {
        feature: feature.into(),
        conversions: conversions
            .iter()
            .map(|(unit, factor)| UnitConversion {
                unit: (*unit).into(),
                factor: *factor,
            })
            .collect(),
    }
}

fn bundled_units() -> Vec<UnitRule> {
    vec![
        // mmol/l to mg/dl
        unit_rule("chol", &[("mmol/l", 38.67)]),
        unit_rule("glucose", &[("mmol/l", 18.0)]),
        // kPa to mmHg
        unit_rule("trestbps", &[("kpa", 7.50062)]),
        unit_rule("blood_pressure", &[("kpa", 7.50062)]),
        // pmol/l to uU/ml
        unit_rule("insulin", &[("pmol/l", 0.144)]),
    ]
}

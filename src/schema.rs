//! Task enumeration and per-task canonical feature schemas.
//!
//! Every schema-bound output of the engine draws its keys and key order
//! from here. The registry is pure lookup data, constructed once and
//! never mutated.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// String forms of every task, in declaration order. Used in the
/// unknown-task error so callers see the allowed set.
pub const ALLOWED_TASKS: &[&str] = &["heart", "diabetes", "general"];

/// Domain context for one request. Selects the feature schema, alias
/// rules, normal-range table, and score weights that apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Heart,
    Diabetes,
    General,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heart => "heart",
            Self::Diabetes => "diabetes",
            Self::General => "general",
        }
    }

    /// Parse a task identifier, tolerating surrounding whitespace and
    /// mixed case (query parameters arrive with both).
    pub fn parse(input: &str) -> Result<Self, EngineError> {
        match input.trim().to_lowercase().as_str() {
            "heart" => Ok(Self::Heart),
            "diabetes" => Ok(Self::Diabetes),
            "general" => Ok(Self::General),
            _ => Err(EngineError::UnknownTask {
                value: input.trim().to_string(),
                allowed: ALLOWED_TASKS,
            }),
        }
    }
}

impl std::str::FromStr for Task {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Expected value kind for a canonical feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Numeric,
    Text,
}

/// Metadata for one canonical model feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    /// Canonical unit, normalized (lowercase, no spaces). None for
    /// unitless or categorical fields.
    pub unit: Option<String>,
}

impl FieldSpec {
    pub fn numeric(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Numeric,
            unit: None,
        }
    }

    pub fn text(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Text,
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }
}

/// Ordered canonical feature lists per task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaRegistry {
    pub heart: Vec<FieldSpec>,
    pub diabetes: Vec<FieldSpec>,
}

impl SchemaRegistry {
    /// Compiled-in schemas matching the trained tabular models.
    pub fn bundled() -> Self {
        Self {
            heart: vec![
                FieldSpec::numeric("age"),
                FieldSpec::numeric("sex"),
                FieldSpec::numeric("cp"),
                FieldSpec::numeric("trestbps").with_unit("mmhg"),
                FieldSpec::numeric("chol").with_unit("mg/dl"),
                FieldSpec::numeric("fbs"),
                FieldSpec::numeric("restecg"),
                FieldSpec::numeric("thalach").with_unit("bpm"),
                FieldSpec::numeric("exang"),
                FieldSpec::numeric("oldpeak"),
                FieldSpec::numeric("slope"),
                FieldSpec::numeric("ca"),
                FieldSpec::text("thal"),
            ],
            diabetes: vec![
                FieldSpec::numeric("pregnancies"),
                FieldSpec::numeric("glucose").with_unit("mg/dl"),
                FieldSpec::numeric("blood_pressure").with_unit("mmhg"),
                FieldSpec::numeric("skin_thickness").with_unit("mm"),
                FieldSpec::numeric("insulin").with_unit("uu/ml"),
                FieldSpec::numeric("bmi").with_unit("kg/m2"),
                FieldSpec::numeric("diabetes_pedigree"),
                FieldSpec::numeric("age"),
            ],
        }
    }

    /// Ordered schema for a task. `general` is schema-free and returns
    /// an empty slice; the engine treats it as pass-through.
    pub fn schema_for(&self, task: Task) -> &[FieldSpec] {
        match task {
            Task::Heart => &self.heart,
            Task::Diabetes => &self.diabetes,
            Task::General => &[],
        }
    }

    /// Schema key list for a task, in schema order.
    pub fn keys_for(&self, task: Task) -> Vec<String> {
        self.schema_for(task)
            .iter()
            .map(|f| f.name.clone())
            .collect()
    }
}

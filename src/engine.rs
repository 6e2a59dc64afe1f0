//! The three request paths: ingestion, completion, prediction.
//!
//! Each path is a pure function over the immutable `EngineConfig` plus
//! the request inputs; the surrounding service owns persistence, HTTP,
//! and document extraction. Every outcome struct serializes to JSON
//! primitives only.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::model::TabularModel;
use crate::reconcile::{
    annotate_features, coerce_freeform, map_features, merge_features, merge_freeform,
    overall_confidence, ExtractionMeta, FeatureMap, RawPairs,
};
use crate::schema::Task;
use crate::scoring::compute_score;

/// Ingestion result: what was recognized in a report, what is still
/// missing, and the per-feature provenance the UI renders.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub task: Task,
    pub extracted: FeatureMap,
    pub missing_fields: Vec<String>,
    pub warnings: Vec<String>,
    pub extracted_meta: BTreeMap<String, ExtractionMeta>,
    pub parsed_keys: Vec<String>,
    pub overall_confidence: f64,
}

/// Completion result: the schema-ordered feature vector, value-or-null.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    pub task: Task,
    pub features_ready: FeatureMap,
    pub still_missing: Vec<String>,
    pub notes: Vec<String>,
}

/// Prediction result: model output plus the explainable health score.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionOutcome {
    pub task: Task,
    pub label: u8,
    pub probability: f64,
    pub health_score: f64,
    pub top_contributors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Stateless request processor over shared read-only configuration.
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ingestion path: reconcile raw extracted pairs against the task
    /// schema (pass-through for `general`) and annotate provenance.
    pub fn ingest_pairs(&self, task: Task, raw_pairs: &RawPairs) -> IngestOutcome {
        let parsed_keys: Vec<String> = raw_pairs.keys().map(str::to_string).collect();

        let (extracted, missing_fields, mut warnings) = if task == Task::General {
            let mut features = FeatureMap::new();
            for (name, pair) in raw_pairs.iter() {
                features.insert(name.to_string(), coerce_freeform(pair));
            }
            (features, Vec::new(), Vec::new())
        } else {
            let mapped = map_features(
                &self.config,
                task,
                raw_pairs,
                self.config.registry.schema_for(task),
            );
            let warnings = mapped.warnings.iter().map(|w| w.to_string()).collect();
            (mapped.features, mapped.missing, warnings)
        };

        let target: Vec<String> = if task == Task::General {
            extracted.keys().cloned().collect()
        } else {
            self.config.registry.keys_for(task)
        };

        let (extracted_meta, degraded) =
            annotate_features(&self.config, task, &target, &extracted, raw_pairs);
        warnings.extend(degraded.iter().map(|d| d.to_string()));

        let overall = overall_confidence(&extracted_meta);
        tracing::debug!(
            task = task.as_str(),
            resolved = extracted.len(),
            missing = missing_fields.len(),
            overall_confidence = overall,
            "ingested report pairs"
        );

        IngestOutcome {
            task,
            extracted,
            missing_fields,
            warnings,
            extracted_meta,
            parsed_keys,
            overall_confidence: overall,
        }
    }

    /// Completion path: merge extracted features with user overrides
    /// under the precedence policy and project onto the schema order.
    pub fn complete_features(
        &self,
        task: Task,
        extracted: &FeatureMap,
        user_inputs: &FeatureMap,
        prefer_user: bool,
    ) -> CompletionOutcome {
        let extracted = scalarize(extracted);
        let user_inputs = scalarize(user_inputs);

        let (features_ready, still_missing) = if task == Task::General {
            let outcome = merge_freeform(&extracted, &user_inputs, prefer_user);
            (outcome.merged, outcome.still_missing)
        } else {
            let schema = self.config.registry.schema_for(task);
            let outcome = merge_features(schema, &extracted, &user_inputs, prefer_user);
            // Schema-ordered projection, explicit null for unresolved keys
            let mut ordered = FeatureMap::new();
            for spec in schema {
                let value = outcome.merged.get(&spec.name).cloned().unwrap_or(Value::Null);
                ordered.insert(spec.name.clone(), value);
            }
            (ordered, outcome.still_missing)
        };

        let mut notes = Vec::new();
        if !user_inputs.is_empty() {
            if prefer_user {
                notes.push("User values override extracted values".to_string());
            } else {
                notes.push("Extracted values take precedence over user inputs".to_string());
            }
        }

        CompletionOutcome {
            task,
            features_ready,
            still_missing,
            notes,
        }
    }

    /// Prediction path: run the black-box model over the scalarized
    /// feature vector and synthesize the explainable health score.
    pub fn predict_with_features(
        &self,
        task: Task,
        features: &FeatureMap,
        model: &dyn TabularModel,
    ) -> Result<PredictionOutcome, EngineError> {
        let features = scalarize(features);
        let output = model.predict(task, &features)?;

        let (health_score, breakdown) =
            compute_score(&self.config, task, &features, output.probability);
        let top_contributors = breakdown.into_iter().map(|(name, _)| name).collect();

        Ok(PredictionOutcome {
            task,
            label: output.label,
            probability: output.probability,
            health_score,
            top_contributors,
            warnings: output.warnings,
        })
    }
}

/// Boundary normalization: list-valued entries reduce to their first
/// element (or null when empty) so merge and score only ever see
/// scalar-or-null values.
fn scalarize(features: &FeatureMap) -> FeatureMap {
    let mut out = FeatureMap::new();
    for (key, value) in features {
        let scalar = match value {
            Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
            other => other.clone(),
        };
        out.insert(key.clone(), scalar);
    }
    out
}

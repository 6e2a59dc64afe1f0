//! Crate-level error taxonomy.
//!
//! Only whole-request-invalidating conditions live here. Per-feature
//! issues are collected as `reconcile::MappingWarning` values or
//! localized `reconcile::AnnotationFailure`s and never abort a batch.

use thiserror::Error;

use crate::model::ModelError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown task '{value}'. Expected one of: {allowed:?}")]
    UnknownTask {
        value: String,
        allowed: &'static [&'static str],
    },

    #[error("Reference data error in {file}: {detail}")]
    ReferenceData { file: String, detail: String },

    #[error("Model inference failed: {0}")]
    Model(#[from] ModelError),
}

//! Black-box prediction model boundary.
//!
//! The engine never looks inside the model: a canonical feature
//! mapping goes in, a label and probability come out. The trait keeps
//! inference mockable in tests and swappable in deployments.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reconcile::FeatureMap;
use crate::schema::Task;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("No model available for task '{0}'")]
    Unavailable(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Output of one tabular model invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOutput {
    /// Binary adverse-outcome label.
    pub label: u8,
    /// Probability of the adverse outcome, expected in [0, 1]. The
    /// score synthesizer clamps defensively if a model misbehaves.
    pub probability: f64,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Tabular prediction model abstraction (allows mocking).
pub trait TabularModel {
    fn predict(&self, task: Task, features: &FeatureMap) -> Result<ModelOutput, ModelError>;
}

//! Per-task penalty weights for health-score contributions.
//!
//! Weights are expert-prior points, not learned values: each entry is
//! the maximum number of score points a fully out-of-band value of that
//! feature can subtract. Entries are declared in schema order, which is
//! what gives the contributor ranking its deterministic tie-break.

use serde::{Deserialize, Serialize};

use crate::schema::Task;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureWeight {
    pub feature: String,
    pub points: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub heart: Vec<FeatureWeight>,
    pub diabetes: Vec<FeatureWeight>,
}

fn weight(feature: &str, points: f64) -> FeatureWeight {
    FeatureWeight {
        feature: feature.into(),
        points,
    }
}

impl ScoreWeights {
    pub fn bundled() -> Self {
        Self {
            heart: vec![
                weight("trestbps", 12.0),
                weight("chol", 12.0),
                weight("thalach", 8.0),
                weight("oldpeak", 10.0),
            ],
            diabetes: vec![
                weight("glucose", 14.0),
                weight("blood_pressure", 8.0),
                weight("skin_thickness", 4.0),
                weight("insulin", 6.0),
                weight("bmi", 10.0),
            ],
        }
    }

    /// Weights for a task. `general` carries none: its score is the
    /// probability term alone.
    pub fn for_task(&self, task: Task) -> &[FeatureWeight] {
        match task {
            Task::Heart => &self.heart,
            Task::Diabetes => &self.diabetes,
            Task::General => &[],
        }
    }

    pub fn total_points(&self, task: Task) -> f64 {
        self.for_task(task).iter().map(|w| w.points).sum()
    }

    /// All weights non-negative and the per-task total below the score
    /// range, so penalties alone can never pin the score to zero.
    pub fn validate(&self) -> bool {
        [Task::Heart, Task::Diabetes].iter().all(|&task| {
            self.for_task(task).iter().all(|w| w.points >= 0.0)
                && self.total_points(task) < 100.0
        })
    }
}

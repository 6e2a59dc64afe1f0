//! Feature reconciliation and health-scoring engine for extracted
//! medical lab reports.
//!
//! The surrounding service extracts raw `(value, unit)` pairs from
//! documents and owns HTTP, persistence, and model hosting; this crate
//! turns those pairs plus user overrides into canonical,
//! provenance-annotated feature vectors and an explainable bounded
//! health score. Every path is a pure function over the immutable
//! [`EngineConfig`] loaded at startup.

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod schema;
pub mod scoring;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::EngineError;
pub use schema::Task;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for an embedding binary. Honors RUST_LOG, falls
/// back to the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

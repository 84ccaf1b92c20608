//! Error types.
//!
//! Dependency analysis itself defines no error type: failures raised by the
//! embedder's dependency queries come back as the embedder's own
//! [`AnalysisContext::Error`](crate::graph::AnalysisContext::Error), and
//! consistency violations panic. The types here cover the surfaces around
//! the engine.

use thiserror::Error;

/// Error writing an exported dependency graph.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write dependency graph: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize dependency graph: {0}")]
    Json(#[from] serde_json::Error),
}

/// A tracking level name that is not one of `none`, `first`, `all`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown dependency tracking level `{0}`")]
pub struct ParseTrackingLevelError(pub String);

//! Error taxonomy for the planning pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while building an execution plan.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Selected test categories depend on each other in a loop.
    #[error("dependency cycle detected among test categories: {categories:?}")]
    DependencyCycle { categories: Vec<String> },

    /// A classification glob could not be compiled.
    #[error("invalid classification pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A configuration document could not be read or parsed.
    #[error("config error in {path:?}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias.
pub type PlanResult<T> = std::result::Result<T, PlanError>;

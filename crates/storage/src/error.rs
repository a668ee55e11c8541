// SPDX-License-Identifier: MIT

use pao_core::{DependencyError, FeatureId};

/// Store-level failures: fail fast on I/O errors. Any variant
/// here is fatal to the orchestrator process that observes it — the
/// caller (the Scheduler Loop, via `EngineError::StoreUnavailable`) tears
/// down rather than retrying, except `DependencyError` which the CLI's
/// `add_dependency` entry point surfaces directly to its caller as a
/// rejected edge, not a fatal condition.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid stored data: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Dependency(#[from] DependencyError),

    #[error("insert_bulk called on a non-empty store")]
    NotEmpty,

    #[error("feature {0} not found")]
    NotFound(FeatureId),

    #[error("background task failed: {0}")]
    TaskJoin(String),
}

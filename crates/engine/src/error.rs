// SPDX-License-Identifier: MIT

//! Fatal and transient error kinds surfaced by the engine.

use pao_core::FeatureId;
use pao_storage::StoreError;

/// Fatal conditions tear the orchestrator down; every other error kind
/// (`ClaimMiss`, `WorkerFailed`, quarantine) is handled inline by the
/// scheduler loop and never reaches this type.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("claim service exceeded its attempt budget")]
    HighContention,

    #[error("failed to spawn worker: {0}")]
    SpawnError(String),

    #[error("initializer failed: {0}")]
    InitializerFailed(String),

    #[error("initializer produced an empty store")]
    InitializerProducedNothing,

    #[error("dependency cycle discovered in a committed snapshot: {from} -> {to}")]
    DependencyCycle { from: FeatureId, to: FeatureId },
}

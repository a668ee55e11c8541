// SPDX-License-Identifier: MIT

//! The Store contract.

use crate::StoreError;
use async_trait::async_trait;
use pao_core::{FeatureId, NewFeature, Snapshot};

/// The terminal state a worker's `release` call commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalState {
    /// `running := false, passes := true`.
    Success,
    /// `running := false` only — the feature returns to `pending`.
    Pending,
}

/// Durable, single-writer-safe persistence of features and their
/// dependency edges. Every method may be called concurrently from
/// multiple tasks within one process, and `conditional_claim` /
/// `snapshot` / `refresh` must also be safe across **separate OS
/// processes** sharing the same backing file.
#[async_trait]
pub trait Store: Send + Sync {
    /// The latest committed state of every feature, reflecting all
    /// writes visible as of this call (subject to `refresh` semantics).
    async fn snapshot(&self) -> Result<Snapshot, StoreError>;

    /// Used only by the Initializer. Assigns ids; fails if the
    /// store is non-empty.
    async fn insert_bulk(&self, features: Vec<NewFeature>) -> Result<Vec<FeatureId>, StoreError>;

    /// Fails with `Dependency(Cycle)` if the edge would close a cycle in
    /// the committed graph, `Dependency(NotFound)` if either id is
    /// absent. Otherwise becomes visible to subsequent `snapshot` calls.
    async fn add_dependency(&self, from: FeatureId, to: FeatureId) -> Result<(), StoreError>;

    /// Idempotent.
    async fn remove_dependency(&self, from: FeatureId, to: FeatureId) -> Result<(), StoreError>;

    /// The only primitive that may transition `pending -> running`.
    /// Returns `true` iff this call performed the transition.
    async fn conditional_claim(&self, id: FeatureId) -> Result<bool, StoreError>;

    /// Forces `running := false`, and if `final_state == Success` also
    /// `passes := true`, in one transaction.
    async fn release(&self, id: FeatureId, final_state: FinalState) -> Result<(), StoreError>;

    /// Discards all cached connection/prepared-statement state so the
    /// next `snapshot()` observes every write committed by other
    /// processes since the last call. Must precede every `snapshot()`
    /// taken at the start of a worker-exit callback.
    async fn refresh(&self) -> Result<(), StoreError>;
}

// SPDX-License-Identifier: MIT

//! The in-memory worker record and the supervisor's handle type.

use pao_core::{FeatureId, Role};
use std::time::Instant;

/// Identifies one live worker within this orchestrator process. Never
/// persisted, never compared across processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Per-active-worker bookkeeping the Scheduler Loop keeps alongside the
/// supervisor's own handle map.
#[derive(Debug, Clone)]
pub struct WorkerRecord {
    pub id: WorkerId,
    pub role: Role,
    /// `None` only for the initializer, which is not tied to a feature.
    pub feature_id: Option<FeatureId>,
    pub pid: u32,
    pub spawned_at: Instant,
    pub resumed: bool,
}

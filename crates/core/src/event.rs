// SPDX-License-Identifier: MIT

//! Event types published on the Event Bus.
//!
//! Serializes with `{"type": "worker:spawned", ...fields}`, matching the
//! teacher's event-tagging convention, so non-Rust subscribers (the UI,
//! metrics collectors — both explicitly out of scope — can consume
//! the stream over JSON without bespoke framing.

use crate::{ClampNotice, Config, FeatureId, FeatureState};
use serde::{Deserialize, Serialize};

/// Which pool a worker belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Coding,
    Testing,
    Initializer,
}

crate::simple_display! {
    Role {
        Coding => "coding",
        Testing => "testing",
        Initializer => "initializer",
    }
}

/// The outcome reported alongside `WorkerCompleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail,
    Skip,
}

crate::simple_display! {
    Outcome {
        Pass => "pass",
        Fail => "fail",
        Skip => "skip",
    }
}

/// Why the orchestrator stopped; the sole cause of a non-zero orchestrator exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// True once every feature passes, or every remainder is quarantined/unreachable.
    AllFeaturesSettled,
    /// An external shutdown signal was received.
    Shutdown,
    /// A fatal error tore the orchestrator down.
    Fatal { message: String },
}

/// Events published by the Scheduler Loop, the Process Supervisor's line
/// reader, and the Initializer Coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "orchestrator:started")]
    OrchestratorStarted { config: Config, clamps: Vec<ClampNotice> },

    #[serde(rename = "orchestrator:stopped")]
    OrchestratorStopped { reason: StopReason },

    #[serde(rename = "worker:spawned")]
    WorkerSpawned { role: Role, feature_id: FeatureId, pid: u32 },

    #[serde(rename = "worker:completed")]
    WorkerCompleted {
        role: Role,
        feature_id: FeatureId,
        exit_code: Option<i32>,
        outcome: Outcome,
    },

    #[serde(rename = "worker:output_line")]
    WorkerOutputLine { role: Role, feature_id: FeatureId, line: String },

    #[serde(rename = "feature:state_changed")]
    FeatureStateChanged {
        feature_id: FeatureId,
        old_state: FeatureState,
        new_state: FeatureState,
    },

    #[serde(rename = "progress:summary")]
    ProgressSummary { total: usize, passing: usize, running: usize, quarantined: usize },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::OrchestratorStarted { .. } => "orchestrator:started",
            Event::OrchestratorStopped { .. } => "orchestrator:stopped",
            Event::WorkerSpawned { .. } => "worker:spawned",
            Event::WorkerCompleted { .. } => "worker:completed",
            Event::WorkerOutputLine { .. } => "worker:output_line",
            Event::FeatureStateChanged { .. } => "feature:state_changed",
            Event::ProgressSummary { .. } => "progress:summary",
        }
    }

    /// The feature this event concerns, if any — used by subscribers that
    /// filter the stream down to one feature's history.
    pub fn feature_id(&self) -> Option<FeatureId> {
        match self {
            Event::WorkerSpawned { feature_id, .. }
            | Event::WorkerCompleted { feature_id, .. }
            | Event::WorkerOutputLine { feature_id, .. }
            | Event::FeatureStateChanged { feature_id, .. } => Some(*feature_id),
            Event::OrchestratorStarted { .. }
            | Event::OrchestratorStopped { .. }
            | Event::ProgressSummary { .. } => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;

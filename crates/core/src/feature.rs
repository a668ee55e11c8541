// SPDX-License-Identifier: MIT

//! The Feature entity and its state machine.

use crate::FeatureId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single unit of work: an id, dependencies, and a pass/fail bit.
///
/// Field semantics are defined elsewhere; this type
/// preserves them verbatim and adds no derived state of its own — ready,
/// quarantined, and resumable are all computed by [`crate::resolver`] or
/// tracked in the Scheduler Loop's in-memory retry table, never stored
/// here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub priority: i64,
    pub name: String,
    pub category: String,
    pub description: String,
    pub steps: Vec<String>,
    pub passes: bool,
    pub running: bool,
    pub skip_count: u32,
    pub dependencies: BTreeSet<FeatureId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Feature {
    /// `pending` in the state machine: not passing and not claimed.
    pub fn is_pending(&self) -> bool {
        !self.passes && !self.running
    }

    /// `running` in the state machine, with `passes` not yet set —
    /// the artefact of a crashed prior orchestrator run.
    pub fn is_resumable(&self) -> bool {
        self.running && !self.passes
    }
}

/// Tag-only view of a feature's position in the state machine, used
/// by [`crate::Event::FeatureStateChanged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureState {
    Pending,
    Running,
    Passing,
}

impl FeatureState {
    pub fn of(feature: &Feature) -> Self {
        if feature.passes {
            FeatureState::Passing
        } else if feature.running {
            FeatureState::Running
        } else {
            FeatureState::Pending
        }
    }
}

crate::simple_display! {
    FeatureState {
        Pending => "pending",
        Running => "running",
        Passing => "passing",
    }
}

/// Payload accepted by `Store::insert_bulk`, before an id is
/// assigned. Dependency edges are added afterward with `add_dependency`
/// so that forward references within one bulk batch don't require
/// pre-resolving ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFeature {
    pub priority: i64,
    pub name: String,
    pub category: String,
    pub description: String,
    pub steps: Vec<String>,
}

#[cfg(any(test, feature = "test-support"))]
impl Feature {
    /// Test/fixture constructor. Production code never builds a `Feature`
    /// directly — it always comes back from a `Store` read.
    pub fn fixture(id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: FeatureId::new(id),
            priority: 0,
            name: format!("feature-{id}"),
            category: String::new(),
            description: String::new(),
            steps: Vec::new(),
            passes: false,
            running: false,
            skip_count: 0,
            dependencies: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = i64>) -> Self {
        self.dependencies = deps.into_iter().map(FeatureId::new).collect();
        self
    }

    pub fn with_passes(mut self, passes: bool) -> Self {
        self.passes = passes;
        self
    }

    pub fn with_running(mut self, running: bool) -> Self {
        self.running = running;
        self
    }

    pub fn with_skip_count(mut self, skip_count: u32) -> Self {
        self.skip_count = skip_count;
        self
    }
}

#[cfg(test)]
#[path = "feature_tests.rs"]
mod tests;

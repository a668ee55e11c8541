// SPDX-License-Identifier: MIT

//! Feature identity.

use serde::{Deserialize, Serialize};

/// Opaque positive integer identity for a [`crate::Feature`], assigned at
/// insertion and stable for the lifetime of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(pub i64);

impl FeatureId {
    /// Sentinel used by events concerning a worker with no associated
    /// feature (the initializer) — never assigned by `insert_bulk`, whose
    /// ids start at 1.
    pub const NONE: FeatureId = FeatureId(0);

    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for FeatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for FeatureId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

impl From<FeatureId> for i64 {
    fn from(v: FeatureId) -> Self {
        v.0
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;

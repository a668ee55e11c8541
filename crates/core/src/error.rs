// SPDX-License-Identifier: MIT

//! Errors shared between the Resolver's pure pre-flight checks and the
//! Store's committed-graph enforcement.

use crate::FeatureId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DependencyError {
    #[error("feature {0} not found")]
    NotFound(FeatureId),

    #[error("adding dependency {from} -> {to} would create a cycle")]
    Cycle { from: FeatureId, to: FeatureId },
}

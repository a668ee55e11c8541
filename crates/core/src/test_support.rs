// SPDX-License-Identifier: MIT

//! Test-only helpers shared across crates (gated behind `test-support`).

use crate::{Feature, Snapshot};

/// Build a [`Snapshot`] directly from a list of fixture features, for
/// crates that only need the resolver's view without a real store.
pub fn snapshot_of(features: Vec<Feature>) -> Snapshot {
    Snapshot::new(features)
}

/// A three-node linear chain `1 <- 2 <- 3` (2 depends on 1, 3 depends on 2).
pub fn linear_chain() -> Vec<Feature> {
    vec![
        Feature::fixture(1),
        Feature::fixture(2).with_dependencies([1]),
        Feature::fixture(3).with_dependencies([2]),
    ]
}

/// A diamond graph `1 <- {2, 3} <- 4`.
pub fn diamond() -> Vec<Feature> {
    vec![
        Feature::fixture(1),
        Feature::fixture(2).with_dependencies([1]),
        Feature::fixture(3).with_dependencies([1]),
        Feature::fixture(4).with_dependencies([2, 3]),
    ]
}

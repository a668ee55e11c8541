// SPDX-License-Identifier: MIT

//! Pure functions over an in-memory snapshot of features. No I/O.
//!
//! A [`Snapshot`] is a value type: once built, nothing here holds a
//! long-lived reference back to a store or a mutable graph. Every
//! function takes `&Snapshot` and returns a fresh value, so a single
//! scheduling decision always observes one frozen view of the world
//! a deliberate choice over a deep mutable dependency graph.

use crate::{Feature, FeatureId};
use std::collections::{HashMap, HashSet};

/// A frozen, owned view of every feature the Store knew about at the
/// moment `Store::snapshot()` was called.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    by_id: HashMap<FeatureId, Feature>,
}

impl Snapshot {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { by_id: features.into_iter().map(|f| (f.id, f)).collect() }
    }

    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        self.by_id.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// A dependency edge `id` satisfies iff it either doesn't resolve to an
/// existing feature (an orphan edge, ignored) or resolves to a
/// feature with `passes = true`.
fn dependency_satisfied(snapshot: &Snapshot, dep: FeatureId) -> bool {
    match snapshot.get(dep) {
        Some(f) => f.passes,
        None => true,
    }
}

/// Ready: not passing, not running, and every dependency that
/// resolves to an existing feature has `passes = true`.
pub fn is_ready(snapshot: &Snapshot, feature: &Feature) -> bool {
    !feature.passes
        && !feature.running
        && feature.dependencies.iter().all(|&dep| dependency_satisfied(snapshot, dep))
}

/// All ready feature ids in the snapshot.
pub fn ready_ids(snapshot: &Snapshot) -> HashSet<FeatureId> {
    snapshot.iter().filter(|f| is_ready(snapshot, f)).map(|f| f.id).collect()
}

/// Ids with `running = true, passes = false`: artefacts of a crashed
/// prior orchestrator run, reclaimed with priority.
pub fn resumable_ids(snapshot: &Snapshot) -> HashSet<FeatureId> {
    snapshot.iter().filter(|f| f.is_resumable()).map(|f| f.id).collect()
}

/// Count of features whose `dependencies` contain `id`.
fn dependents_count(snapshot: &Snapshot, id: FeatureId) -> i64 {
    snapshot.iter().filter(|f| f.dependencies.contains(&id)).count() as i64
}

/// `score(id) = (1000 − priority) + 100 × dependents_count − 10 × skip_count`.
///
/// Higher is more urgent. The magnitude is not meaningful outside this
/// process; only the resulting order is observable.
pub fn scheduling_score(snapshot: &Snapshot, id: FeatureId) -> i64 {
    let Some(feature) = snapshot.get(id) else {
        return i64::MIN;
    };
    (1000 - feature.priority) + 100 * dependents_count(snapshot, id)
        - 10 * i64::from(feature.skip_count)
}

/// Sort candidate ids by `scheduling_score` descending, ties broken by
/// `priority` ascending then `id` ascending.
pub fn rank(snapshot: &Snapshot, mut ids: Vec<FeatureId>) -> Vec<FeatureId> {
    ids.sort_by(|&a, &b| {
        let score_a = scheduling_score(snapshot, a);
        let score_b = scheduling_score(snapshot, b);
        score_b
            .cmp(&score_a)
            .then_with(|| {
                let pa = snapshot.get(a).map(|f| f.priority).unwrap_or(i64::MAX);
                let pb = snapshot.get(b).map(|f| f.priority).unwrap_or(i64::MAX);
                pa.cmp(&pb)
            })
            .then_with(|| a.cmp(&b))
    });
    ids
}

/// DFS over the snapshot's committed edges plus one candidate edge
/// `from -> to` (meaning "from depends on to"). Returns true iff adding
/// it would close a cycle, i.e. `to` can already (transitively) reach
/// `from` by following existing dependency edges.
pub fn would_create_cycle(snapshot: &Snapshot, from: FeatureId, to: FeatureId) -> bool {
    if from == to {
        return true;
    }
    let mut stack = vec![to];
    let mut visited = HashSet::new();
    while let Some(current) = stack.pop() {
        if current == from {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(feature) = snapshot.get(current) {
            stack.extend(feature.dependencies.iter().copied());
        }
    }
    false
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;

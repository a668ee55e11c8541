// SPDX-License-Identifier: MIT

//! Atomic single-feature claiming with an in-process fairness mutex.

use crate::error::EngineError;
use pao_core::FeatureId;
use pao_storage::Store;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Wraps `Store::conditional_claim` so that, within one orchestrator
/// process, only one caller attempts a claim sweep at a time — this is
/// what makes a single scheduler loop fair to itself when it is ever
/// driven from more than one task. Cross-process exclusivity comes from
/// the Store's atomic `UPDATE`, not from this mutex.
pub struct ClaimService {
    store: Arc<dyn Store>,
    fairness: AsyncMutex<()>,
}

impl ClaimService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store, fairness: AsyncMutex::new(()) }
    }

    /// Walks `candidates` in the caller's order, attempting
    /// `conditional_claim` on each, and returns the first id claimed.
    /// Returns `Ok(None)` if every candidate was already taken by another
    /// writer. `max_attempts` bounds how many full sweeps over
    /// `candidates` this call will perform before raising
    /// `HighContention`.
    pub async fn claim_next_from(
        &self,
        candidates: &[FeatureId],
        max_attempts: u32,
    ) -> Result<Option<FeatureId>, EngineError> {
        if candidates.is_empty() {
            return Ok(None);
        }
        let _guard = self.fairness.lock().await;
        for attempt in 0..max_attempts.max(1) {
            for &id in candidates {
                if self.store.conditional_claim(id).await? {
                    return Ok(Some(id));
                }
            }
            if attempt + 1 < max_attempts {
                tokio::task::yield_now().await;
            }
        }
        Err(EngineError::HighContention)
    }
}

#[cfg(test)]
#[path = "claim_tests.rs"]
mod tests;

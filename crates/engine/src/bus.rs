// SPDX-License-Identifier: MIT

//! Non-blocking multi-subscriber fan-out of orchestrator events.
//!
//! Backed by `tokio::sync::broadcast`: publishing never blocks on a slow
//! subscriber, and a subscriber that falls behind its buffer observes
//! `Lagged` on its next `recv()` rather than stalling the producer —
//! a "bounded buffer, drop-oldest" contract.

use pao_core::Event;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribers must call this before `OrchestratorStarted` is
    /// published to avoid missing events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Best-effort: a bus with zero subscribers still "succeeds" — there
    /// is simply no one to deliver to.
    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;

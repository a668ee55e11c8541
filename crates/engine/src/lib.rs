// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pao-engine: the live components of the orchestrator — claiming,
//! process supervision, the scheduler loop, the event bus, and the
//! initializer coordinator.

pub mod bus;
pub mod claim;
pub mod error;
pub mod initializer;
pub mod scheduler;
pub mod supervisor;
pub mod worker;

pub use bus::EventBus;
pub use claim::ClaimService;
pub use error::EngineError;
pub use initializer::{run_initializer, InitializerCommand};
pub use scheduler::{SchedulerLoop, SchedulerOutcome, WorkerCommand};
pub use supervisor::{ProcessSupervisor, SpawnSpec};
pub use worker::WorkerId;

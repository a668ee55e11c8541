// SPDX-License-Identifier: MIT

//! Initializer Coordinator: populates an empty store once,
//! before the Scheduler Loop's first iteration.

use crate::error::EngineError;
use crate::supervisor::{ProcessSupervisor, SpawnSpec};
use pao_core::Role;
use pao_storage::Store;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Command line used to launch the initializer worker.
pub struct InitializerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Runs the initializer exactly once if `store` is empty; returns
/// immediately (without spawning anything) if it is already populated.
pub async fn run_initializer(
    store: &Arc<dyn Store>,
    supervisor: &ProcessSupervisor,
    project_dir: PathBuf,
    command: InitializerCommand,
    timeout: Duration,
) -> Result<(), EngineError> {
    if !store.snapshot().await?.is_empty() {
        tracing::info!("store already populated, skipping initializer");
        return Ok(());
    }

    tracing::info!(program = %command.program, "running initializer");
    let spec = SpawnSpec {
        role: Role::Initializer,
        feature_id: None,
        program: command.program,
        args: command.args,
        env: command.env,
        cwd: project_dir,
        resume: false,
        deadline: Some(timeout),
    };
    let (_id, exit_rx) = supervisor.spawn(spec).await?;
    let outcome = exit_rx
        .await
        .map_err(|_| EngineError::InitializerFailed("worker task dropped its exit channel".into()))?;

    if outcome.killed_by_timeout {
        return Err(EngineError::InitializerFailed("initializer exceeded its timeout".into()));
    }
    match outcome.exit_code {
        Some(0) => {}
        Some(code) => return Err(EngineError::InitializerFailed(format!("exit code {code}"))),
        None => return Err(EngineError::InitializerFailed("terminated by signal".into())),
    }

    store.refresh().await?;
    if store.snapshot().await?.is_empty() {
        return Err(EngineError::InitializerProducedNothing);
    }
    tracing::info!("initializer populated the store");
    Ok(())
}

#[cfg(test)]
#[path = "initializer_tests.rs"]
mod tests;

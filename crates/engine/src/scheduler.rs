// SPDX-License-Identifier: MIT

//! The Scheduler Loop: the orchestrator's central state
//! machine, tying the Resolver's pure selection logic to the Claim
//! Service and the Process Supervisor.

use crate::bus::EventBus;
use crate::claim::ClaimService;
use crate::error::EngineError;
use crate::supervisor::{ProcessSupervisor, SpawnSpec};
use crate::worker::WorkerId;
use pao_core::{resolver, Config, Event, Feature, FeatureId, FeatureState, Outcome, Role, Snapshot, StopReason};
use pao_storage::{FinalState, Store};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The argv/env template a worker role is launched with; the Scheduler
/// Loop appends `--project-dir`, `--role`, `--feature-id`, `--resume`
/// per the worker subprocess contract.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: String,
    pub base_args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Why `SchedulerLoop::run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerOutcome {
    /// True once every feature passes, or every remainder is quarantined or
    /// depends on a quarantined id.
    Settled,
    Shutdown,
}

struct WorkerExit {
    worker_id: WorkerId,
    role: Role,
    feature_id: Option<FeatureId>,
    outcome: crate::supervisor::ExitOutcome,
}

pub struct SchedulerLoop {
    store: Arc<dyn Store>,
    bus: Arc<EventBus>,
    supervisor: Arc<ProcessSupervisor>,
    claims: ClaimService,
    config: Config,
    project_dir: PathBuf,
    coding_command: WorkerCommand,
    testing_command: WorkerCommand,
    active_coding_ids: HashSet<FeatureId>,
    retry_counts: HashMap<FeatureId, u32>,
    quarantined: HashSet<FeatureId>,
    completions_tx: mpsc::UnboundedSender<WorkerExit>,
    completions_rx: mpsc::UnboundedReceiver<WorkerExit>,
}

impl SchedulerLoop {
    pub fn new(
        store: Arc<dyn Store>,
        bus: Arc<EventBus>,
        supervisor: Arc<ProcessSupervisor>,
        config: Config,
        project_dir: PathBuf,
        coding_command: WorkerCommand,
        testing_command: WorkerCommand,
    ) -> Self {
        let claims = ClaimService::new(Arc::clone(&store));
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            store,
            bus,
            supervisor,
            claims,
            config,
            project_dir,
            coding_command,
            testing_command,
            active_coding_ids: HashSet::new(),
            retry_counts: HashMap::new(),
            quarantined: HashSet::new(),
            completions_tx,
            completions_rx,
        }
    }

    /// Ids quarantined so far this process lifetime; volatile,
    /// never persisted.
    pub fn quarantined_ids(&self) -> Vec<FeatureId> {
        self.quarantined.iter().copied().collect()
    }

    /// Runs until the feature set settles or `shutdown` is triggered,
    /// publishing `OrchestratorStopped` on every exit path including
    /// fatal ones.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<SchedulerOutcome, EngineError> {
        tracing::info!(project_dir = %self.project_dir.display(), "scheduler loop starting");
        match self.run_inner(&shutdown).await {
            Ok(outcome) => {
                let reason = match outcome {
                    SchedulerOutcome::Settled => StopReason::AllFeaturesSettled,
                    SchedulerOutcome::Shutdown => StopReason::Shutdown,
                };
                tracing::info!(?outcome, "scheduler loop stopped");
                self.bus.publish(Event::OrchestratorStopped { reason });
                Ok(outcome)
            }
            Err(err) => {
                tracing::error!(error = %err, "scheduler loop terminated fatally");
                self.bus.publish(Event::OrchestratorStopped {
                    reason: StopReason::Fatal { message: err.to_string() },
                });
                Err(err)
            }
        }
    }

    async fn run_inner(&mut self, shutdown: &CancellationToken) -> Result<SchedulerOutcome, EngineError> {
        loop {
            while let Ok(exit) = self.completions_rx.try_recv() {
                self.handle_worker_exit(exit).await?;
            }

            if shutdown.is_cancelled() {
                self.shutdown_all().await;
                return Ok(SchedulerOutcome::Shutdown);
            }

            let snapshot = self.store.snapshot().await?;
            if self.settled(&snapshot) {
                return Ok(SchedulerOutcome::Settled);
            }
            self.publish_progress(&snapshot);

            if self.coding_cap_count() < self.config.max_coding_concurrency as usize
                && self.supervisor.active_total() < self.config.max_total_agents as usize
            {
                self.spawn_ready_workers(&snapshot).await?;
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    self.shutdown_all().await;
                    return Ok(SchedulerOutcome::Shutdown);
                }
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
                Some(exit) = self.completions_rx.recv() => {
                    self.handle_worker_exit(exit).await?;
                }
            }
        }
    }

    fn settled(&self, snapshot: &Snapshot) -> bool {
        snapshot.iter().all(|f| f.passes || self.is_unsatisfiable(f))
    }

    fn is_unsatisfiable(&self, feature: &Feature) -> bool {
        self.quarantined.contains(&feature.id)
            || feature.dependencies.iter().any(|dep| self.quarantined.contains(dep))
    }

    /// `MaxCodingConcurrency` counts testing workers too when
    /// `CountTestingTowardsCap` is set.
    fn coding_cap_count(&self) -> usize {
        if self.config.count_testing_towards_cap {
            self.supervisor.active_count(Role::Coding) + self.supervisor.active_count(Role::Testing)
        } else {
            self.supervisor.active_count(Role::Coding)
        }
    }

    fn publish_progress(&self, snapshot: &Snapshot) {
        self.bus.publish(Event::ProgressSummary {
            total: snapshot.len(),
            passing: snapshot.iter().filter(|f| f.passes).count(),
            running: snapshot.iter().filter(|f| f.running).count(),
            quarantined: self.quarantined.len(),
        });
    }

    /// Two-tier candidate selection followed by the claim-and-spawn loop.
    async fn spawn_ready_workers(&mut self, snapshot: &Snapshot) -> Result<(), EngineError> {
        let resumable = resolver::rank(
            snapshot,
            resolver::resumable_ids(snapshot)
                .into_iter()
                .filter(|id| !self.active_coding_ids.contains(id))
                .collect(),
        );
        let fresh = resolver::rank(
            snapshot,
            resolver::ready_ids(snapshot)
                .into_iter()
                .filter(|id| !self.active_coding_ids.contains(id) && !self.quarantined.contains(id))
                .collect(),
        );

        let mut candidates: Vec<(FeatureId, bool)> = resumable.into_iter().map(|id| (id, true)).collect();
        candidates.extend(fresh.into_iter().map(|id| (id, false)));

        while !candidates.is_empty()
            && self.coding_cap_count() < self.config.max_coding_concurrency as usize
            && self.supervisor.active_total() < self.config.max_total_agents as usize
        {
            let ids: Vec<FeatureId> = candidates.iter().map(|(id, _)| *id).collect();
            match self.claims.claim_next_from(&ids, self.config.claim_max_attempts).await {
                Ok(Some(claimed)) => {
                    let resume =
                        candidates.iter().find(|(id, _)| *id == claimed).map(|(_, r)| *r).unwrap_or(false);
                    candidates.retain(|(id, _)| *id != claimed);
                    self.spawn_coding_worker(claimed, resume).await?;
                }
                Ok(None) => break,
                Err(EngineError::HighContention) => {
                    tracing::warn!(candidates = ids.len(), "claim service exceeded its attempt budget");
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn spawn_coding_worker(&mut self, id: FeatureId, resume: bool) -> Result<(), EngineError> {
        let spec = self.build_spec(Role::Coding, Some(id), resume);
        let (worker_id, exit_rx) = self.supervisor.spawn(spec).await?;
        tracing::info!(%worker_id, feature_id = id.get(), resume, "spawned coding worker");
        self.active_coding_ids.insert(id);
        self.forward_exit(worker_id, Role::Coding, Some(id), exit_rx);
        Ok(())
    }

    /// Spawned after a coding success, up to `TestingAgentRatio` per
    /// success; suppressed entirely by `YoloMode`.
    async fn spawn_testing_workers(&mut self, passed_id: FeatureId) -> Result<(), EngineError> {
        if self.config.yolo_mode {
            return Ok(());
        }
        for _ in 0..self.config.testing_agent_ratio {
            if self.supervisor.active_total() >= self.config.max_total_agents as usize {
                break;
            }
            if self.config.count_testing_towards_cap
                && self.coding_cap_count() >= self.config.max_coding_concurrency as usize
            {
                break;
            }
            let spec = self.build_spec(Role::Testing, Some(passed_id), false);
            let (worker_id, exit_rx) = self.supervisor.spawn(spec).await?;
            self.forward_exit(worker_id, Role::Testing, Some(passed_id), exit_rx);
        }
        Ok(())
    }

    fn forward_exit(
        &self,
        worker_id: WorkerId,
        role: Role,
        feature_id: Option<FeatureId>,
        exit_rx: tokio::sync::oneshot::Receiver<crate::supervisor::ExitOutcome>,
    ) {
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            if let Ok(outcome) = exit_rx.await {
                let _ = tx.send(WorkerExit { worker_id, role, feature_id, outcome });
            }
        });
    }

    fn command_for(&self, role: Role) -> &WorkerCommand {
        match role {
            Role::Coding => &self.coding_command,
            Role::Testing => &self.testing_command,
            Role::Initializer => {
                unreachable!("initializer workers are spawned by run_initializer, not the scheduler loop")
            }
        }
    }

    fn build_spec(&self, role: Role, feature_id: Option<FeatureId>, resume: bool) -> SpawnSpec {
        let command = self.command_for(role);
        let mut args = command.base_args.clone();
        args.push("--project-dir".into());
        args.push(self.project_dir.display().to_string());
        args.push("--role".into());
        args.push(role.to_string());
        if let Some(id) = feature_id {
            args.push("--feature-id".into());
            args.push(id.get().to_string());
        }
        if resume {
            args.push("--resume".into());
        }
        SpawnSpec {
            role,
            feature_id,
            program: command.program.clone(),
            args,
            env: command.env.clone(),
            cwd: self.project_dir.clone(),
            resume,
            deadline: None,
        }
    }

    /// The worker-exit callback, run for every completed coding or
    /// testing worker regardless of whether it exited on its own or was
    /// killed by `kill_tree`.
    async fn handle_worker_exit(&mut self, exit: WorkerExit) -> Result<(), EngineError> {
        self.supervisor.forget(exit.worker_id);

        if exit.role == Role::Testing {
            let passed = !exit.outcome.killed_by_timeout && exit.outcome.exit_code == Some(0);
            self.bus.publish(Event::WorkerCompleted {
                role: Role::Testing,
                feature_id: exit.feature_id.unwrap_or(FeatureId::NONE),
                exit_code: exit.outcome.exit_code,
                outcome: if passed { Outcome::Pass } else { Outcome::Fail },
            });
            return Ok(());
        }

        let Some(id) = exit.feature_id else {
            return Ok(());
        };
        self.active_coding_ids.remove(&id);

        self.store.refresh().await?; // step 1
        let snapshot = self.store.snapshot().await?; // step 2
        let committed_passing = snapshot.get(id).map(|f| f.passes).unwrap_or(false);
        let success =
            !exit.outcome.killed_by_timeout && exit.outcome.exit_code == Some(0) && committed_passing;

        let new_state = if success {
            // step 3
            self.retry_counts.remove(&id);
            FeatureState::Passing
        } else {
            // step 4
            let failures = self.retry_counts.entry(id).or_insert(0);
            *failures += 1;
            if *failures >= self.config.max_feature_retries {
                self.quarantined.insert(id);
                tracing::warn!(feature_id = id.get(), failures = *failures, "feature quarantined");
            }
            self.store.release(id, FinalState::Pending).await?;
            FeatureState::Pending
        };

        self.bus.publish(Event::FeatureStateChanged {
            feature_id: id,
            old_state: FeatureState::Running,
            new_state,
        });
        self.bus.publish(Event::WorkerCompleted {
            role: Role::Coding,
            feature_id: id,
            exit_code: exit.outcome.exit_code,
            outcome: if success { Outcome::Pass } else { Outcome::Fail },
        }); // step 5

        if success {
            self.spawn_testing_workers(id).await?;
        }
        Ok(())
    }

    async fn shutdown_all(&mut self) {
        let grace = self.config.kill_tree_grace();
        let ids = self.supervisor.live_ids();
        tracing::info!(live = ids.len(), "shutting down, killing every live worker tree");
        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            let supervisor = Arc::clone(&self.supervisor);
            handles.push(tokio::spawn(async move { supervisor.kill_tree(id, grace).await }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        while self.supervisor.active_total() > 0 {
            match self.completions_rx.recv().await {
                Some(exit) => {
                    let _ = self.handle_worker_exit(exit).await;
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;

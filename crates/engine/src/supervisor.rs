// SPDX-License-Identifier: MIT

//! Process-tree supervision. Termination semantics differ across platforms,
//!
//! `kill_tree` enumerates the root's transitive descendants at the
//! moment it is called (on Linux, by walking `/proc/*/stat`'s `ppid`
//! field; on other Unixes, via `ps -o pid=,ppid=`), sends a cooperative
//! `SIGTERM` to all of them, waits `grace`, then re-enumerates survivors
//! and sends `SIGKILL`. Windows has no equivalent signal story, so
//! `taskkill /T /F` is used there, which does its own descendant walk
//! internally.

use crate::bus::EventBus;
use crate::error::EngineError;
use crate::worker::{WorkerId, WorkerRecord};
use pao_core::{Clock, Event, FeatureId, Role, SystemClock};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;

/// Parameters for one worker spawn.
pub struct SpawnSpec {
    pub role: Role,
    pub feature_id: Option<FeatureId>,
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: PathBuf,
    pub resume: bool,
    pub deadline: Option<Duration>,
}

/// Result delivered exactly once, after the reader task has drained the
/// worker's combined output.
#[derive(Debug, Clone, Copy)]
pub struct ExitOutcome {
    pub exit_code: Option<i32>,
    pub killed_by_timeout: bool,
}

struct State {
    live: HashMap<WorkerId, WorkerRecord>,
}

/// Spawns, observes, and terminates worker process trees.
pub struct ProcessSupervisor<C: Clock = SystemClock> {
    bus: Arc<EventBus>,
    state: Mutex<State>,
    id_seq: AtomicU64,
    clock: C,
}

impl ProcessSupervisor<SystemClock> {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self::with_clock(bus, SystemClock)
    }
}

impl<C: Clock> ProcessSupervisor<C> {
    /// Builds a supervisor that stamps `WorkerRecord::spawned_at` from
    /// `clock` instead of the real system clock, so tests can control
    /// how long a worker appears to have been running.
    pub fn with_clock(bus: Arc<EventBus>, clock: C) -> Self {
        Self { bus, state: Mutex::new(State { live: HashMap::new() }), id_seq: AtomicU64::new(0), clock }
    }

    pub fn active_count(&self, role: Role) -> usize {
        self.state.lock().live.values().filter(|w| w.role == role).count()
    }

    pub fn active_total(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Every worker id currently believed live, for shutdown's `kill_tree` sweep.
    pub fn live_ids(&self) -> Vec<WorkerId> {
        self.state.lock().live.keys().copied().collect()
    }

    /// Wall-clock time since `id` was spawned, per this supervisor's
    /// clock. `None` if `id` is not (or no longer) live.
    pub fn uptime(&self, id: WorkerId) -> Option<Duration> {
        let spawned_at = self.state.lock().live.get(&id)?.spawned_at;
        Some(self.clock.now().saturating_duration_since(spawned_at))
    }

    /// Spawns `spec` and returns its id plus a receiver that resolves
    /// exactly once, after its output has been fully drained and the
    /// process has exited (or been killed by `deadline`/`kill_tree`).
    pub async fn spawn(
        &self,
        spec: SpawnSpec,
    ) -> Result<(WorkerId, oneshot::Receiver<ExitOutcome>), EngineError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.cwd)
            .env("PROJECT_DIR", &spec.cwd)
            .envs(spec.env.iter().cloned())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            tracing::error!(program = %spec.program, error = %e, "failed to spawn worker");
            EngineError::SpawnError(e.to_string())
        })?;
        let pid = child
            .id()
            .ok_or_else(|| EngineError::SpawnError("child exited before pid was observed".into()))?;

        let id = WorkerId::new(self.id_seq.fetch_add(1, Ordering::Relaxed));
        tracing::info!(%id, pid, role = %spec.role, "worker spawned");
        let record = WorkerRecord {
            id,
            role: spec.role,
            feature_id: spec.feature_id,
            pid,
            spawned_at: self.clock.now(),
            resumed: spec.resume,
        };
        self.state.lock().live.insert(id, record);

        self.bus.publish(Event::WorkerSpawned {
            role: spec.role,
            feature_id: spec.feature_id.unwrap_or(FeatureId::NONE),
            pid,
        });

        let stdout = child.stdout.take().ok_or_else(|| EngineError::SpawnError("no stdout handle".into()))?;
        let stderr = child.stderr.take().ok_or_else(|| EngineError::SpawnError("no stderr handle".into()))?;
        let bus = Arc::clone(&self.bus);
        let role = spec.role;
        let feature_id = spec.feature_id.unwrap_or(FeatureId::NONE);
        let deadline = spec.deadline;

        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            pump_output(Arc::clone(&bus), role, feature_id, stdout, stderr).await;

            let wait = child.wait();
            let (status, killed_by_timeout) = match deadline {
                Some(d) => match tokio::time::timeout(d, wait).await {
                    Ok(result) => (result, false),
                    Err(_) => {
                        let _ = child.start_kill();
                        (child.wait().await, true)
                    }
                },
                None => (wait.await, false),
            };

            let exit_code = status.ok().and_then(|s| s.code());
            let _ = tx.send(ExitOutcome { exit_code, killed_by_timeout });
        });

        Ok((id, rx))
    }

    /// Sends a cooperative stop to every live descendant of `id`'s
    /// process, waits up to `grace`, then force-terminates survivors
    /// plus the root.
    pub async fn kill_tree(&self, id: WorkerId, grace: Duration) {
        let pid = {
            let state = self.state.lock();
            state.live.get(&id).map(|w| w.pid)
        };
        let Some(pid) = pid else {
            return;
        };
        tracing::info!(%id, pid, grace_ms = grace.as_millis(), "killing worker tree");
        tokio::task::spawn_blocking(move || process_tree::cooperative_stop(pid))
            .await
            .ok();
        tokio::time::sleep(grace).await;
        tokio::task::spawn_blocking(move || process_tree::force_kill(pid)).await.ok();
    }

    /// Called by the caller once a worker's exit outcome has been
    /// received; removes it from the handle map.
    pub fn forget(&self, id: WorkerId) {
        self.state.lock().live.remove(&id);
    }
}

async fn pump_output(
    bus: Arc<EventBus>,
    role: Role,
    feature_id: FeatureId,
    stdout: tokio::process::ChildStdout,
    stderr: tokio::process::ChildStderr,
) {
    let mut out_lines = BufReader::new(stdout).lines();
    let mut err_lines = BufReader::new(stderr).lines();
    let mut out_done = false;
    let mut err_done = false;

    while !out_done || !err_done {
        tokio::select! {
            line = out_lines.next_line(), if !out_done => match line {
                Ok(Some(line)) => bus.publish(Event::WorkerOutputLine { role, feature_id, line }),
                _ => out_done = true,
            },
            line = err_lines.next_line(), if !err_done => match line {
                Ok(Some(line)) => bus.publish(Event::WorkerOutputLine { role, feature_id, line }),
                _ => err_done = true,
            },
        }
    }
}

mod process_tree {
    //! Platform-specific descendant enumeration and signalling.

    /// Root plus every transitive descendant still alive, root first.
    #[cfg(target_os = "linux")]
    fn tree_pids(root: u32) -> Vec<i32> {
        let mut children_of: std::collections::HashMap<i32, Vec<i32>> = std::collections::HashMap::new();
        if let Ok(entries) = std::fs::read_dir("/proc") {
            for entry in entries.flatten() {
                let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<i32>().ok()) else {
                    continue;
                };
                let Ok(stat) = std::fs::read_to_string(entry.path().join("stat")) else { continue };
                let Some(after_comm) = stat.rfind(')').map(|i| &stat[i + 2..]) else { continue };
                let mut fields = after_comm.split_whitespace();
                fields.next(); // state
                if let Some(ppid) = fields.next().and_then(|s| s.parse::<i32>().ok()) {
                    children_of.entry(ppid).or_default().push(pid);
                }
            }
        }
        let mut result = vec![root as i32];
        let mut stack = vec![root as i32];
        while let Some(pid) = stack.pop() {
            if let Some(children) = children_of.get(&pid) {
                for &child in children {
                    result.push(child);
                    stack.push(child);
                }
            }
        }
        result
    }

    #[cfg(all(unix, not(target_os = "linux")))]
    fn tree_pids(root: u32) -> Vec<i32> {
        let output = std::process::Command::new("ps").args(["-A", "-o", "pid=,ppid="]).output();
        let mut children_of: std::collections::HashMap<i32, Vec<i32>> = std::collections::HashMap::new();
        if let Ok(output) = output {
            let text = String::from_utf8_lossy(&output.stdout);
            for line in text.lines() {
                let mut parts = line.split_whitespace();
                if let (Some(pid), Some(ppid)) = (parts.next(), parts.next()) {
                    if let (Ok(pid), Ok(ppid)) = (pid.parse::<i32>(), ppid.parse::<i32>()) {
                        children_of.entry(ppid).or_default().push(pid);
                    }
                }
            }
        }
        let mut result = vec![root as i32];
        let mut stack = vec![root as i32];
        while let Some(pid) = stack.pop() {
            if let Some(children) = children_of.get(&pid) {
                for &child in children {
                    result.push(child);
                    stack.push(child);
                }
            }
        }
        result
    }

    #[cfg(unix)]
    pub fn cooperative_stop(root: u32) {
        for pid in tree_pids(root) {
            let _ = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), nix::sys::signal::Signal::SIGTERM);
        }
    }

    #[cfg(unix)]
    pub fn force_kill(root: u32) {
        for pid in tree_pids(root) {
            let _ = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), nix::sys::signal::Signal::SIGKILL);
        }
    }

    #[cfg(windows)]
    pub fn cooperative_stop(_root: u32) {
        // No portable cooperative-stop signal for an arbitrary tree on
        // Windows; go straight to the forceful path.
    }

    #[cfg(windows)]
    pub fn force_kill(root: u32) {
        let _ = std::process::Command::new("taskkill")
            .args(["/PID", &root.to_string(), "/T", "/F"])
            .status();
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;

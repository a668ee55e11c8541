// SPDX-License-Identifier: MIT

//! `pao run`: the default command. Wires the store, event bus, process
//! supervisor, and scheduler loop together and drives them to completion.

use crate::lock::ProjectLock;
use crate::output::{print_event, OutputFormat};
use clap::Args;
use pao_core::Config;
use pao_engine::{run_initializer, EventBus, InitializerCommand, ProcessSupervisor, SchedulerLoop, SchedulerOutcome, WorkerCommand};
use pao_storage::{SqliteStore, Store};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct RunArgs {
    /// Project directory; the store lives at `<project_dir>/pao.sqlite3`.
    project_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[arg(long, default_value = "3")]
    max_coding_concurrency: u32,
    #[arg(long, default_value = "10")]
    max_total_agents: u32,
    #[arg(long, default_value = "1")]
    testing_agent_ratio: u32,
    #[arg(long)]
    count_testing_towards_cap: bool,
    #[arg(long)]
    yolo_mode: bool,
    #[arg(long, default_value = "5000")]
    poll_interval_ms: u64,
    #[arg(long, default_value = "3")]
    max_feature_retries: u32,
    #[arg(long, default_value = "1800")]
    initializer_timeout_secs: u64,
    #[arg(long, default_value = "10")]
    claim_max_attempts: u32,
    #[arg(long, default_value = "5")]
    kill_tree_grace_secs: u64,

    /// Program used to launch the initializer worker.
    #[arg(long)]
    initializer_program: Option<String>,
    #[arg(long = "initializer-arg")]
    initializer_args: Vec<String>,

    /// Program used to launch coding workers.
    #[arg(long, default_value = "pao-worker")]
    coding_program: String,
    #[arg(long = "coding-arg")]
    coding_args: Vec<String>,

    /// Program used to launch testing workers.
    #[arg(long, default_value = "pao-worker")]
    testing_program: String,
    #[arg(long = "testing-arg")]
    testing_args: Vec<String>,
}

impl RunArgs {
    fn config(&self) -> Config {
        Config {
            max_coding_concurrency: self.max_coding_concurrency,
            max_total_agents: self.max_total_agents,
            testing_agent_ratio: self.testing_agent_ratio,
            count_testing_towards_cap: self.count_testing_towards_cap,
            yolo_mode: self.yolo_mode,
            poll_interval_ms: self.poll_interval_ms,
            max_feature_retries: self.max_feature_retries,
            initializer_timeout_secs: self.initializer_timeout_secs,
            claim_max_attempts: self.claim_max_attempts,
            kill_tree_grace_secs: self.kill_tree_grace_secs,
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

pub async fn run(args: RunArgs) -> ExitCode {
    init_tracing();

    let _lock = match ProjectLock::acquire(&args.project_dir) {
        Ok(lock) => lock,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let (config, clamps) = args.config().clamp();
    for clamp in &clamps {
        tracing::warn!(field = clamp.field, requested = clamp.requested, clamped_to = clamp.clamped_to, "config value clamped");
    }

    let db_path = args.project_dir.join("pao.sqlite3");
    let store: Arc<dyn Store> = match SqliteStore::open(&db_path).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("failed to open store at {}: {e}", db_path.display());
            return ExitCode::FAILURE;
        }
    };

    let bus = Arc::new(EventBus::new());
    let mut events = bus.subscribe();
    let format = args.format;
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            print_event(&event, format);
        }
    });

    let supervisor = Arc::new(ProcessSupervisor::new(Arc::clone(&bus)));

    if let Some(program) = args.initializer_program.clone() {
        let init_command = InitializerCommand { program, args: args.initializer_args.clone(), env: Vec::new() };
        if let Err(e) = run_initializer(
            &store,
            &supervisor,
            args.project_dir.clone(),
            init_command,
            config.initializer_timeout(),
        )
        .await
        {
            eprintln!("initializer failed: {e}");
            return ExitCode::FAILURE;
        }
    }

    bus.publish(pao_core::Event::OrchestratorStarted { config: config.clone(), clamps });

    let coding_command =
        WorkerCommand { program: args.coding_program.clone(), base_args: args.coding_args.clone(), env: Vec::new() };
    let testing_command =
        WorkerCommand { program: args.testing_program.clone(), base_args: args.testing_args.clone(), env: Vec::new() };

    let shutdown = CancellationToken::new();
    let shutdown_for_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received shutdown signal");
            shutdown_for_signal.cancel();
        }
    });

    let scheduler =
        SchedulerLoop::new(Arc::clone(&store), Arc::clone(&bus), supervisor, config, args.project_dir.clone(), coding_command, testing_command);

    let result = scheduler.run(shutdown).await;
    drop(bus);
    let _ = printer.await;

    match result {
        Ok(SchedulerOutcome::Settled) => {
            match store.snapshot().await {
                Ok(snapshot) if snapshot.iter().all(|f| f.passes) => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            }
        }
        Ok(SchedulerOutcome::Shutdown) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("orchestrator terminated fatally: {e}");
            ExitCode::FAILURE
        }
    }
}

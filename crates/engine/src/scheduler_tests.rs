use super::*;
use pao_core::NewFeature;
use pao_storage::SqliteStore;
use std::time::Duration;
use tempfile::TempDir;

async fn open_store() -> (TempDir, Arc<dyn Store>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SqliteStore::open(dir.path().join("pao.sqlite3")).await.expect("open store");
    (dir, Arc::new(store))
}

fn feature(name: &str) -> NewFeature {
    NewFeature { priority: 0, name: name.into(), category: "core".into(), description: String::new(), steps: Vec::new() }
}

fn sh_command(script: &str) -> WorkerCommand {
    WorkerCommand {
        program: "sh".into(),
        base_args: vec!["-c".into(), script.into()],
        env: Vec::new(),
    }
}

/// Simulates an external worker's own commit: whenever a coding worker
/// is spawned, asynchronously applies `final_state` to its feature a
/// few milliseconds later, mirroring the worker process's own write.
fn auto_commit(bus: Arc<EventBus>, store: Arc<dyn Store>, final_state: FinalState) {
    tokio::spawn(async move {
        let mut rx = bus.subscribe();
        while let Ok(event) = rx.recv().await {
            if let Event::WorkerSpawned { role: Role::Coding, feature_id, .. } = event {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    let _ = store.release(feature_id, final_state).await;
                });
            }
        }
    });
}

#[tokio::test]
#[cfg(unix)]
async fn linear_chain_completes_in_dependency_order() {
    let (dir, store) = open_store().await;
    let ids = store
        .insert_bulk(vec![feature("one"), feature("two"), feature("three")])
        .await
        .expect("seed");
    store.add_dependency(ids[1], ids[0]).await.expect("dep 2<-1");
    store.add_dependency(ids[2], ids[1]).await.expect("dep 3<-2");

    let bus = Arc::new(EventBus::new());
    let mut events = bus.subscribe();
    let supervisor = Arc::new(ProcessSupervisor::new(Arc::clone(&bus)));
    auto_commit(Arc::clone(&bus), Arc::clone(&store), FinalState::Success);

    let mut config = Config::default();
    config.poll_interval_ms = 20;
    config.max_coding_concurrency = 3;
    config.yolo_mode = true;

    let scheduler = SchedulerLoop::new(
        Arc::clone(&store),
        bus,
        supervisor,
        config,
        dir.path().to_path_buf(),
        sh_command("sleep 0.05; exit 0"),
        sh_command("exit 0"),
    );

    let outcome = tokio::time::timeout(Duration::from_secs(5), scheduler.run(CancellationToken::new()))
        .await
        .expect("scheduler terminated")
        .expect("scheduler succeeded");
    assert_eq!(outcome, SchedulerOutcome::Settled);

    let mut spawn_order = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::WorkerSpawned { role: Role::Coding, feature_id, .. } = event {
            spawn_order.push(feature_id);
        }
    }
    assert_eq!(spawn_order, ids);
}

#[tokio::test]
#[cfg(unix)]
async fn quarantines_a_feature_after_exhausting_retries() {
    let (dir, store) = open_store().await;
    let ids = store.insert_bulk(vec![feature("flaky")]).await.expect("seed");

    let bus = Arc::new(EventBus::new());
    let supervisor = Arc::new(ProcessSupervisor::new(Arc::clone(&bus)));

    let mut config = Config::default();
    config.poll_interval_ms = 20;
    config.max_feature_retries = 2;
    config.yolo_mode = true;

    let scheduler = SchedulerLoop::new(
        Arc::clone(&store),
        bus,
        supervisor,
        config,
        dir.path().to_path_buf(),
        sh_command("exit 1"),
        sh_command("exit 0"),
    );

    let outcome = tokio::time::timeout(Duration::from_secs(5), scheduler.run(CancellationToken::new()))
        .await
        .expect("scheduler terminated")
        .expect("scheduler settled");
    assert_eq!(outcome, SchedulerOutcome::Settled);

    let snapshot = store.snapshot().await.expect("final snapshot");
    assert!(!snapshot.get(ids[0]).expect("feature").passes);
}

#[tokio::test]
#[cfg(unix)]
async fn respects_max_coding_concurrency_cap() {
    let (dir, store) = open_store().await;
    store
        .insert_bulk(vec![
            feature("a"),
            feature("b"),
            feature("c"),
            feature("d"),
            feature("e"),
        ])
        .await
        .expect("seed");

    let bus = Arc::new(EventBus::new());
    let supervisor = Arc::new(ProcessSupervisor::new(Arc::clone(&bus)));
    let observed_supervisor = Arc::clone(&supervisor);

    let mut config = Config::default();
    config.poll_interval_ms = 20;
    config.max_coding_concurrency = 2;
    config.max_total_agents = 2;
    config.yolo_mode = true;

    let scheduler = SchedulerLoop::new(
        Arc::clone(&store),
        bus,
        supervisor,
        config,
        dir.path().to_path_buf(),
        sh_command("sleep 0.3; exit 0"),
        sh_command("exit 0"),
    );

    let handle = tokio::spawn(scheduler.run(CancellationToken::new()));

    let mut max_seen = 0;
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(25)).await;
        max_seen = max_seen.max(observed_supervisor.active_count(Role::Coding));
    }
    handle.abort();
    assert!(max_seen <= 2, "saw {max_seen} concurrent coding workers, cap was 2");
}

#[tokio::test]
#[cfg(unix)]
async fn shutdown_signal_stops_the_loop_and_kills_live_workers() {
    let (dir, store) = open_store().await;
    store.insert_bulk(vec![feature("long-runner")]).await.expect("seed");

    let bus = Arc::new(EventBus::new());
    let supervisor = Arc::new(ProcessSupervisor::new(Arc::clone(&bus)));

    let mut config = Config::default();
    config.poll_interval_ms = 20;
    config.kill_tree_grace_secs = 1;
    config.yolo_mode = true;

    let scheduler = SchedulerLoop::new(
        Arc::clone(&store),
        bus,
        supervisor,
        config,
        dir.path().to_path_buf(),
        sh_command("sleep 30"),
        sh_command("exit 0"),
    );

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(scheduler.run(shutdown.clone()));

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler task joined")
        .expect("scheduler task did not panic")
        .expect("scheduler returned a result");
    assert_eq!(outcome, SchedulerOutcome::Shutdown);
}

#[tokio::test]
#[cfg(unix)]
async fn yolo_mode_never_spawns_testing_workers() {
    let (dir, store) = open_store().await;
    store.insert_bulk(vec![feature("solo")]).await.expect("seed");

    let bus = Arc::new(EventBus::new());
    let mut events = bus.subscribe();
    let supervisor = Arc::new(ProcessSupervisor::new(Arc::clone(&bus)));
    auto_commit(Arc::clone(&bus), Arc::clone(&store), FinalState::Success);

    let mut config = Config::default();
    config.poll_interval_ms = 20;
    config.yolo_mode = true;
    config.testing_agent_ratio = 3;

    let scheduler = SchedulerLoop::new(
        Arc::clone(&store),
        bus,
        supervisor,
        config,
        dir.path().to_path_buf(),
        sh_command("sleep 0.05; exit 0"),
        sh_command("exit 0"),
    );

    let outcome = tokio::time::timeout(Duration::from_secs(5), scheduler.run(CancellationToken::new()))
        .await
        .expect("scheduler terminated")
        .expect("scheduler settled");
    assert_eq!(outcome, SchedulerOutcome::Settled);

    let mut testing_spawns = 0;
    while let Ok(event) = events.try_recv() {
        if let Event::WorkerSpawned { role: Role::Testing, .. } = event {
            testing_spawns += 1;
        }
    }
    assert_eq!(testing_spawns, 0);
}

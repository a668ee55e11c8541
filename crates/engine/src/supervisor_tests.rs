use super::*;
use pao_core::{FakeClock, FeatureId};
use std::time::Duration;

fn spec(program: &str, args: &[&str]) -> SpawnSpec {
    SpawnSpec {
        role: Role::Coding,
        feature_id: Some(FeatureId::new(1)),
        program: program.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        env: Vec::new(),
        cwd: std::env::temp_dir(),
        resume: false,
        deadline: None,
    }
}

#[tokio::test]
#[cfg(unix)]
async fn spawn_streams_output_and_reports_exit_code() {
    let bus = Arc::new(EventBus::new());
    let mut rx = bus.subscribe();
    let supervisor = ProcessSupervisor::new(Arc::clone(&bus));

    let (_id, exit_rx) = supervisor
        .spawn(spec("sh", &["-c", "echo line-one; echo line-two; exit 7"]))
        .await
        .expect("spawn");

    let outcome = exit_rx.await.expect("exit outcome");
    assert_eq!(outcome.exit_code, Some(7));
    assert!(!outcome.killed_by_timeout);

    let mut lines = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let Event::WorkerOutputLine { line, .. } = event {
            lines.push(line);
        }
    }
    assert_eq!(lines, vec!["line-one".to_string(), "line-two".to_string()]);
}

#[tokio::test]
#[cfg(unix)]
async fn spawn_of_missing_binary_is_a_spawn_error() {
    let bus = Arc::new(EventBus::new());
    let supervisor = ProcessSupervisor::new(bus);

    let err = supervisor.spawn(spec("definitely-not-a-real-binary", &[])).await.unwrap_err();
    assert!(matches!(err, EngineError::SpawnError(_)));
}

#[tokio::test]
#[cfg(unix)]
async fn deadline_triggers_kill_and_marks_timeout() {
    let bus = Arc::new(EventBus::new());
    let supervisor = ProcessSupervisor::new(bus);

    let mut s = spec("sh", &["-c", "sleep 30"]);
    s.deadline = Some(Duration::from_millis(100));

    let (_id, exit_rx) = supervisor.spawn(s).await.expect("spawn");
    let outcome = exit_rx.await.expect("exit outcome");
    assert!(outcome.killed_by_timeout);
}

#[tokio::test]
#[cfg(unix)]
async fn kill_tree_terminates_a_sleeping_worker() {
    let bus = Arc::new(EventBus::new());
    let supervisor = ProcessSupervisor::new(bus);

    let (id, exit_rx) = supervisor.spawn(spec("sh", &["-c", "sleep 30"])).await.expect("spawn");
    supervisor.kill_tree(id, Duration::from_millis(200)).await;

    let outcome = tokio::time::timeout(Duration::from_secs(2), exit_rx)
        .await
        .expect("worker exited after kill_tree")
        .expect("exit outcome");
    assert_ne!(outcome.exit_code, Some(0));
}

#[tokio::test]
#[cfg(unix)]
async fn uptime_advances_with_the_injected_clock() {
    let bus = Arc::new(EventBus::new());
    let clock = FakeClock::new();
    let supervisor = ProcessSupervisor::with_clock(bus, clock.clone());

    let (id, _exit_rx) = supervisor.spawn(spec("sh", &["-c", "sleep 30"])).await.expect("spawn");
    assert_eq!(supervisor.uptime(id), Some(Duration::ZERO));

    clock.advance(Duration::from_secs(5));
    assert_eq!(supervisor.uptime(id), Some(Duration::from_secs(5)));

    supervisor.kill_tree(id, Duration::from_millis(200)).await;
    supervisor.forget(id);
    assert_eq!(supervisor.uptime(id), None);
}

#[tokio::test]
async fn active_counts_track_role() {
    let bus = Arc::new(EventBus::new());
    let supervisor = ProcessSupervisor::new(bus);
    assert_eq!(supervisor.active_count(Role::Coding), 0);
    assert_eq!(supervisor.active_total(), 0);
}

// tests/supervisor_lifecycle.rs
#![cfg(unix)]

mod common;
use crate::common::{init_tracing, is_alive, wait_for_pids};

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use assetdag::config::BackendConfig;
use assetdag::engine::RuntimeEvent;
use assetdag::exec::{ExitDisposition, ProcessSupervisor, SupervisorState};

fn backend(argv: &[&str], kill_timeout: Duration) -> BackendConfig {
    BackendConfig {
        command: argv.iter().map(|s| s.to_string()).collect(),
        task: Some("build-server".into()),
        restart_exit_codes: BTreeSet::from([8]),
        kill_timeout,
        cwd: None,
    }
}

#[tokio::test]
async fn restart_stops_the_old_process_before_starting_a_new_one() {
    crate::common::with_timeout(async {
        init_tracing();
        let (tx, _rx) = mpsc::channel::<RuntimeEvent>(8);
        let mut sup =
            ProcessSupervisor::new(backend(&["sleep", "30"], Duration::from_secs(2)), ".", tx);

        sup.restart().await.unwrap();
        let first = sup.pid().unwrap();
        assert!(is_alive(first));

        sup.restart().await.unwrap();
        let second = sup.pid().unwrap();

        assert_ne!(first, second);
        assert!(!is_alive(first), "old backend {first} still running");
        assert!(is_alive(second));
        assert_eq!(sup.generation(), 2);
        assert_eq!(sup.state(), SupervisorState::Running);

        sup.shutdown().await;
        assert!(!is_alive(second));
        assert_eq!(sup.state(), SupervisorState::Stopped);
        assert!(sup.pid().is_none());
    })
    .await
}

#[tokio::test]
async fn servers_forked_by_a_wrapper_die_with_it() {
    crate::common::with_timeout(async {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("server.pid");
        let mut spec = backend(
            &["sh", "-c", "sleep 300 & echo $! > server.pid; wait"],
            Duration::from_secs(2),
        );
        spec.cwd = Some(dir.path().to_path_buf());

        let (tx, _rx) = mpsc::channel::<RuntimeEvent>(8);
        let mut sup = ProcessSupervisor::new(spec, ".", tx);

        sup.restart().await.unwrap();
        let first_server = wait_for_pids(&pid_file, 1).await[0];
        assert!(is_alive(first_server));
        std::fs::remove_file(&pid_file).unwrap();

        sup.restart().await.unwrap();
        assert!(
            !is_alive(first_server),
            "server {first_server} outlived its wrapper's restart"
        );
        let second_server = wait_for_pids(&pid_file, 1).await[0];
        assert!(is_alive(second_server));

        sup.shutdown().await;
        assert!(
            !is_alive(second_server),
            "server {second_server} outlived shutdown"
        );
    })
    .await
}

#[tokio::test]
async fn stubborn_process_is_killed_after_the_grace_period() {
    crate::common::with_timeout(async {
        init_tracing();
        let (tx, _rx) = mpsc::channel::<RuntimeEvent>(8);
        let mut sup = ProcessSupervisor::new(
            backend(
                &["sh", "-c", "trap '' TERM; while true; do sleep 1; done"],
                Duration::from_millis(200),
            ),
            ".",
            tx,
        );
        sup.restart().await.unwrap();
        let pid = sup.pid().unwrap();

        // Give the shell time to install its trap.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = Instant::now();
        sup.shutdown().await;

        assert!(!is_alive(pid));
        assert!(started.elapsed() >= Duration::from_millis(200));
    })
    .await
}

#[tokio::test]
async fn sentinel_exit_waits_for_a_rebuild() {
    crate::common::with_timeout(async {
        init_tracing();
        let (tx, mut rx) = mpsc::channel::<RuntimeEvent>(8);
        let mut sup = ProcessSupervisor::new(
            backend(&["sh", "-c", "exit 8"], Duration::from_secs(2)),
            ".",
            tx,
        );
        sup.restart().await.unwrap();

        let Some(RuntimeEvent::ProcessExited { generation, code }) = rx.recv().await else {
            panic!("expected a ProcessExited event");
        };
        assert_eq!(code, Some(8));
        assert_eq!(
            sup.on_exited(generation, code),
            ExitDisposition::RebuildRequested(8)
        );

        // Nothing is respawned on its own.
        assert_eq!(sup.state(), SupervisorState::Stopped);
        assert_eq!(sup.generation(), 1);

        // The rebuild then brings it back.
        sup.restart().await.unwrap();
        assert_eq!(sup.generation(), 2);
        sup.shutdown().await;
    })
    .await
}

#[tokio::test]
async fn clean_exit_is_not_an_error() {
    crate::common::with_timeout(async {
        let (tx, mut rx) = mpsc::channel::<RuntimeEvent>(8);
        let mut sup =
            ProcessSupervisor::new(backend(&["true"], Duration::from_secs(2)), ".", tx);
        sup.restart().await.unwrap();

        let Some(RuntimeEvent::ProcessExited { generation, code }) = rx.recv().await else {
            panic!("expected a ProcessExited event");
        };
        assert_eq!(sup.on_exited(generation, code), ExitDisposition::Clean);
    })
    .await
}

#[tokio::test]
async fn shutdown_without_a_process_is_a_no_op() {
    let (tx, _rx) = mpsc::channel::<RuntimeEvent>(8);
    let mut sup = ProcessSupervisor::new(backend(&["sleep", "30"], Duration::from_secs(2)), ".", tx);
    sup.shutdown().await;
    assert_eq!(sup.state(), SupervisorState::Stopped);
    assert_eq!(sup.generation(), 0);
}

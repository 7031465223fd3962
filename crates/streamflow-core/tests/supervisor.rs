//! Supervisor behaviour against an in-memory backend.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{Harness, eventually};
use streamflow_core::{
    BroadcastRequest, Destination, ExitReason, JobState, StopOutcome, StreamError, StreamEvent,
    StreamId,
};

#[tokio::test]
async fn started_stream_is_listed() {
    let h = Harness::new();
    let id = h.supervisor.start(h.request()).await.unwrap();

    assert_eq!(h.supervisor.list().await, vec![id.clone()]);
    let snapshot = h.supervisor.get(&id).unwrap();
    assert_eq!(snapshot.state, JobState::Running);
    assert_eq!(snapshot.source_path.as_deref(), Some(h.source.path()));
    assert_eq!(h.events.count("stream_started"), 1);
}

#[tokio::test]
async fn empty_destinations_are_rejected_before_launch() {
    let h = Harness::new();
    let err = h
        .supervisor
        .start(BroadcastRequest::new(h.source.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, StreamError::InvalidInput(_)));
    assert_eq!(h.backend.launches(), 0);
    assert_eq!(h.supervisor.registered(), 0);
    assert!(h.supervisor.list().await.is_empty());
}

#[tokio::test]
async fn missing_or_non_file_source_is_invalid_input() {
    let h = Harness::new();
    let dir = tempfile::tempdir().unwrap();

    let missing = BroadcastRequest::new(dir.path().join("nope.mp4"))
        .with_destination(Destination::youtube("k"));
    assert!(matches!(
        h.supervisor.start(missing).await,
        Err(StreamError::InvalidInput(_))
    ));

    let directory = BroadcastRequest::new(dir.path()).with_destination(Destination::youtube("k"));
    assert!(matches!(
        h.supervisor.start(directory).await,
        Err(StreamError::InvalidInput(_))
    ));
    assert_eq!(h.backend.launches(), 0);
}

#[tokio::test]
async fn launch_failure_leaves_no_entry() {
    let h = Harness::new();
    h.backend.state.fail_launch.store(true, Ordering::SeqCst);

    let err = h.supervisor.start(h.request()).await.unwrap_err();
    assert!(matches!(err, StreamError::Spawn(_)));
    assert_eq!(h.supervisor.registered(), 0);
    assert!(h.supervisor.list().await.is_empty());
}

#[tokio::test]
async fn stop_of_unknown_stream_is_already_stopped() {
    let h = Harness::new();
    let outcome = h
        .supervisor
        .stop(&StreamId::parse("stream_unknown").unwrap())
        .await;
    assert_eq!(outcome, StopOutcome::AlreadyStopped);
    assert_eq!(h.backend.terminations(), 0);
}

#[tokio::test]
async fn second_stop_is_idempotent() {
    let h = Harness::new();
    h.backend.state.ignore_terminate.store(true, Ordering::SeqCst);
    let id = h.supervisor.start(h.request()).await.unwrap();

    assert_eq!(h.supervisor.stop(&id).await, StopOutcome::Stopping);
    assert_eq!(h.supervisor.stop(&id).await, StopOutcome::AlreadyStopped);
    assert_eq!(h.backend.terminations(), 1);
    assert_eq!(h.supervisor.get(&id).unwrap().state, JobState::Stopping);
}

#[tokio::test]
async fn stop_then_exit_removes_stream() {
    let h = Harness::new();
    let id = h.supervisor.start(h.request()).await.unwrap();
    assert_eq!(h.supervisor.list().await, vec![id.clone()]);

    assert_eq!(h.supervisor.stop(&id).await, StopOutcome::Stopping);
    h.supervisor.wait_terminated(&id).await;

    assert!(h.supervisor.list().await.is_empty());
    assert!(h.supervisor.get(&id).is_none());
    assert_eq!(h.supervisor.stop(&id).await, StopOutcome::AlreadyStopped);
    assert!(eventually(|| h.events.count("stream_stopped") == 1).await);
    assert_eq!(h.events.count("stream_exited"), 0);
}

#[tokio::test]
async fn crash_removes_stream_exactly_once() {
    let h = Harness::new();
    let id = h.supervisor.start(h.request()).await.unwrap();

    assert!(h.backend.crash(&id, 1));
    h.supervisor.wait_terminated(&id).await;
    assert!(h.supervisor.list().await.is_empty());

    // A late stop and a reconciliation pass must not finalize it again.
    assert_eq!(h.supervisor.stop(&id).await, StopOutcome::AlreadyStopped);
    h.supervisor.reconcile().await;
    h.supervisor.reconcile().await;

    assert!(eventually(|| h.events.count("stream_exited") == 1).await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    let exits: Vec<StreamEvent> = h
        .events
        .events()
        .into_iter()
        .filter(|e| matches!(e, StreamEvent::StreamExited { .. } | StreamEvent::StreamStopped { .. }))
        .collect();
    assert_eq!(exits.len(), 1);
    match &exits[0] {
        StreamEvent::StreamExited { exit, .. } => {
            assert_eq!(exit.reason, ExitReason::Exited);
            assert_eq!(exit.code, Some(1));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_get_distinct_ids() {
    let h = Arc::new(Harness::new());
    let mut tasks = Vec::with_capacity(1_000);
    for _ in 0..1_000 {
        let h = Arc::clone(&h);
        tasks.push(tokio::spawn(async move {
            h.supervisor.start(h.request()).await
        }));
    }

    let mut ids = HashSet::new();
    for task in tasks {
        ids.insert(task.await.unwrap().unwrap());
    }
    assert_eq!(ids.len(), 1_000);
    assert_eq!(h.supervisor.registered(), 1_000);
    assert_eq!(h.supervisor.list().await.len(), 1_000);
}

#[tokio::test]
async fn list_excludes_streams_being_stopped() {
    let h = Harness::new();
    h.backend.state.ignore_terminate.store(true, Ordering::SeqCst);
    let a = h.supervisor.start(h.request()).await.unwrap();
    let b = h.supervisor.start(h.request()).await.unwrap();

    h.supervisor.stop(&a).await;
    assert!(h.backend.is_live(&a));
    assert_eq!(h.supervisor.list().await, vec![b]);
}

#[tokio::test]
async fn list_is_sorted_and_includes_untracked_live_jobs() {
    let h = Harness::new();
    let orphan = StreamId::parse("stream_0000_orphan").unwrap();
    h.backend.plant_orphan(orphan.clone());
    let started = h.supervisor.start(h.request()).await.unwrap();

    let listed = h.supervisor.list().await;
    let mut expected = vec![orphan, started];
    expected.sort();
    assert_eq!(listed, expected);
}

#[tokio::test]
async fn list_falls_back_to_registry_when_backend_fails() {
    let h = Harness::new();
    let id = h.supervisor.start(h.request()).await.unwrap();
    h.backend.state.fail_listing.store(true, Ordering::SeqCst);

    assert_eq!(h.supervisor.list().await, vec![id]);
}

#[tokio::test]
async fn stop_during_launch_waits_for_launch() {
    let h = Arc::new(Harness::new());
    *h.backend.state.launch_delay.lock().unwrap() = Duration::from_millis(100);

    let starter = {
        let h = Arc::clone(&h);
        tokio::spawn(async move { h.supervisor.start(h.request()).await })
    };
    assert!(eventually(|| h.supervisor.registered() == 1).await);
    let id = h.supervisor.snapshots()[0].id.clone();
    assert_eq!(h.supervisor.get(&id).unwrap().state, JobState::Starting);
    assert_eq!(h.supervisor.list().await, vec![id.clone()]);

    assert_eq!(h.supervisor.stop(&id).await, StopOutcome::Stopping);
    assert_eq!(starter.await.unwrap().unwrap(), id);
    h.supervisor.wait_terminated(&id).await;
    assert!(h.supervisor.list().await.is_empty());
}

#[tokio::test]
async fn stop_during_failing_launch_finds_nothing() {
    let h = Arc::new(Harness::new());
    *h.backend.state.launch_delay.lock().unwrap() = Duration::from_millis(100);
    h.backend.state.fail_launch.store(true, Ordering::SeqCst);

    let starter = {
        let h = Arc::clone(&h);
        tokio::spawn(async move { h.supervisor.start(h.request()).await })
    };
    assert!(eventually(|| h.supervisor.registered() == 1).await);
    let id = h.supervisor.snapshots()[0].id.clone();

    assert_eq!(h.supervisor.stop(&id).await, StopOutcome::AlreadyStopped);
    assert!(matches!(
        starter.await.unwrap(),
        Err(StreamError::Spawn(_))
    ));
    assert_eq!(h.events.count("stream_stopping"), 0);
    assert_eq!(h.supervisor.registered(), 0);
}

#[tokio::test]
async fn reconcile_retires_vanished_job_after_two_passes() {
    let h = Harness::new();
    let id = h.supervisor.start(h.request()).await.unwrap();
    h.backend.vanish(&id);

    let first = h.supervisor.reconcile().await;
    assert!(first.retired.is_empty());
    assert_eq!(h.supervisor.get(&id).unwrap().state, JobState::Running);

    let second = h.supervisor.reconcile().await;
    assert_eq!(second.retired, vec![id.clone()]);
    assert!(h.supervisor.get(&id).is_none());
    assert!(h.supervisor.list().await.is_empty());

    let events = h.events.events();
    assert!(events.iter().any(|e| matches!(
        e,
        StreamEvent::StreamExited { exit, .. } if exit.reason == ExitReason::Vanished
    )));
}

#[tokio::test]
async fn reconcile_resets_miss_counter_when_job_reappears() {
    let h = Harness::new();
    let id = h.supervisor.start(h.request()).await.unwrap();

    h.backend.vanish(&id);
    h.supervisor.reconcile().await;
    h.backend.plant_orphan(id.clone());
    h.supervisor.reconcile().await;
    h.backend.vanish(&id);
    let report = h.supervisor.reconcile().await;

    assert!(report.retired.is_empty());
    assert!(h.supervisor.get(&id).is_some());
}

#[tokio::test]
async fn reconcile_reissues_terminate_for_stuck_stop() {
    let h = Harness::with_stop_timeout(Duration::ZERO);
    h.backend.state.ignore_terminate.store(true, Ordering::SeqCst);
    let id = h.supervisor.start(h.request()).await.unwrap();
    h.supervisor.stop(&id).await;
    assert_eq!(h.backend.terminations(), 1);

    let report = h.supervisor.reconcile().await;
    assert_eq!(report.reissued, vec![id.clone()]);
    assert_eq!(h.backend.terminations(), 2);

    h.backend.state.ignore_terminate.store(false, Ordering::SeqCst);
    h.supervisor.reconcile().await;
    h.supervisor.wait_terminated(&id).await;
    assert!(h.supervisor.get(&id).is_none());
}

#[tokio::test]
async fn reconcile_adopts_orphans_so_they_can_be_stopped() {
    let h = Harness::new();
    let orphan = StreamId::parse("stream_left_behind").unwrap();
    h.backend.plant_orphan(orphan.clone());

    let report = h.supervisor.reconcile().await;
    assert_eq!(report.adopted, vec![orphan.clone()]);
    let snapshot = h.supervisor.get(&orphan).unwrap();
    assert!(snapshot.adopted);
    assert_eq!(snapshot.state, JobState::Running);
    assert!(snapshot.source_path.is_none());

    assert_eq!(h.supervisor.stop(&orphan).await, StopOutcome::Stopping);
    h.supervisor.wait_terminated(&orphan).await;
    assert!(!h.backend.is_live(&orphan));
    assert!(h.supervisor.list().await.is_empty());
}

#[tokio::test]
async fn reconcile_skips_pass_when_listing_fails() {
    let h = Harness::new();
    let id = h.supervisor.start(h.request()).await.unwrap();
    h.backend.vanish(&id);
    h.backend.state.fail_listing.store(true, Ordering::SeqCst);

    for _ in 0..3 {
        assert!(h.supervisor.reconcile().await.skipped);
    }
    assert!(h.supervisor.get(&id).is_some());
}

#[tokio::test]
async fn stop_all_stops_every_stream() {
    let h = Harness::new();
    let a = h.supervisor.start(h.request()).await.unwrap();
    let b = h.supervisor.start(h.request()).await.unwrap();

    assert_eq!(h.supervisor.stop_all().await, 2);
    h.supervisor.wait_terminated(&a).await;
    h.supervisor.wait_terminated(&b).await;
    assert_eq!(h.supervisor.registered(), 0);
}

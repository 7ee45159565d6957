// Integration tests for the snapshot lifecycle
// create / get / list / latest / restore round-trips on both SQLite dialects

mod common;

use common::*;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use stellar_core::errors::ExErrorKind;
use stellar_core::model::storage_location;

#[test]
fn test_create_returns_not_ready_record() {
    // Given: An engine whose worker is held before copying
    let fx = fixture("sqlite", 3);
    let gate = Gate::default();

    // When: We create v1 and read it back immediately
    let created = fx.engine.create("v1", Some(gate.observer())).unwrap();
    let fetched = fx.engine.get("v1").unwrap();

    // Then: It is not ready and its location derives from the name
    assert!(!created.ready);
    assert!(!fetched.ready);
    assert_eq!(fetched.storage_location, storage_location("v1", PROJECT));
    assert!(fx.engine.is_worker_alive(&fetched));

    gate.open();
    let ready = wait_until_ready(&fx.engine, "v1");
    assert_eq!(ready.worker_handle, None);
    assert!(!fx.engine.is_worker_alive(&ready));
}

#[test]
fn test_restore_three_rows_scenario() {
    for dialect in ["sqlite", "sqlite+rowcopy"] {
        // Given: users has 3 rows and v1 reached ready
        let fx = fixture(dialect, 3);
        fx.engine.create("v1", None).unwrap();
        wait_until_ready(&fx.engine, "v1");

        // When: A fourth row is added and v1 restored
        insert_user(&fx.db_path(), "intruder");
        assert_eq!(user_names(&fx.db_path()).len(), 4);
        let v1 = fx.engine.get("v1").unwrap();
        fx.engine.restore(&v1, Default::default()).unwrap();

        // Then: Exactly the original 3 rows remain
        assert_eq!(
            user_names(&fx.db_path()),
            vec!["user-0", "user-1", "user-2"],
            "dialect {}",
            dialect
        );
    }
}

#[test]
fn test_restore_twice_from_same_snapshot() {
    let fx = fixture("sqlite+rowcopy", 2);
    fx.engine.create("base", None).unwrap();
    let base = wait_until_ready(&fx.engine, "base");

    for round in 0..2 {
        insert_user(&fx.db_path(), &format!("round-{}", round));
        fx.engine.restore(&base, Default::default()).unwrap();
        assert_eq!(user_names(&fx.db_path()).len(), 2);
    }
}

#[test]
fn test_restore_waits_for_running_worker() {
    // Given: A worker held at the gate
    let fx = fixture("sqlite", 3);
    let gate = Gate::default();
    let v1 = fx.engine.create("v1", Some(gate.observer())).unwrap();

    // When: restore polls, and the gate opens on the first wait
    let waits = Mutex::new(0);
    let on_wait = |snapshot: &stellar_core::Snapshot| {
        assert!(!snapshot.ready);
        *waits.lock().unwrap() += 1;
        gate.open();
    };
    let options = stellar_engine::RestoreOptions {
        poll_interval: std::time::Duration::from_millis(10),
        on_wait: Some(&on_wait),
        ..Default::default()
    };
    fx.engine.restore(&v1, options).unwrap();

    // Then: restore waited at least once and used the worker's copy
    assert!(*waits.lock().unwrap() >= 1);
    assert!(fx.engine.get("v1").unwrap().ready);
    assert_eq!(user_names(&fx.db_path()).len(), 3);
}

#[test]
fn test_duplicate_create_is_name_collision() {
    let fx = fixture("sqlite", 1);
    fx.engine.create("v1", None).unwrap();

    let err = fx.engine.create("v1", None).unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::NameCollision);
    assert_eq!(err.snapshot_name(), Some("v1"));
    let names: Vec<_> = fx
        .engine
        .list()
        .unwrap()
        .into_iter()
        .map(|s| s.snapshot_name)
        .collect();
    assert_eq!(names, vec!["v1"]);
    wait_for_idle(&fx.launcher);
}

#[test]
fn test_concurrent_creators_exactly_one_wins() {
    let fx = Arc::new(fixture("sqlite", 1));
    let barrier = Arc::new(Barrier::new(6));

    let racers: Vec<_> = (0..6)
        .map(|_| {
            let fx = Arc::clone(&fx);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                fx.engine.create("race", None).map(|_| ())
            })
        })
        .collect();
    let results: Vec<_> = racers.into_iter().map(|r| r.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| e.kind() == ExErrorKind::NameCollision));
    assert_eq!(fx.engine.list().unwrap().len(), 1);
    wait_for_idle(&fx.launcher);
}

#[test]
fn test_latest_without_snapshots_is_not_found() {
    let fx = fixture("sqlite", 0);
    let err = fx.engine.latest().unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
}

#[test]
fn test_latest_and_list_follow_creation_order() {
    let fx = fixture("sqlite", 1);
    for name in ["a", "b", "c"] {
        fx.engine.create(name, None).unwrap();
    }

    let listed: Vec<_> = fx
        .engine
        .list()
        .unwrap()
        .into_iter()
        .map(|s| s.snapshot_name)
        .collect();
    assert_eq!(listed, vec!["a", "b", "c"]);
    assert_eq!(fx.engine.latest().unwrap().snapshot_name, "c");
    wait_for_idle(&fx.launcher);
}

#[test]
fn test_invalid_name_rejected_before_insert() {
    let fx = fixture("sqlite", 1);
    let err = fx.engine.create("", None).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    assert!(fx.engine.list().unwrap().is_empty());
}

#[test]
fn test_before_copy_sees_each_database() {
    let fx = fixture("sqlite", 1);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    fx.engine
        .create(
            "observed",
            Some(Arc::new(move |db: &str| sink.lock().unwrap().push(db.to_string()))),
        )
        .unwrap();
    wait_until_ready(&fx.engine, "observed");
    wait_for_idle(&fx.launcher);

    assert_eq!(*seen.lock().unwrap(), vec!["app.db"]);
}

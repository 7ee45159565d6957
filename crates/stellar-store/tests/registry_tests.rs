// Integration tests for the snapshot registry
// Covers collision, ordering, tie-break and rename atomicity

use rusqlite::Connection;
use std::sync::{Arc, Barrier};
use std::thread;
use stellar_core::errors::ExErrorKind;
use stellar_core::model::storage_location;
use stellar_core::WorkerHandle;
use stellar_store::{SnapshotRegistry, SnapshotStorage};
use tempfile::TempDir;

fn setup() -> (TempDir, SnapshotStorage, SnapshotRegistry) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let storage = SnapshotStorage::new(temp_dir.path().join("store"));
    storage.ensure_root().unwrap();
    let registry = SnapshotRegistry::open(storage.registry_path(), "myapp").unwrap();
    (temp_dir, storage, registry)
}

#[test]
fn test_duplicate_insert_is_name_collision() {
    // Given: A registry with snapshot v1
    let (_tmp, _storage, registry) = setup();
    registry.insert("v1").unwrap();

    // When: We insert v1 again
    let err = registry.insert("v1").unwrap_err();

    // Then: It fails with NameCollision and exactly one record exists
    assert_eq!(err.kind(), ExErrorKind::NameCollision);
    assert_eq!(registry.list().unwrap().len(), 1);
}

#[test]
fn test_concurrent_inserts_exactly_one_wins() {
    // Given: Eight threads racing to create the same name
    let (_tmp, _storage, registry) = setup();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.insert("race")
            })
        })
        .collect();

    // When: They all finish
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // Then: One succeeded, the rest collided
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind(), ExErrorKind::NameCollision);
    }
    assert_eq!(registry.list().unwrap().len(), 1);
}

#[test]
fn test_latest_on_empty_registry_is_not_found() {
    let (_tmp, _storage, registry) = setup();
    let err = registry.latest().unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
}

#[test]
fn test_created_at_is_monotonic() {
    // Given: Several snapshots inserted in sequence
    let (_tmp, _storage, registry) = setup();
    for name in ["a", "b", "c", "d"] {
        registry.insert(name).unwrap();
    }

    // Then: list is in insertion order with non-decreasing timestamps
    let listed = registry.list().unwrap();
    let names: Vec<_> = listed.iter().map(|s| s.snapshot_name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c", "d"]);
    assert!(listed.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    assert_eq!(registry.latest().unwrap().snapshot_name, "d");
}

#[test]
fn test_created_at_survives_clock_going_backwards() {
    // Given: A record stamped far in the future
    let (_tmp, storage, registry) = setup();
    registry.insert("future").unwrap();
    let future_ms = chrono::Utc::now().timestamp_millis() + 3_600_000;
    let conn = Connection::open(storage.registry_path()).unwrap();
    conn.execute(
        "UPDATE snapshots SET created_at = ?1 WHERE snapshot_name = 'future'",
        [future_ms],
    )
    .unwrap();

    // When: Another snapshot is inserted now
    let next = registry.insert("next").unwrap();

    // Then: It is not stamped earlier than the future record
    assert_eq!(next.created_at.timestamp_millis(), future_ms);
}

#[test]
fn test_latest_tie_goes_to_earliest_insert() {
    // Given: Three snapshots forced to share one timestamp
    let (_tmp, storage, registry) = setup();
    for name in ["first", "second", "third"] {
        registry.insert(name).unwrap();
    }
    let conn = Connection::open(storage.registry_path()).unwrap();
    conn.execute("UPDATE snapshots SET created_at = 1000", [])
        .unwrap();

    // Then: latest resolves to the earliest inserted
    assert_eq!(registry.latest().unwrap().snapshot_name, "first");
}

#[test]
fn test_rename_moves_record_and_storage() {
    // Given: v1 with materialized storage
    let (_tmp, storage, registry) = setup();
    let original = registry.insert("v1").unwrap();
    let dir = storage.prepare(&original.storage_location).unwrap();
    std::fs::write(dir.join("app.db"), b"data").unwrap();

    // When: It is renamed to v2
    registry.rename("v1", "v2", &storage).unwrap();

    // Then: v1 is gone, v2 keeps created_at and data
    assert!(registry.get("v1").unwrap_err().is_not_found());
    let renamed = registry.get("v2").unwrap();
    assert_eq!(renamed.created_at, original.created_at);
    assert_eq!(renamed.storage_location, storage_location("v2", "myapp"));
    assert!(!storage.exists(&original.storage_location));
    let moved = storage
        .location_path(&renamed.storage_location)
        .unwrap()
        .join("app.db");
    assert_eq!(std::fs::read(moved).unwrap(), b"data");
}

#[test]
fn test_rename_onto_existing_name_changes_nothing() {
    // Given: v1 and v2 both registered
    let (_tmp, storage, registry) = setup();
    let v1 = registry.insert("v1").unwrap();
    storage.prepare(&v1.storage_location).unwrap();
    registry.insert("v2").unwrap();

    // When: v1 is renamed onto v2
    let err = registry.rename("v1", "v2", &storage).unwrap_err();

    // Then: NameCollision, and both still resolve as before
    assert_eq!(err.kind(), ExErrorKind::NameCollision);
    assert_eq!(registry.get("v1").unwrap(), v1);
    assert!(registry.get("v2").is_ok());
    assert!(storage.exists(&v1.storage_location));
}

#[test]
fn test_rename_onto_orphan_directory_rolls_back() {
    // Given: An unregistered directory at v2's location
    let (_tmp, storage, registry) = setup();
    let v1 = registry.insert("v1").unwrap();
    storage.prepare(&v1.storage_location).unwrap();
    storage.prepare(&storage_location("v2", "myapp")).unwrap();

    // When: v1 is renamed to v2
    let err = registry.rename("v1", "v2", &storage).unwrap_err();

    // Then: The row update rolled back
    assert_eq!(err.kind(), ExErrorKind::StorageInconsistency);
    assert_eq!(registry.get("v1").unwrap(), v1);
    assert!(registry.get("v2").unwrap_err().is_not_found());
}

#[test]
fn test_rename_missing_is_not_found() {
    let (_tmp, storage, registry) = setup();
    let err = registry.rename("ghost", "v2", &storage).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
}

#[test]
fn test_rename_to_same_name_is_collision() {
    let (_tmp, storage, registry) = setup();
    registry.insert("v1").unwrap();
    let err = registry.rename("v1", "v1", &storage).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NameCollision);
}

#[test]
fn test_mark_ready_is_idempotent_and_clears_handle() {
    let (_tmp, _storage, registry) = setup();
    registry.insert("v1").unwrap();
    let owner = WorkerHandle::Process(4242);
    assert!(registry.claim_worker("v1", &owner).unwrap());

    assert!(registry.mark_ready("v1", &owner).unwrap());
    assert!(!registry.mark_ready("v1", &owner).unwrap());

    let snapshot = registry.get("v1").unwrap();
    assert!(snapshot.ready);
    assert_eq!(snapshot.worker_handle, None);
}

#[test]
fn test_stale_owner_cannot_mark_recreated_snapshot_ready() {
    // Given: v1 claimed by a worker, then removed and created again
    let (_tmp, _storage, registry) = setup();
    registry.insert("v1").unwrap();
    let stale = WorkerHandle::new_task();
    registry.claim_worker("v1", &stale).unwrap();
    registry.delete("v1").unwrap();
    registry.insert("v1").unwrap();
    let current = WorkerHandle::new_task();
    registry.claim_worker("v1", &current).unwrap();

    // When: The stale worker finishes first
    let marked = registry.mark_ready("v1", &stale).unwrap();

    // Then: The new record is untouched and still owned by its own worker
    assert!(!marked);
    let snapshot = registry.get("v1").unwrap();
    assert!(!snapshot.ready);
    assert_eq!(snapshot.worker_handle, Some(current.clone()));
    assert!(registry.mark_ready("v1", &current).unwrap());
}

#[test]
fn test_delete_then_delete_is_not_found() {
    let (_tmp, _storage, registry) = setup();
    registry.insert("v1").unwrap();
    registry.delete("v1").unwrap();
    assert!(registry.delete("v1").unwrap_err().is_not_found());
}

#[test]
fn test_locked_locations_span_all_projects() {
    // Given: Two projects sharing one registry file
    let (_tmp, storage, registry) = setup();
    let other = SnapshotRegistry::open(storage.registry_path(), "other").unwrap();
    let mine = registry.insert("v1").unwrap();
    let theirs = other.insert("v1").unwrap();

    // When: We read the referenced locations under the lock
    let locations = registry
        .locked_storage_locations(|set| Ok(set.clone()))
        .unwrap();

    // Then: Both projects' locations are present
    assert!(locations.contains(&mine.storage_location));
    assert!(locations.contains(&theirs.storage_location));
    assert_ne!(mine.storage_location, theirs.storage_location);
}

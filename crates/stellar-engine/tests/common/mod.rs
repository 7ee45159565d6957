// Shared fixtures for engine integration tests
#![allow(dead_code)]

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use stellar_core::{CopyObserver, Project, Snapshot};
use stellar_engine::{SnapshotEngine, ThreadLauncher};
use tempfile::TempDir;

pub const PROJECT: &str = "myapp";

pub struct Fixture {
    pub dir: TempDir,
    pub launcher: ThreadLauncher,
    pub engine: SnapshotEngine,
}

impl Fixture {
    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("data").join("app.db")
    }
}

pub fn project(root: &Path, dialect: &str) -> Project {
    let yaml = format!(
        "project_name: {}\ntracked_databases: ['app.db']\nurl: '{}://data'\nstorage_url: 'sqlite://.stellar'\n",
        PROJECT, dialect
    );
    Project::from_yaml_str(&yaml, root).expect("valid test project")
}

/// Engine over a fresh directory whose `users` table has `rows` rows
pub fn fixture(dialect: &str, rows: usize) -> Fixture {
    let dir = TempDir::new().expect("Failed to create temp directory");
    std::fs::create_dir_all(dir.path().join("data")).unwrap();
    seed_users(&dir.path().join("data").join("app.db"), rows);

    let launcher = ThreadLauncher::new();
    let engine =
        SnapshotEngine::with_defaults(project(dir.path(), dialect), Arc::new(launcher.clone()))
            .expect("engine opens");
    Fixture {
        dir,
        launcher,
        engine,
    }
}

pub fn seed_users(path: &Path, rows: usize) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL);",
    )
    .unwrap();
    for i in 0..rows {
        conn.execute("INSERT INTO users (name) VALUES (?1)", [format!("user-{}", i)])
            .unwrap();
    }
}

pub fn insert_user(path: &Path, name: &str) {
    let conn = Connection::open(path).unwrap();
    conn.execute("INSERT INTO users (name) VALUES (?1)", [name])
        .unwrap();
}

pub fn user_names(path: &Path) -> Vec<String> {
    let conn = Connection::open(path).unwrap();
    let mut stmt = conn.prepare("SELECT name FROM users ORDER BY id").unwrap();
    let names = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap();
    names
}

/// Poll until `name` is ready; panics after ten seconds
pub fn wait_until_ready(engine: &SnapshotEngine, name: &str) -> Snapshot {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let snapshot = engine.get(name).unwrap();
        if snapshot.ready {
            return snapshot;
        }
        assert!(Instant::now() < deadline, "snapshot {} never became ready", name);
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// Poll until no worker thread is running; panics after ten seconds
pub fn wait_for_idle(launcher: &ThreadLauncher) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while launcher.running() > 0 {
        assert!(Instant::now() < deadline, "workers never finished");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[derive(Default)]
struct GateState {
    open: bool,
    arrived: usize,
}

/// Holds a worker inside its `before_copy` observer until opened
#[derive(Clone, Default)]
pub struct Gate(Arc<(Mutex<GateState>, Condvar)>);

impl Gate {
    pub fn open(&self) {
        let (lock, cvar) = &*self.0;
        lock.lock().unwrap().open = true;
        cvar.notify_all();
    }

    pub fn wait(&self) {
        let (lock, cvar) = &*self.0;
        let mut state = lock.lock().unwrap();
        state.arrived += 1;
        cvar.notify_all();
        let _open = cvar
            .wait_timeout_while(state, Duration::from_secs(30), |state| !state.open)
            .unwrap();
    }

    /// Block until a worker is parked at the gate; panics after ten seconds
    pub fn wait_for_arrival(&self) {
        let (lock, cvar) = &*self.0;
        let state = lock.lock().unwrap();
        let (state, _) = cvar
            .wait_timeout_while(state, Duration::from_secs(10), |state| state.arrived == 0)
            .unwrap();
        assert!(state.arrived > 0, "no worker reached the gate");
    }

    pub fn observer(&self) -> Arc<CopyObserver<'static>> {
        let gate = self.clone();
        Arc::new(move |_database: &str| gate.wait())
    }
}

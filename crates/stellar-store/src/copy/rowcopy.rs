//! Definition copy plus bulk row transfer for SQLite.

use super::{copy_error, path_str, quote_ident, remove_leftover, require_live_database, require_snapshot_file};
use crate::db::BUSY_TIMEOUT;
use crate::errors::Result;
use rusqlite::{Connection, TransactionBehavior};
use std::path::Path;
use stellar_core::copy_strategy::CopyStrategy;
use stellar_core::model::TrackedDatabase;

const ATTACHED: &str = "peer";

/// Copies a database by replaying its schema and moving rows table by table.
///
/// The peer database is attached to the connection, so both directions run as
/// a single SQLite transaction: forward copies read one consistent view of the
/// source, and restores replace the live contents in one commit.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteRowCopyStrategy;

impl CopyStrategy for SqliteRowCopyStrategy {
    fn name(&self) -> &'static str {
        "sqlite-rowcopy"
    }

    fn copy_forward(&self, source: &TrackedDatabase, destination: &Path) -> Result<()> {
        let op = "copy_forward";
        require_live_database(op, source)?;
        remove_leftover(destination)?;
        let source_path = path_str(op, &source.path)?;

        let mut conn = open(destination).map_err(|e| copy_error(op, &source.name, e))?;
        let tables = transfer(&mut conn, source_path, TransactionBehavior::Deferred, false)
            .map_err(|e| copy_error(op, &source.name, e))?;

        tracing::debug!(database = %source.name, tables, "Copied database rows");
        Ok(())
    }

    fn copy_backward(&self, source: &Path, destination: &TrackedDatabase) -> Result<()> {
        let op = "copy_backward";
        require_snapshot_file(op, source)?;
        let source_path = path_str(op, source)?;

        let mut conn = open(&destination.path).map_err(|e| copy_error(op, &destination.name, e))?;
        let tables = transfer(&mut conn, source_path, TransactionBehavior::Immediate, true)
            .map_err(|e| copy_error(op, &destination.name, e))?;

        tracing::debug!(database = %destination.name, tables, "Restored database rows");
        Ok(())
    }
}

fn open(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    // Rows are inserted table by table, so references may point forward.
    conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
    Ok(conn)
}

/// Copy schema and rows of the database at `peer_path` into `main`.
///
/// With `replace` set, every table and view already in `main` is dropped
/// first, inside the same transaction.
fn transfer(
    conn: &mut Connection,
    peer_path: &str,
    behavior: TransactionBehavior,
    replace: bool,
) -> rusqlite::Result<usize> {
    conn.execute("ATTACH DATABASE ?1 AS peer", [peer_path])?;
    let copied = copy_attached(conn, behavior, replace);
    conn.execute_batch("DETACH DATABASE peer;")?;
    copied
}

fn copy_attached(
    conn: &mut Connection,
    behavior: TransactionBehavior,
    replace: bool,
) -> rusqlite::Result<usize> {
    let tx = conn.transaction_with_behavior(behavior)?;
    if replace {
        drop_all(&tx)?;
    }
    let tables = copy_objects(&tx)?;
    copy_sequences(&tx)?;
    tx.commit()?;
    Ok(tables)
}

struct SchemaObject {
    kind: String,
    name: String,
    sql: String,
}

/// User objects of `schema`, tables first, in creation order
fn schema_objects(conn: &Connection, schema: &str) -> rusqlite::Result<Vec<SchemaObject>> {
    let sql = format!(
        "SELECT type, name, sql FROM {}.sqlite_master
         WHERE sql IS NOT NULL AND substr(name, 1, 7) != 'sqlite_'
         ORDER BY CASE type WHEN 'table' THEN 0 WHEN 'index' THEN 1 WHEN 'view' THEN 2 ELSE 3 END,
                  rowid",
        schema
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok(SchemaObject {
            kind: row.get(0)?,
            name: row.get(1)?,
            sql: row.get(2)?,
        })
    })?;
    rows.collect()
}

fn drop_all(conn: &Connection) -> rusqlite::Result<()> {
    let existing = schema_objects(conn, "main")?;
    for object in existing.iter().filter(|o| o.kind == "view") {
        conn.execute_batch(&format!("DROP VIEW IF EXISTS main.{};", quote_ident(&object.name)))?;
    }
    // Indexes and triggers go with their tables.
    for object in existing.iter().filter(|o| o.kind == "table") {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS main.{};", quote_ident(&object.name)))?;
    }
    Ok(())
}

fn copy_objects(conn: &Connection) -> rusqlite::Result<usize> {
    let mut tables = 0;
    for object in schema_objects(conn, ATTACHED)? {
        conn.execute_batch(&object.sql)?;
        if object.kind == "table" {
            let name = quote_ident(&object.name);
            conn.execute_batch(&format!(
                "INSERT INTO main.{name} SELECT * FROM {ATTACHED}.{name};"
            ))?;
            tables += 1;
        }
    }
    Ok(tables)
}

fn has_sequence_table(conn: &Connection, schema: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM {}.sqlite_master WHERE name = 'sqlite_sequence'",
            schema
        ),
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Carry AUTOINCREMENT counters so restored tables keep allocating new ids
fn copy_sequences(conn: &Connection) -> rusqlite::Result<()> {
    if !has_sequence_table(conn, ATTACHED)? || !has_sequence_table(conn, "main")? {
        return Ok(());
    }
    conn.execute_batch(&format!(
        "DELETE FROM main.sqlite_sequence;
         INSERT INTO main.sqlite_sequence (name, seq) SELECT name, seq FROM {ATTACHED}.sqlite_sequence;"
    ))
}

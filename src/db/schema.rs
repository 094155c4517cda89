// src/db/schema.rs

//! Database schema definitions and migrations for Deskforge
//!
//! This module defines the SQLite schema for the state store and provides
//! a migration system to evolve the schema over time.

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?;

    Ok(version)
}

/// Set the schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        debug!("Schema is up to date");
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!("Schema migration complete. Now at version {}", SCHEMA_VERSION);
    Ok(())
}

/// Apply a specific migration version
fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        _ => Err(Error::InitError(format!("Unknown migration version: {}", version))),
    }
}

/// Initial schema - Version 1
///
/// - runs: one row per mutating invocation
/// - operations: one outcome per (item, invocation)
/// - backups: archive index, one row per archive written
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            mode TEXT NOT NULL CHECK(mode IN ('install', 'verify', 'uninstall')),
            started_at TEXT NOT NULL,
            pid INTEGER NOT NULL
        );

        CREATE INDEX idx_runs_started_at ON runs(started_at);

        CREATE TABLE operations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id INTEGER,
            group_name TEXT NOT NULL,
            backend TEXT NOT NULL CHECK(backend IN ('primary', 'secondary')),
            identifier TEXT NOT NULL,
            display_name TEXT NOT NULL,
            critical INTEGER NOT NULL DEFAULT 0,
            direction TEXT NOT NULL CHECK(direction IN ('present', 'absent')),
            outcome TEXT NOT NULL CHECK(outcome IN ('applied', 'already_satisfied', 'failed', 'skipped')),
            recorded_at TEXT NOT NULL,
            detail TEXT NOT NULL DEFAULT '',
            FOREIGN KEY (run_id) REFERENCES runs(id)
        );

        CREATE INDEX idx_operations_run_id ON operations(run_id);
        CREATE INDEX idx_operations_item ON operations(backend, identifier);

        CREATE TABLE backups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id INTEGER,
            group_name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            archive_path TEXT NOT NULL UNIQUE,
            source_paths TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            sha256 TEXT NOT NULL,
            FOREIGN KEY (run_id) REFERENCES runs(id)
        );

        CREATE INDEX idx_backups_group ON backups(group_name, created_at);
        ",
    )?;

    info!("Schema version 1 created successfully");
    Ok(())
}

/// Schema Version 2: Enforce append-only history
///
/// Past records are a forensic log; rewriting or deleting them is refused
/// by the database itself.
fn migrate_v2(conn: &Connection) -> Result<()> {
    debug!("Migrating to schema version 2");

    conn.execute_batch(
        "
        CREATE TRIGGER operations_no_update BEFORE UPDATE ON operations
        BEGIN
            SELECT RAISE(ABORT, 'operations are append-only');
        END;

        CREATE TRIGGER operations_no_delete BEFORE DELETE ON operations
        BEGIN
            SELECT RAISE(ABORT, 'operations are append-only');
        END;

        CREATE TRIGGER backups_no_update BEFORE UPDATE ON backups
        BEGIN
            SELECT RAISE(ABORT, 'backups are append-only');
        END;

        CREATE TRIGGER backups_no_delete BEFORE DELETE ON backups
        BEGIN
            SELECT RAISE(ABORT, 'backups are append-only');
        END;
        ",
    )?;

    info!("Schema version 2 applied successfully");
    Ok(())
}

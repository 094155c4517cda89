// src/db/models.rs

//! Data models for Deskforge state records
//!
//! Every record type here is insert-only: there are no update or delete
//! methods, and the schema refuses them with triggers.

use crate::backends::BackendKind;
use crate::error::Result;
use crate::manifest::InstallItem;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;

/// Fixed-width RFC 3339 so stored timestamps sort lexically
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("Invalid timestamp {}: {}", raw, e))
}

/// Map a text-column parse failure into a rusqlite conversion error
fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

fn parse_column<T: FromStr<Err = String>>(row: &Row, column: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    raw.parse::<T>().map_err(|e| conversion_error(column, e))
}

fn timestamp_column(row: &Row, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    parse_timestamp(&raw).map_err(|e| conversion_error(column, e))
}

/// Which tool mode an invocation ran in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Install,
    Verify,
    Uninstall,
}

impl RunMode {
    pub fn as_str(&self) -> &str {
        match self {
            RunMode::Install => "install",
            RunMode::Verify => "verify",
            RunMode::Uninstall => "uninstall",
        }
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "install" => Ok(RunMode::Install),
            "verify" => Ok(RunMode::Verify),
            "uninstall" => Ok(RunMode::Uninstall),
            _ => Err(format!("Invalid run mode: {}", s)),
        }
    }
}

/// Desired state for a convergence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Present,
    Absent,
}

impl Direction {
    pub fn as_str(&self) -> &str {
        match self {
            Direction::Present => "present",
            Direction::Absent => "absent",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "present" => Ok(Direction::Present),
            "absent" => Ok(Direction::Absent),
            _ => Err(format!("Invalid direction: {}", s)),
        }
    }
}

/// What happened to one item in one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    AlreadySatisfied,
    Failed,
    Skipped,
}

impl Outcome {
    pub fn as_str(&self) -> &str {
        match self {
            Outcome::Applied => "applied",
            Outcome::AlreadySatisfied => "already_satisfied",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
        }
    }

    /// Applied and AlreadySatisfied both leave the item in the desired state
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Applied | Outcome::AlreadySatisfied)
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "applied" => Ok(Outcome::Applied),
            "already_satisfied" => Ok(Outcome::AlreadySatisfied),
            "failed" => Ok(Outcome::Failed),
            "skipped" => Ok(Outcome::Skipped),
            _ => Err(format!("Invalid outcome: {}", s)),
        }
    }
}

/// One mutating invocation of the tool
#[derive(Debug, Clone)]
pub struct Run {
    pub id: Option<i64>,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub pid: u32,
}

impl Run {
    pub fn new(mode: RunMode) -> Self {
        Self {
            id: None,
            mode,
            started_at: Utc::now(),
            pid: std::process::id(),
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO runs (mode, started_at, pid) VALUES (?1, ?2, ?3)",
            params![self.mode.as_str(), format_timestamp(&self.started_at), self.pid],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Most recent runs first
    pub fn list_recent(conn: &Connection, limit: usize) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, mode, started_at, pid FROM runs ORDER BY id DESC LIMIT ?1",
        )?;
        let runs = stmt
            .query_map([limit as i64], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            mode: parse_column(row, 1)?,
            started_at: timestamp_column(row, 2)?,
            pid: row.get(3)?,
        })
    }
}

/// Outcome of applying or removing one item
#[derive(Debug, Clone)]
pub struct OperationResult {
    pub id: Option<i64>,
    pub run_id: Option<i64>,
    pub group_name: String,
    pub item: InstallItem,
    pub direction: Direction,
    pub outcome: Outcome,
    pub timestamp: DateTime<Utc>,
    pub detail: String,
}

const OPERATION_COLUMNS: &str = "id, run_id, group_name, backend, identifier, display_name, critical, direction, outcome, recorded_at, detail";

impl OperationResult {
    pub fn new(
        group_name: &str,
        item: &InstallItem,
        direction: Direction,
        outcome: Outcome,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            run_id: None,
            group_name: group_name.to_string(),
            item: item.clone(),
            direction,
            outcome,
            timestamp: Utc::now(),
            detail: detail.into(),
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO operations (run_id, group_name, backend, identifier, display_name, critical, direction, outcome, recorded_at, detail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                &self.run_id,
                &self.group_name,
                self.item.backend.as_str(),
                &self.item.identifier,
                &self.item.display_name,
                self.item.critical,
                self.direction.as_str(),
                self.outcome.as_str(),
                format_timestamp(&self.timestamp),
                &self.detail,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Full history in insertion order
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM operations ORDER BY id",
            OPERATION_COLUMNS
        ))?;
        let results = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(results)
    }

    pub fn find_by_run(conn: &Connection, run_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM operations WHERE run_id = ?1 ORDER BY id",
            OPERATION_COLUMNS
        ))?;
        let results = stmt
            .query_map([run_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(results)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let backend: BackendKind = parse_column(row, 3)?;
        Ok(Self {
            id: Some(row.get(0)?),
            run_id: row.get(1)?,
            group_name: row.get(2)?,
            item: InstallItem {
                backend,
                identifier: row.get(4)?,
                display_name: row.get(5)?,
                critical: row.get(6)?,
            },
            direction: parse_column(row, 7)?,
            outcome: parse_column(row, 8)?,
            timestamp: timestamp_column(row, 9)?,
            detail: row.get(10)?,
        })
    }
}

/// Index entry for one backup archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub id: Option<i64>,
    pub run_id: Option<i64>,
    pub group_name: String,
    pub created_at: DateTime<Utc>,
    pub archive_path: PathBuf,
    pub source_paths: BTreeSet<PathBuf>,
    pub size_bytes: u64,
    pub sha256: String,
}

const BACKUP_COLUMNS: &str =
    "id, run_id, group_name, created_at, archive_path, source_paths, size_bytes, sha256";

impl BackupRecord {
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        let sources = serde_json::to_string(&self.source_paths)?;
        conn.execute(
            "INSERT INTO backups (run_id, group_name, created_at, archive_path, source_paths, size_bytes, sha256)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &self.run_id,
                &self.group_name,
                format_timestamp(&self.created_at),
                self.archive_path.to_string_lossy().into_owned(),
                sources,
                self.size_bytes as i64,
                &self.sha256,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Newest archive for a group, if any
    pub fn latest_for_group(conn: &Connection, group_name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM backups WHERE group_name = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
            BACKUP_COLUMNS
        ))?;
        let record = stmt.query_row([group_name], Self::from_row).optional()?;
        Ok(record)
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM backups ORDER BY created_at, id",
            BACKUP_COLUMNS
        ))?;
        let records = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let archive_path: String = row.get(4)?;
        let sources: String = row.get(5)?;
        let source_paths = serde_json::from_str(&sources)
            .map_err(|e| conversion_error(5, format!("Invalid source path list: {}", e)))?;
        let size_bytes: i64 = row.get(6)?;

        Ok(Self {
            id: Some(row.get(0)?),
            run_id: row.get(1)?,
            group_name: row.get(2)?,
            created_at: timestamp_column(row, 3)?,
            archive_path: PathBuf::from(archive_path),
            source_paths,
            size_bytes: size_bytes.max(0) as u64,
            sha256: row.get(7)?,
        })
    }
}

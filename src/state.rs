// src/state.rs

//! State Store
//!
//! Append-only facade over the state database. The engine is the only writer;
//! everything else reads. Each record is committed on its own so an interrupt
//! never loses an outcome that was already reported.

use crate::config::StatePaths;
use crate::db::{
    self,
    models::{BackupRecord, OperationResult, Run, RunMode},
};
use crate::error::Result;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct StateStore {
    conn: Connection,
    archive_dir: PathBuf,
    /// Declared but not yet written; inserted with the first record
    pending_run: Option<Run>,
    run_id: Option<i64>,
}

impl StateStore {
    /// Open the store under `paths`, creating and migrating it if needed
    pub fn open(paths: &StatePaths) -> Result<Self> {
        paths.create_dirs()?;
        db::init(&paths.db)?;
        let conn = db::open(&paths.db)?;

        Ok(Self {
            conn,
            archive_dir: paths.backups.clone(),
            pending_run: None,
            run_id: None,
        })
    }

    /// Open an existing store without creating anything; `None` when no
    /// run has ever been recorded under `paths`
    pub fn open_existing(paths: &StatePaths) -> Result<Option<Self>> {
        if !paths.db.exists() {
            return Ok(None);
        }
        let conn = db::open(&paths.db)?;

        Ok(Some(Self {
            conn,
            archive_dir: paths.backups.clone(),
            pending_run: None,
            run_id: None,
        }))
    }

    /// Directory backup archives are written to
    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Start a new invocation; later records reference it
    ///
    /// The run row is only written together with the first record, so an
    /// invocation that ends up changing nothing leaves no trace.
    pub fn begin_run(&mut self, mode: RunMode) {
        self.pending_run = Some(Run::new(mode));
        self.run_id = None;
    }

    pub fn run_id(&self) -> Option<i64> {
        self.run_id
    }

    fn ensure_run(&mut self) -> Result<Option<i64>> {
        if let Some(mut run) = self.pending_run.take() {
            let id = run.insert(&self.conn)?;
            debug!("Started {} run {}", run.mode.as_str(), id);
            self.run_id = Some(id);
        }
        Ok(self.run_id)
    }

    pub fn record(&mut self, result: &mut OperationResult) -> Result<()> {
        result.run_id = self.ensure_run()?;
        db::transaction(&mut self.conn, |tx| result.insert(tx))?;
        Ok(())
    }

    pub fn record_backup(&mut self, record: &mut BackupRecord) -> Result<()> {
        record.run_id = self.ensure_run()?;
        db::transaction(&mut self.conn, |tx| record.insert(tx))?;
        Ok(())
    }

    /// Every recorded outcome, oldest first
    pub fn history(&self) -> Result<Vec<OperationResult>> {
        OperationResult::list_all(&self.conn)
    }

    pub fn run_history(&self, run_id: i64) -> Result<Vec<OperationResult>> {
        OperationResult::find_by_run(&self.conn, run_id)
    }

    pub fn runs(&self, limit: usize) -> Result<Vec<Run>> {
        Run::list_recent(&self.conn, limit)
    }

    pub fn latest_backup(&self, group_name: &str) -> Result<Option<BackupRecord>> {
        BackupRecord::latest_for_group(&self.conn, group_name)
    }

    pub fn backups(&self) -> Result<Vec<BackupRecord>> {
        BackupRecord::list_all(&self.conn)
    }

    /// Fold the write-ahead log into the main database file
    pub fn flush(&self) -> Result<()> {
        self.conn
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        Ok(())
    }
}

impl Drop for StateStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to checkpoint state database: {}", e);
        }
    }
}

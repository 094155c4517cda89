// src/backup.rs

//! Backup archives taken before removals
//!
//! Each archive is a zstd-compressed tarball named
//! `<group>_backup_<YYYYmmdd_HHMMSS>.tar.zst`. Entries keep their absolute
//! path minus the leading `/`, so `tar -C / -xf` puts them back in place.
//! Archives are written to a temp file in the archive directory and renamed
//! into place, so a crash never leaves a truncated archive under a final name.

use crate::db::models::BackupRecord;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const ARCHIVE_EXTENSION: &str = "tar.zst";

/// State of an archive on disk compared with its record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveStatus {
    Intact,
    Modified,
    Missing,
}

impl ArchiveStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ArchiveStatus::Intact => "intact",
            ArchiveStatus::Modified => "modified",
            ArchiveStatus::Missing => "missing",
        }
    }
}

/// Archive whichever of `sources` exist into `archive_dir`
///
/// Returns `None` when no source path exists; that is a no-op, not a failure.
pub fn create_backup(
    group_name: &str,
    sources: &[PathBuf],
    archive_dir: &Path,
    compression_level: i32,
) -> Result<Option<BackupRecord>> {
    let existing: BTreeSet<PathBuf> = sources
        .iter()
        .filter(|p| p.symlink_metadata().is_ok())
        .cloned()
        .collect();

    if existing.is_empty() {
        info!("No existing paths to back up for group {}", group_name);
        return Ok(None);
    }

    std::fs::create_dir_all(archive_dir).map_err(|e| {
        Error::Archive(format!("Failed to create {}: {}", archive_dir.display(), e))
    })?;

    let created_at = Utc::now();
    let dest = unique_archive_path(archive_dir, group_name, &created_at);

    let mut tmp = tempfile::Builder::new()
        .prefix(".partial-")
        .tempfile_in(archive_dir)?;

    {
        let encoder = zstd::Encoder::new(tmp.as_file_mut(), compression_level)
            .map_err(|e| Error::Archive(format!("Failed to create zstd encoder: {}", e)))?;
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);

        for source in &existing {
            let name = entry_name(source);
            debug!("Archiving {} as {}", source.display(), name.display());
            let appended = if source.is_dir() {
                builder.append_dir_all(&name, source)
            } else {
                builder.append_path_with_name(source, &name)
            };
            appended.map_err(|e| {
                Error::Archive(format!("Failed to archive {}: {}", source.display(), e))
            })?;
        }

        let encoder = builder
            .into_inner()
            .map_err(|e| Error::Archive(format!("Failed to finish tar stream: {}", e)))?;
        encoder
            .finish()
            .map_err(|e| Error::Archive(format!("Failed to finish zstd stream: {}", e)))?;
    }

    tmp.as_file().sync_all()?;
    let size_bytes = tmp.as_file().metadata()?.len();
    let sha256 = sha256_file(tmp.path())?;

    tmp.persist_noclobber(&dest).map_err(|e| {
        Error::Archive(format!("Failed to move archive to {}: {}", dest.display(), e.error))
    })?;

    info!(
        "Backed up {} path(s) for {} to {} ({} bytes)",
        existing.len(),
        group_name,
        dest.display(),
        size_bytes
    );

    Ok(Some(BackupRecord {
        id: None,
        run_id: None,
        group_name: group_name.to_string(),
        created_at,
        archive_path: dest,
        source_paths: existing,
        size_bytes,
        sha256,
    }))
}

/// Compare an archive on disk with the digest recorded for it
pub fn check_archive(record: &BackupRecord) -> Result<ArchiveStatus> {
    if !record.archive_path.exists() {
        return Ok(ArchiveStatus::Missing);
    }
    if sha256_file(&record.archive_path)? == record.sha256 {
        Ok(ArchiveStatus::Intact)
    } else {
        Ok(ArchiveStatus::Modified)
    }
}

/// Entry names stored in an archive
pub fn archive_entries(path: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(path)?;
    let decoder = zstd::Decoder::new(file)
        .map_err(|e| Error::Archive(format!("Failed to create zstd decoder: {}", e)))?;
    let mut archive = tar::Archive::new(decoder);

    let mut entries = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        entries.push(entry.path()?.into_owned());
    }
    Ok(entries)
}

/// `<group>_backup_<timestamp>.tar.zst`, suffixed if that name is taken
fn unique_archive_path(archive_dir: &Path, group_name: &str, created_at: &DateTime<Utc>) -> PathBuf {
    let stem = format!(
        "{}_backup_{}",
        sanitize(group_name),
        created_at.format("%Y%m%d_%H%M%S")
    );

    let mut candidate = archive_dir.join(format!("{}.{}", stem, ARCHIVE_EXTENSION));
    let mut n = 1;
    while candidate.exists() {
        candidate = archive_dir.join(format!("{}_{}.{}", stem, n, ARCHIVE_EXTENSION));
        n += 1;
    }
    candidate
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn entry_name(path: &Path) -> PathBuf {
    path.strip_prefix("/").unwrap_or(path).to_path_buf()
}

fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

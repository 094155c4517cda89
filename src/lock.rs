// src/lock.rs

//! Single-instance lock on the state directory
//!
//! Mutating commands hold an exclusive advisory lock on `deskforge.lock` for
//! their whole run. A second invocation fails fast instead of waiting, so two
//! runs never interleave records or archive writes. The lock is released when
//! the guard is dropped, or by the kernel if the process dies.

use crate::error::{Error, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct StateLock {
    _file: File,
    path: PathBuf,
}

impl StateLock {
    /// Take the lock or fail with `Error::Locked` if another run holds it
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;

        if !file.try_lock_exclusive()? {
            let holder = std::fs::read_to_string(path).unwrap_or_default();
            let holder = holder.trim();
            return Err(Error::Locked(if holder.is_empty() {
                format!("{} is held by another deskforge process", path.display())
            } else {
                format!("{} is held by deskforge process {}", path.display(), holder)
            }));
        }

        // Record the holder for the message above; content is informational only
        file.set_len(0)?;
        write!(file, "{}", std::process::id())?;
        file.flush()?;

        debug!("Acquired state lock {}", path.display());
        Ok(Self {
            _file: file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        debug!("Released state lock {}", self.path.display());
    }
}

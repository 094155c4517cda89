// src/lib.rs

//! Deskforge
//!
//! Declarative installer, verifier and uninstaller for small-business
//! Debian/Ubuntu workstations.
//!
//! # Architecture
//!
//! - Manifest: named groups of items, each bound to a backend (APT or Flatpak)
//! - Convergence: drive each item toward present or absent, one at a time,
//!   recording every outcome and never aborting the batch on a single failure
//! - State: append-only SQLite log of runs, outcomes and backup archives
//! - Verification: re-query live state and rate overall health

pub mod backends;
pub mod backup;
pub mod commands;
pub mod config;
pub mod db;
pub mod engine;
mod error;
pub mod host;
pub mod interrupt;
pub mod lock;
pub mod logging;
pub mod manifest;
pub mod state;
pub mod verify;

pub use error::{Error, Result};

// src/interrupt.rs

//! Termination signal handling
//!
//! SIGINT, SIGTERM and SIGHUP are turned into a shared flag instead of killing
//! the process. The engine checks the flag between items and during retry
//! delays, records the in-flight item, and unwinds with
//! `Error::Interrupted` so the state store and log file are flushed before
//! exit. A second signal while the first is still being handled exits
//! immediately.

use crate::error::{Error, Result};
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

/// Granularity of interruptible sleeps
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared record of the first termination signal received (0 = none)
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    signal: Arc<AtomicI32>,
}

impl Interrupt {
    /// A flag no signal handler writes to; tests raise it by hand
    pub fn new() -> Self {
        Self::default()
    }

    /// Register handlers for SIGINT, SIGTERM and SIGHUP
    ///
    /// Call once at program start.
    pub fn install() -> std::io::Result<Self> {
        let interrupt = Self::new();
        let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
        let handle = interrupt.clone();

        thread::spawn(move || {
            for sig in signals.forever() {
                if handle.is_set() {
                    // Second signal: the user insists
                    std::process::exit(128 + sig);
                }
                warn!("Received {} signal, finishing current record...", signal_name(sig));
                handle.raise(sig);
            }
        });

        Ok(interrupt)
    }

    pub fn raise(&self, signal: i32) {
        let _ = self
            .signal
            .compare_exchange(0, signal, Ordering::SeqCst, Ordering::SeqCst);
    }

    pub fn signal(&self) -> Option<i32> {
        match self.signal.load(Ordering::SeqCst) {
            0 => None,
            sig => Some(sig),
        }
    }

    pub fn is_set(&self) -> bool {
        self.signal().is_some()
    }

    /// `Err(Interrupted)` once a signal has arrived
    pub fn check(&self) -> Result<()> {
        match self.signal() {
            Some(signal) => Err(Error::Interrupted { signal }),
            None => Ok(()),
        }
    }

    /// Sleep for `duration`, waking early if a signal arrives
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        let deadline = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

fn signal_name(sig: i32) -> &'static str {
    match sig {
        SIGINT => "SIGINT",
        SIGTERM => "SIGTERM",
        SIGHUP => "SIGHUP",
        _ => "UNKNOWN",
    }
}

/// Process exit code for an interruption: 128 + signal number
pub fn exit_code(signal: i32) -> i32 {
    128 + signal
}

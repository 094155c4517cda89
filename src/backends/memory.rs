// src/backends/memory.rs

//! In-memory backend for tests
//!
//! Clones share state, so a test can keep one handle for assertions while a
//! boxed clone is handed to a `BackendSet`.

use super::{ApplyStatus, Backend, BackendError};
use crate::interrupt::Interrupt;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

/// A call the backend received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Query(String),
    Install(String),
    Remove(String),
    GarbageCollect,
}

#[derive(Default)]
struct Inner {
    installed: BTreeSet<String>,
    persistent_failures: HashSet<String>,
    transient_failures: HashMap<String, u32>,
    interrupt_on: Option<(String, Interrupt, i32)>,
    query_interrupt_on: Option<(String, Interrupt, i32)>,
    gc_fails: bool,
    calls: Vec<Call>,
}

/// Scriptable backend holding installed state in memory
#[derive(Clone)]
pub struct MemoryBackend {
    name: String,
    available: bool,
    inner: Rc<RefCell<Inner>>,
}

impl MemoryBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: true,
            inner: Rc::new(RefCell::new(Inner::default())),
        }
    }

    /// Start with these items installed
    pub fn with_installed<I, S>(self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner
            .borrow_mut()
            .installed
            .extend(items.into_iter().map(Into::into));
        self
    }

    /// Behave as if the backend's tooling were missing
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Every install/remove attempt for `identifier` fails
    pub fn fail_always(self, identifier: &str) -> Self {
        self.inner
            .borrow_mut()
            .persistent_failures
            .insert(identifier.to_string());
        self
    }

    /// The next `times` install/remove attempts for `identifier` fail transiently
    pub fn fail_transient(self, identifier: &str, times: u32) -> Self {
        self.inner
            .borrow_mut()
            .transient_failures
            .insert(identifier.to_string(), times);
        self
    }

    /// Raise `signal` on `interrupt` while mutating `identifier`, as if the
    /// package tool were killed by the terminal's Ctrl+C
    pub fn interrupt_during(self, identifier: &str, interrupt: &Interrupt, signal: i32) -> Self {
        self.inner.borrow_mut().interrupt_on =
            Some((identifier.to_string(), interrupt.clone(), signal));
        self
    }

    /// Raise `signal` on `interrupt` while querying `identifier` and report it
    /// missing, as a query tool killed mid-run reads
    pub fn interrupt_during_query(self, identifier: &str, interrupt: &Interrupt, signal: i32) -> Self {
        self.inner.borrow_mut().query_interrupt_on =
            Some((identifier.to_string(), interrupt.clone(), signal));
        self
    }

    pub fn fail_garbage_collect(self) -> Self {
        self.inner.borrow_mut().gc_fails = true;
        self
    }

    pub fn installed(&self) -> Vec<String> {
        self.inner.borrow().installed.iter().cloned().collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.borrow().calls.clone()
    }

    /// Number of install or remove attempts made for `identifier`
    pub fn attempts(&self, identifier: &str) -> usize {
        self.inner
            .borrow()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Install(i) | Call::Remove(i) if i == identifier))
            .count()
    }

    fn ensure_available(&self) -> Result<(), BackendError> {
        if self.available {
            Ok(())
        } else {
            Err(BackendError::Unavailable {
                tool: self.name.clone(),
            })
        }
    }

    fn mutate(&self, operation: &str, identifier: &str, install: bool) -> Result<ApplyStatus, BackendError> {
        self.ensure_available()?;

        let mut inner = self.inner.borrow_mut();
        if inner.installed.contains(identifier) == install {
            return Ok(ApplyStatus::AlreadySatisfied);
        }

        inner.calls.push(if install {
            Call::Install(identifier.to_string())
        } else {
            Call::Remove(identifier.to_string())
        });

        let failed = |detail: &str, transient: bool| BackendError::Failed {
            operation: operation.to_string(),
            identifier: identifier.to_string(),
            code: Some(100),
            detail: detail.to_string(),
            transient,
        };

        if let Some((target, interrupt, signal)) = &inner.interrupt_on {
            if target == identifier {
                interrupt.raise(*signal);
                return Err(failed("terminated by signal", false));
            }
        }

        if inner.persistent_failures.contains(identifier) {
            return Err(failed("E: scripted failure", false));
        }

        if let Some(remaining) = inner.transient_failures.get_mut(identifier) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(failed("E: Could not get lock /var/lib/dpkg/lock-frontend", true));
            }
        }

        if install {
            inner.installed.insert(identifier.to_string());
        } else {
            inner.installed.remove(identifier);
        }
        Ok(ApplyStatus::Applied)
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_installed(&self, identifier: &str) -> Result<bool, BackendError> {
        self.inner
            .borrow_mut()
            .calls
            .push(Call::Query(identifier.to_string()));
        self.ensure_available()?;

        let inner = self.inner.borrow();
        if let Some((target, interrupt, signal)) = &inner.query_interrupt_on {
            if target == identifier {
                interrupt.raise(*signal);
                return Ok(false);
            }
        }
        Ok(inner.installed.contains(identifier))
    }

    fn install(&self, identifier: &str) -> Result<ApplyStatus, BackendError> {
        self.mutate("install", identifier, true)
    }

    fn remove(&self, identifier: &str) -> Result<ApplyStatus, BackendError> {
        self.mutate("remove", identifier, false)
    }

    fn garbage_collect(&self) -> Result<(), BackendError> {
        self.ensure_available()?;
        let mut inner = self.inner.borrow_mut();
        inner.calls.push(Call::GarbageCollect);
        if inner.gc_fails {
            return Err(BackendError::Failed {
                operation: "autoremove".to_string(),
                identifier: "orphaned dependencies".to_string(),
                code: Some(100),
                detail: "E: scripted autoremove failure".to_string(),
                transient: false,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_is_idempotent() {
        let backend = MemoryBackend::new("apt");
        assert_eq!(backend.install("vlc").unwrap(), ApplyStatus::Applied);
        assert_eq!(backend.install("vlc").unwrap(), ApplyStatus::AlreadySatisfied);
        assert_eq!(backend.attempts("vlc"), 1);
    }

    #[test]
    fn test_remove_absent_is_satisfied() {
        let backend = MemoryBackend::new("apt");
        assert_eq!(backend.remove("vlc").unwrap(), ApplyStatus::AlreadySatisfied);
    }

    #[test]
    fn test_transient_failures_run_out() {
        let backend = MemoryBackend::new("apt").fail_transient("gimp", 1);
        assert!(backend.install("gimp").unwrap_err().is_transient());
        assert_eq!(backend.install("gimp").unwrap(), ApplyStatus::Applied);
    }

    #[test]
    fn test_clones_share_state() {
        let backend = MemoryBackend::new("flatpak");
        let handle = backend.clone();
        backend.install("org.gimp.GIMP").unwrap();
        assert_eq!(handle.installed(), vec!["org.gimp.GIMP".to_string()]);
    }

    #[test]
    fn test_unavailable() {
        let backend = MemoryBackend::new("flatpak").unavailable();
        assert!(backend.is_installed("x").unwrap_err().is_unavailable());
    }
}

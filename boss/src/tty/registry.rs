//! TTY registry and the mark/check half of reload reconciliation.
//!
//! A reload runs `mark` over every entry, then `register` for every
//! configured line (which runs `check`), then the supervisor sweeps
//! everything left dirty.

use super::entry::{Dirty, TtyEntry, TtyStatus};
use super::line::TtySpec;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use nix::unistd::Pid;
use std::time::SystemTime;
use tracing::debug;

/// Insertion ordered set of TTY entries keyed by device path.
#[derive(Debug, Default)]
pub struct Registry {
    entries: IndexMap<String, TtyEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update a TTY from a registration line.
    pub fn register(&mut self, line: &str, mtime: Option<SystemTime>) -> Result<&mut TtyEntry> {
        let spec = TtySpec::parse(line)?;
        self.register_spec(spec, mtime)
    }

    /// Register or update a TTY from an already parsed line.
    pub fn register_spec(
        &mut self,
        spec: TtySpec,
        mtime: Option<SystemTime>,
    ) -> Result<&mut TtyEntry> {
        debug!(
            device = %spec.device,
            baud = spec.baud.as_deref().unwrap_or("NULL"),
            term = spec.term.as_deref().unwrap_or("N/A"),
            runlevels = %spec.runlevels,
            "Registering tty"
        );

        if !self.entries.contains_key(&spec.device) {
            self.entries
                .try_reserve(1)
                .map_err(|_| Error::OutOfMemory)?;
        }

        let entry = self
            .entries
            .entry(spec.device.clone())
            .or_insert_with(|| TtyEntry::new(spec.device.clone()));

        entry.baud = spec.baud;
        entry.term = spec.term;
        entry.noclear = spec.noclear;
        entry.runlevels = spec.runlevels;

        check(entry, mtime);
        debug!(device = %entry.device, dirty = ?entry.dirty, "Checked tty");

        Ok(entry)
    }

    /// Remove a stopped entry from the registry.
    pub fn unregister(&mut self, device: &str) -> Result<TtyEntry> {
        if device.is_empty() {
            return Err(Error::InvalidArgument("missing tty device".to_string()));
        }

        match self.entries.get(device) {
            None => Err(Error::InvalidArgument(format!("unknown tty {}", device))),
            Some(entry) if entry.pid.is_some() => Err(Error::InvalidArgument(format!(
                "tty {} still has a running login process",
                device
            ))),
            Some(_) => self
                .entries
                .shift_remove(device)
                .ok_or_else(|| Error::InvalidArgument(format!("unknown tty {}", device))),
        }
    }

    pub fn find(&self, device: &str) -> Option<&TtyEntry> {
        self.entries.get(device)
    }

    pub fn find_mut(&mut self, device: &str) -> Option<&mut TtyEntry> {
        self.entries.get_mut(device)
    }

    pub fn find_by_pid(&self, pid: Pid) -> Option<&TtyEntry> {
        self.entries.values().find(|e| e.pid == Some(pid))
    }

    pub fn find_by_pid_mut(&mut self, pid: Pid) -> Option<&mut TtyEntry> {
        self.entries.values_mut().find(|e| e.pid == Some(pid))
    }

    /// Number of registered TTYs.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Number of TTYs with a running login process.
    pub fn count_active(&self) -> usize {
        self.entries.values().filter(|e| e.is_active()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TtyEntry> {
        self.entries.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TtyEntry> {
        self.entries.values_mut()
    }

    /// Devices in insertion order.
    pub fn devices(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Assume every previously checked entry is gone until it is
    /// registered again.
    pub fn mark(&mut self) {
        for entry in self.entries.values_mut() {
            if entry.last_modified.is_some() {
                entry.dirty = Dirty::Removed;
            }
        }
    }

    /// Status snapshot of every entry.
    pub fn status(&self) -> Vec<TtyStatus> {
        self.entries.values().map(TtyStatus::from).collect()
    }
}

/// Compare a registration timestamp against the stored one.
pub(crate) fn check(entry: &mut TtyEntry, mtime: Option<SystemTime>) {
    entry.dirty = match mtime {
        Some(t) if entry.last_modified != Some(t) => Dirty::Changed,
        _ => Dirty::Clean,
    };
    entry.last_modified = mtime;
}

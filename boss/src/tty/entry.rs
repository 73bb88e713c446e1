//! TTY entry types.

use crate::runlevel::Runlevels;
use chrono::{DateTime, Utc};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Reconciliation state of an entry across a configuration reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dirty {
    /// Registered again with the same timestamp
    #[default]
    Clean,
    /// Registered again with a different timestamp, needs restart
    Changed,
    /// Not registered again since the last mark
    Removed,
}

/// One configured terminal line.
#[derive(Debug, Clone)]
pub struct TtyEntry {
    /// Device path, the registry key
    pub(crate) device: String,
    /// Comma separated baud rates, driver default when absent
    pub(crate) baud: Option<String>,
    /// Terminal type, environment default when absent
    pub(crate) term: Option<String>,
    /// Don't clear the screen before login
    pub(crate) noclear: bool,
    /// Runlevels the line may run in
    pub(crate) runlevels: Runlevels,
    /// Supervised login process
    pub(crate) pid: Option<Pid>,
    /// When the login process was started
    pub(crate) started_at: Option<DateTime<Utc>>,
    /// Config timestamp from the last registration
    pub(crate) last_modified: Option<SystemTime>,
    pub(crate) dirty: Dirty,
}

impl TtyEntry {
    pub(crate) fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            baud: None,
            term: None,
            noclear: false,
            runlevels: Runlevels::default(),
            pid: None,
            started_at: None,
            last_modified: None,
            dirty: Dirty::Clean,
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn baud(&self) -> Option<&str> {
        self.baud.as_deref()
    }

    pub fn term(&self) -> Option<&str> {
        self.term.as_deref()
    }

    pub fn noclear(&self) -> bool {
        self.noclear
    }

    pub fn runlevels(&self) -> Runlevels {
        self.runlevels
    }

    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    pub fn dirty(&self) -> Dirty {
        self.dirty
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    /// Check if a login process is running on this line.
    pub fn is_active(&self) -> bool {
        self.pid.is_some()
    }
}

/// TTY status information for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtyStatus {
    /// Device path
    pub device: String,
    /// Baud rates
    pub baud: Option<String>,
    /// Terminal type
    pub term: Option<String>,
    /// Screen clearing suppressed
    pub noclear: bool,
    /// Allowed runlevels, e.g. `[2345]`
    pub runlevels: String,
    /// Login process
    pub pid: Option<i32>,
    /// Login process start time
    pub started_at: Option<DateTime<Utc>>,
    /// Reconciliation state
    pub dirty: Dirty,
}

impl From<&TtyEntry> for TtyStatus {
    fn from(tty: &TtyEntry) -> Self {
        Self {
            device: tty.device.clone(),
            baud: tty.baud.clone(),
            term: tty.term.clone(),
            noclear: tty.noclear,
            runlevels: tty.runlevels.to_string(),
            pid: tty.pid.map(Pid::as_raw),
            started_at: tty.started_at,
            dirty: tty.dirty,
        }
    }
}

//! Starting and stopping login processes on TTY lines.

use super::entry::TtyEntry;
use crate::device::Devices;
use crate::error::Result;
use crate::process::{kill_and_reap, Launcher, LoginRequest};
use crate::runlevel::Runlevel;
use chrono::Utc;
use nix::unistd::Pid;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Owns the relation between TTY entries and their login processes.
pub struct Lifecycle {
    devices: Box<dyn Devices>,
    launcher: Box<dyn Launcher>,
    console: Option<PathBuf>,
}

impl Lifecycle {
    pub fn new(devices: Box<dyn Devices>, launcher: Box<dyn Launcher>) -> Self {
        Self {
            devices,
            launcher,
            console: None,
        }
    }

    /// Set the system console device.
    pub fn with_console(mut self, console: Option<PathBuf>) -> Self {
        self.console = console;
        self
    }

    pub(crate) fn launcher(&mut self) -> &mut dyn Launcher {
        self.launcher.as_mut()
    }

    /// Whether the line may run in `runlevel` and its device is present.
    pub fn enabled(&self, tty: &TtyEntry, runlevel: Runlevel) -> bool {
        if !tty.runlevels.allows(runlevel) {
            return false;
        }

        match self.devices.resolve(&tty.device) {
            Ok(dev) => self.devices.exists(&dev),
            Err(_) => false,
        }
    }

    /// Start a login process, unless one is already running.
    ///
    /// Device problems are logged and leave the entry stopped.
    pub fn start(&mut self, tty: &mut TtyEntry) {
        if tty.pid.is_some() {
            debug!(device = %tty.device, "TTY already active");
            return;
        }

        let dev = match self.validate(&tty.device) {
            Ok(dev) => dev,
            Err(e) => {
                debug!(device = %tty.device, error = %e, "Not starting TTY");
                return;
            }
        };

        let console = self.console.as_deref() == Some(dev.as_path());
        let req = LoginRequest {
            device: &dev,
            baud: tty.baud.as_deref(),
            term: tty.term.as_deref(),
            noclear: tty.noclear,
            console,
        };

        if let Some(pid) = self.launcher.run_login(&req) {
            info!(device = %tty.device, pid = %pid, console = console, "Started TTY");
            tty.pid = Some(pid);
            tty.started_at = Some(Utc::now());
        }
    }

    /// Kill the login process and wait for it, if one is running.
    pub fn stop(&mut self, tty: &mut TtyEntry) {
        let pid = match tty.pid {
            Some(pid) => pid,
            None => return,
        };

        info!(device = %tty.device, pid = %pid, "Stopping TTY");
        // TODO: SIGTERM first with a grace period once TTYs run as regular services
        if let Err(e) = kill_and_reap(pid) {
            warn!(device = %tty.device, pid = %pid, error = %e, "Failed to stop TTY process");
        }
        Self::forget(tty);
    }

    /// Run the gate for the line and start or stop it accordingly.
    pub fn apply(&mut self, tty: &mut TtyEntry, runlevel: Runlevel) {
        if self.enabled(tty, runlevel) {
            self.start(tty);
        } else {
            self.stop(tty);
        }
    }

    /// Drop the login process of a line that has already exited.
    pub(crate) fn exited(&mut self, tty: &mut TtyEntry, pid: Pid) {
        if tty.pid == Some(pid) {
            Self::forget(tty);
        }
    }

    fn forget(tty: &mut TtyEntry) {
        tty.pid = None;
        tty.started_at = None;
    }

    fn validate(&self, name: &str) -> Result<PathBuf> {
        let dev = self.devices.resolve(name)?;
        self.devices.probe(&dev)?;
        Ok(dev)
    }
}

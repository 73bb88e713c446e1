//! TTY supervision.
//!
//! The supervisor owns every configured terminal line, keeps a login
//! process running on the lines allowed in the current runlevel, and
//! brings the set back in line with the configuration on reload:
//!
//! 1. [`TtySupervisor::mark`] flags every previously registered line as removed
//! 2. [`TtySupervisor::register`] runs for each configured line and
//!    clears or sets the flag depending on the config timestamp
//! 3. [`TtySupervisor::sweep`] stops changed lines and drops removed ones
//! 4. [`TtySupervisor::apply`] starts or stops every line per runlevel
//!
//! Process deaths come in through [`TtySupervisor::on_process_exit`].

mod entry;
mod lifecycle;
mod line;
mod registry;

pub use entry::{Dirty, TtyEntry, TtyStatus};
pub use lifecycle::Lifecycle;
pub use line::TtySpec;
pub use registry::Registry;

use crate::accounting::Accounting;
use crate::config::ConfigLine;
use crate::device::Devices;
use crate::error::Result;
use crate::fallback::{FallbackEvent, FallbackShell};
use crate::process::Launcher;
use crate::runlevel::Runlevel;
use nix::unistd::Pid;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::{debug, error, info};

/// Supervises login processes on all configured TTY lines.
pub struct TtySupervisor {
    registry: Registry,
    lifecycle: Lifecycle,
    accounting: Box<dyn Accounting>,
    fallback: Option<FallbackShell>,
    runlevel: Runlevel,
}

impl TtySupervisor {
    pub fn new(
        devices: Box<dyn Devices>,
        launcher: Box<dyn Launcher>,
        accounting: Box<dyn Accounting>,
    ) -> Self {
        Self {
            registry: Registry::new(),
            lifecycle: Lifecycle::new(devices, launcher),
            accounting,
            fallback: None,
            runlevel: Runlevel::default(),
        }
    }

    /// Set the system console device.
    pub fn with_console(mut self, console: Option<PathBuf>) -> Self {
        self.lifecycle = self.lifecycle.with_console(console);
        self
    }

    /// Enable the fallback shell.
    pub fn with_fallback_shell(mut self, enabled: bool) -> Self {
        self.fallback = enabled.then(FallbackShell::new);
        self
    }

    /// Set the initial runlevel without applying it.
    pub fn with_runlevel(mut self, runlevel: Runlevel) -> Self {
        self.runlevel = runlevel;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn runlevel(&self) -> Runlevel {
        self.runlevel
    }

    /// Pid of the fallback shell, if one is running.
    pub fn fallback_pid(&self) -> Option<Pid> {
        self.fallback.as_ref().and_then(FallbackShell::pid)
    }

    /// First reload phase: assume every checked line was removed.
    pub fn mark(&mut self) {
        self.registry.mark();
    }

    /// Second reload phase: register one line.
    pub fn register(&mut self, line: &str, mtime: Option<SystemTime>) -> Result<()> {
        self.registry.register(line, mtime).map(|_| ())
    }

    /// Remove a line that is no longer running.
    pub fn unregister(&mut self, device: &str) -> Result<TtyEntry> {
        self.registry.unregister(device)
    }

    /// Third reload phase: stop dirty lines, drop removed ones.
    pub fn sweep(&mut self) {
        let mut removed = Vec::new();

        for tty in self.registry.iter_mut() {
            if tty.dirty == Dirty::Clean {
                continue;
            }

            debug!(device = %tty.device, dirty = ?tty.dirty, "TTY dirty, stopping");
            self.lifecycle.stop(tty);

            if tty.dirty == Dirty::Removed {
                removed.push(tty.device.clone());
            }
        }

        for device in removed {
            debug!(device = %device, "TTY removed, cleaning up");
            if let Err(e) = self.registry.unregister(&device) {
                error!(device = %device, error = %e, "Failed to unregister TTY");
            }
        }
    }

    /// Start or stop every line for the current runlevel.
    pub fn apply(&mut self) {
        let runlevel = self.runlevel;
        for tty in self.registry.iter_mut() {
            self.lifecycle.apply(tty, runlevel);
            tty.dirty = Dirty::Clean;
        }

        self.evaluate_fallback();
    }

    /// Full reload cycle over a fresh set of configuration lines.
    pub fn reload<I>(&mut self, lines: I)
    where
        I: IntoIterator<Item = ConfigLine>,
    {
        self.mark();

        for line in lines {
            if let Err(e) = self.register(&line.line, line.mtime) {
                error!(
                    origin = %line.origin.display(),
                    line = %line.line,
                    error = %e,
                    "Skipping TTY line"
                );
            }
        }

        self.sweep();
        self.apply();

        info!(
            ttys = self.registry.count(),
            active = self.registry.count_active(),
            "TTYs reloaded"
        );
    }

    /// Switch runlevel and start or stop lines accordingly.
    pub fn set_runlevel(&mut self, runlevel: Runlevel) {
        info!(from = %self.runlevel, to = %runlevel, "Changing runlevel");
        self.runlevel = runlevel;
        self.apply();
    }

    /// Stop every login process and the fallback shell.
    pub fn stop_all(&mut self) {
        for tty in self.registry.iter_mut() {
            self.lifecycle.stop(tty);
        }

        if let Some(fallback) = self.fallback.as_mut() {
            fallback.clear();
        }
    }

    /// Handle the death of a child process.
    ///
    /// Returns false if the pid belongs neither to a TTY nor to the
    /// fallback shell.
    pub fn on_process_exit(&mut self, pid: Pid) -> bool {
        let runlevel = self.runlevel;

        let tty = match self.registry.find_by_pid_mut(pid) {
            Some(tty) => tty,
            None => return self.fallback_exited(pid),
        };

        debug!(device = %tty.device, pid = %pid, "TTY process exited");
        self.accounting.mark_dead(pid);
        self.lifecycle.exited(tty, pid);

        // Respawn, unless the runlevel or device went away meanwhile
        self.lifecycle.apply(tty, runlevel);
        self.evaluate_fallback();

        true
    }

    fn fallback_exited(&mut self, pid: Pid) -> bool {
        let active = self.registry.count_active();
        let fallback = match self.fallback.as_mut() {
            Some(fallback) => fallback,
            None => return false,
        };

        let handled = fallback.update(FallbackEvent::Exited(pid), self.lifecycle.launcher());
        if handled && active == 0 {
            fallback.update(FallbackEvent::NoTtysActive, self.lifecycle.launcher());
        }

        handled
    }

    fn evaluate_fallback(&mut self) {
        let event = if self.registry.count_active() > 0 {
            FallbackEvent::TtysActive
        } else {
            FallbackEvent::NoTtysActive
        };

        if let Some(fallback) = self.fallback.as_mut() {
            fallback.update(event, self.lifecycle.launcher());
        }
    }
}

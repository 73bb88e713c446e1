//! Fallback shell for systems where no TTY is active.
//!
//! When no login process runs on any line, a single interactive shell is
//! started on init's own stdin so the system stays reachable. It is
//! killed again as soon as a TTY comes up.

use crate::process::{kill_and_reap, Launcher};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

/// What happened to the TTY set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackEvent {
    /// At least one TTY is active
    TtysActive,
    /// No TTY is active
    NoTtysActive,
    /// A process exited that the TTY registry doesn't know
    Exited(Pid),
}

/// Tracks the single fallback shell.
#[derive(Debug, Default)]
pub struct FallbackShell {
    pid: Option<Pid>,
}

impl FallbackShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently tracked shell.
    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    /// React to a change in the TTY set.
    ///
    /// Returns true only for `Exited` events naming the tracked shell.
    pub fn update(&mut self, event: FallbackEvent, launcher: &mut dyn Launcher) -> bool {
        match event {
            FallbackEvent::TtysActive => {
                self.clear();
                false
            }
            FallbackEvent::NoTtysActive => {
                self.spawn(launcher);
                false
            }
            FallbackEvent::Exited(pid) => {
                if self.pid != Some(pid) {
                    return false;
                }
                debug!(pid = %pid, "Fallback shell exited");
                self.pid = None;
                true
            }
        }
    }

    /// Start a shell unless one is already tracked.
    pub fn spawn(&mut self, launcher: &mut dyn Launcher) {
        if self.pid.is_some() {
            return;
        }

        self.pid = launcher.run_shell();
        if let Some(pid) = self.pid {
            info!(pid = %pid, "No TTY active, started fallback shell");
        }
    }

    /// Kill and forget the tracked shell.
    pub fn clear(&mut self) {
        if let Some(pid) = self.pid.take() {
            info!(pid = %pid, "TTY active, stopping fallback shell");
            if let Err(e) = kill_and_reap(pid) {
                warn!(pid = %pid, error = %e, "Failed to stop fallback shell");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::LoginRequest;
    use nix::errno::Errno;
    use nix::sys::signal;
    use std::process::Command;

    #[derive(Default)]
    struct ShellOnly {
        spawned: Vec<Pid>,
    }

    impl Launcher for ShellOnly {
        fn run_login(&mut self, _req: &LoginRequest<'_>) -> Option<Pid> {
            None
        }

        fn run_shell(&mut self) -> Option<Pid> {
            let child = Command::new("sleep").arg("60").spawn().ok()?;
            let pid = Pid::from_raw(child.id() as i32);
            self.spawned.push(pid);
            Some(pid)
        }
    }

    #[test]
    fn test_spawns_once() {
        let mut launcher = ShellOnly::default();
        let mut shell = FallbackShell::new();

        shell.update(FallbackEvent::NoTtysActive, &mut launcher);
        shell.update(FallbackEvent::NoTtysActive, &mut launcher);

        assert_eq!(launcher.spawned.len(), 1);
        assert_eq!(shell.pid(), Some(launcher.spawned[0]));
        shell.clear();
    }

    #[test]
    fn test_cleared_when_tty_active() {
        let mut launcher = ShellOnly::default();
        let mut shell = FallbackShell::new();

        shell.update(FallbackEvent::NoTtysActive, &mut launcher);
        let pid = shell.pid().unwrap();

        shell.update(FallbackEvent::TtysActive, &mut launcher);
        assert_eq!(shell.pid(), None);
        assert_eq!(signal::kill(pid, None), Err(Errno::ESRCH));

        // Nothing left to kill
        shell.update(FallbackEvent::TtysActive, &mut launcher);
        assert_eq!(launcher.spawned.len(), 1);
    }

    #[test]
    fn test_exit_of_tracked_shell() {
        let mut launcher = ShellOnly::default();
        let mut shell = FallbackShell::new();

        shell.update(FallbackEvent::NoTtysActive, &mut launcher);
        let pid = shell.pid().unwrap();
        kill_and_reap(pid).unwrap();

        assert!(!shell.update(FallbackEvent::Exited(Pid::from_raw(1)), &mut launcher));
        assert_eq!(shell.pid(), Some(pid));

        assert!(shell.update(FallbackEvent::Exited(pid), &mut launcher));
        assert_eq!(shell.pid(), None);
    }
}

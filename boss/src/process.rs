//! Process management for TTY supervision.
//!
//! This module spawns login and shell processes, and kills and reaps them.

use crate::error::Result;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, error, info};

/// Default login program.
pub const DEFAULT_GETTY: &str = "/sbin/getty";

/// Default fallback shell.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Everything needed to start a login process on a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest<'a> {
    /// Resolved device path
    pub device: &'a Path,
    /// Baud rates
    pub baud: Option<&'a str>,
    /// Terminal type
    pub term: Option<&'a str>,
    /// Don't clear the screen
    pub noclear: bool,
    /// The line is the system console
    pub console: bool,
}

/// Spawns the processes the TTY supervisor owns.
///
/// Both methods return `None` when nothing was started; implementations
/// log their own failures.
pub trait Launcher {
    /// Start a login process on a line.
    fn run_login(&mut self, req: &LoginRequest<'_>) -> Option<Pid>;

    /// Start an interactive shell as a session leader on stdin.
    fn run_shell(&mut self) -> Option<Pid>;
}

/// Launcher that execs getty and a shell.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    getty: PathBuf,
    shell: PathBuf,
}

impl ProcessLauncher {
    pub fn new(getty: impl Into<PathBuf>, shell: impl Into<PathBuf>) -> Self {
        Self {
            getty: getty.into(),
            shell: shell.into(),
        }
    }

    /// Arguments passed to getty for a request.
    pub fn getty_args(req: &LoginRequest<'_>) -> Vec<String> {
        let mut args = Vec::new();
        if req.noclear {
            args.push("--noclear".to_string());
        }
        if req.console {
            args.push("-L".to_string());
        }
        args.push(req.device.display().to_string());
        if let Some(baud) = req.baud {
            args.push(baud.to_string());
        }
        if let Some(term) = req.term {
            args.push(term.to_string());
        }
        args
    }
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self::new(DEFAULT_GETTY, DEFAULT_SHELL)
    }
}

impl Launcher for ProcessLauncher {
    fn run_login(&mut self, req: &LoginRequest<'_>) -> Option<Pid> {
        let mut cmd = Command::new(&self.getty);
        cmd.args(Self::getty_args(req));
        cmd.env("PATH", "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin");
        if let Some(term) = req.term {
            cmd.env("TERM", term);
        }

        // getty opens the line itself and needs its own session for it
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid()
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
                Ok(())
            });
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        match cmd.spawn() {
            Ok(child) => {
                let pid = Pid::from_raw(child.id() as i32);
                info!(device = %req.device.display(), pid = %pid, "Spawned getty");
                Some(pid)
            }
            Err(e) => {
                error!(
                    device = %req.device.display(),
                    getty = %self.getty.display(),
                    error = %e,
                    "Failed to spawn getty"
                );
                None
            }
        }
    }

    fn run_shell(&mut self) -> Option<Pid> {
        let mut cmd = Command::new(&self.shell);

        // Session leader with stdin as controlling TTY, for job control
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid()
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
                if libc::ioctl(libc::STDIN_FILENO, libc::TIOCSCTTY, 1) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        match cmd.spawn() {
            Ok(child) => {
                let pid = Pid::from_raw(child.id() as i32);
                info!(shell = %self.shell.display(), pid = %pid, "Spawned fallback shell");
                Some(pid)
            }
            Err(e) => {
                error!(shell = %self.shell.display(), error = %e, "Failed to spawn fallback shell");
                None
            }
        }
    }
}

/// Kill a child outright and wait for it.
///
/// A child that is already gone, or already reaped, counts as stopped.
pub fn kill_and_reap(pid: Pid) -> Result<()> {
    match signal::kill(pid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => return Err(e.into()),
    }

    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) => break,
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => {
                debug!(pid = %pid, "Process already reaped");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    debug!(pid = %pid, "Killed and reaped process");
    Ok(())
}

/// Exit status of a reaped child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    /// Process ID
    pub pid: Pid,
    /// Exit code (if exited normally)
    pub code: Option<i32>,
    /// Signal (if killed by signal)
    pub signal: Option<i32>,
}

/// Reap every child that has exited so far, without blocking.
pub fn reap_children() -> Vec<ExitStatus> {
    let mut statuses = Vec::new();

    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, code)) => {
                debug!(pid = %pid, code = code, "Reaped process");
                statuses.push(ExitStatus {
                    pid,
                    code: Some(code),
                    signal: None,
                });
            }
            Ok(WaitStatus::Signaled(pid, sig, _)) => {
                debug!(pid = %pid, signal = ?sig, "Reaped signaled process");
                statuses.push(ExitStatus {
                    pid,
                    code: None,
                    signal: Some(sig as i32),
                });
            }
            Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => break,
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(e) => {
                error!(error = %e, "Error reaping children");
                break;
            }
        }
    }

    statuses
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sleeper() -> Pid {
        let child = Command::new("sleep").arg("60").spawn().unwrap();
        Pid::from_raw(child.id() as i32)
    }

    #[test]
    fn test_getty_args() {
        let req = LoginRequest {
            device: Path::new("/dev/ttyS0"),
            baud: Some("115200"),
            term: Some("vt100"),
            noclear: false,
            console: false,
        };
        assert_eq!(ProcessLauncher::getty_args(&req), vec!["/dev/ttyS0", "115200", "vt100"]);

        let req = LoginRequest {
            device: Path::new("/dev/console"),
            baud: None,
            term: None,
            noclear: true,
            console: true,
        };
        assert_eq!(
            ProcessLauncher::getty_args(&req),
            vec!["--noclear", "-L", "/dev/console"]
        );
    }

    #[test]
    fn test_kill_and_reap() {
        let pid = sleeper();
        kill_and_reap(pid).unwrap();
        assert_eq!(signal::kill(pid, None), Err(Errno::ESRCH));
    }

    #[test]
    fn test_kill_and_reap_twice() {
        let pid = sleeper();
        kill_and_reap(pid).unwrap();
        kill_and_reap(pid).unwrap();
    }

    #[test]
    fn test_missing_getty() {
        let mut launcher = ProcessLauncher::new("/nonexistent/getty", DEFAULT_SHELL);
        let req = LoginRequest {
            device: Path::new("/dev/null"),
            baud: None,
            term: None,
            noclear: false,
            console: false,
        };
        assert_eq!(launcher.run_login(&req), None);
    }
}

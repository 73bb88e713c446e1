//! Login accounting (utmp) for supervised lines.

use nix::unistd::Pid;
use tracing::debug;

/// Records login session termination.
pub trait Accounting {
    /// Mark the session owned by `pid` as dead.
    fn mark_dead(&mut self, pid: Pid);
}

/// Accounting that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAccounting;

impl Accounting for NoAccounting {
    fn mark_dead(&mut self, _pid: Pid) {}
}

/// Accounting through the system utmpx database.
#[derive(Debug, Default, Clone, Copy)]
pub struct UtmpAccounting;

#[cfg(target_os = "linux")]
impl Accounting for UtmpAccounting {
    fn mark_dead(&mut self, pid: Pid) {
        let raw = pid.as_raw();
        let mut found = false;

        unsafe {
            libc::setutxent();
            loop {
                let ent = libc::getutxent();
                if ent.is_null() {
                    break;
                }

                let mut rec = *ent;
                if rec.ut_pid != raw
                    || (rec.ut_type != libc::USER_PROCESS && rec.ut_type != libc::LOGIN_PROCESS)
                {
                    continue;
                }

                rec.ut_type = libc::DEAD_PROCESS;
                rec.ut_user = [0; 32];
                rec.ut_host = [0; 256];
                libc::setutxent();
                found = !libc::pututxline(&rec).is_null();
                break;
            }
            libc::endutxent();
        }

        debug!(pid = %pid, found = found, "Marked utmp session dead");
    }
}

#[cfg(not(target_os = "linux"))]
impl Accounting for UtmpAccounting {
    fn mark_dead(&mut self, pid: Pid) {
        debug!(pid = %pid, "utmp accounting not supported on this platform");
    }
}

//! TTY device resolution and probing.

use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Default device directory.
pub const DEFAULT_DEV_DIR: &str = "/dev";

/// Access to terminal device nodes.
pub trait Devices {
    /// Turn a configured name into the path of an existing character device.
    fn resolve(&self, name: &str) -> Result<PathBuf>;

    /// Check that a device node is a live terminal.
    fn probe(&self, path: &Path) -> Result<()>;

    /// Check whether the device node currently exists.
    fn exists(&self, path: &Path) -> bool;
}

/// Device access through the real filesystem.
#[derive(Debug, Clone)]
pub struct SysDevices {
    dev_dir: PathBuf,
}

impl SysDevices {
    pub fn new(dev_dir: impl Into<PathBuf>) -> Self {
        Self {
            dev_dir: dev_dir.into(),
        }
    }
}

impl Default for SysDevices {
    fn default() -> Self {
        Self::new(DEFAULT_DEV_DIR)
    }
}

fn is_char_device(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.file_type().is_char_device())
        .unwrap_or(false)
}

impl Devices for SysDevices {
    fn resolve(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() {
            return Err(Error::DeviceNotFound(name.to_string()));
        }

        let path = Path::new(name);
        if path.is_absolute() && is_char_device(path) {
            return Ok(path.to_path_buf());
        }

        let path = self.dev_dir.join(name.trim_start_matches('/'));
        if is_char_device(&path) {
            return Ok(path);
        }

        Err(Error::DeviceNotFound(name.to_string()))
    }

    fn probe(&self, path: &Path) -> Result<()> {
        let unusable = |reason: String| Error::DeviceUnusable {
            device: path.display().to_string(),
            reason,
        };

        // Never become the controlling terminal of init, never wait for carrier
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)
            .map_err(|e| unusable(e.to_string()))?;

        let mut attr = std::mem::MaybeUninit::<libc::termios>::uninit();
        let rc = unsafe { libc::tcgetattr(file.as_raw_fd(), attr.as_mut_ptr()) };
        if rc != 0 {
            return Err(unusable(std::io::Error::last_os_error().to_string()));
        }

        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

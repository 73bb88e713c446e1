//! Boss TTY supervisor.
//!
//! This crate is the terminal line part of the boss init system. It
//! keeps a getty running on every configured TTY that is allowed in the
//! current runlevel and whose device is present:
//!
//! - TTY registration from `tty` lines with runlevel sets
//! - Reload reconciliation that leaves untouched lines running
//! - Respawn of login processes when they exit
//! - A fallback shell when no line is active
//! - A control socket for reload, runlevel changes and status
//!
//! # Example
//!
//! ```no_run
//! use buckos_boss::{BossConfig, Init, InitConfig};
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> buckos_boss::Result<()> {
//!     let config_file = Path::new("/etc/boss/tty.toml");
//!     let config = InitConfig {
//!         config_file: config_file.to_path_buf(),
//!         settings: BossConfig::load(config_file)?,
//!         control: true,
//!     };
//!     Init::new(config).run().await?;
//!     Ok(())
//! }
//! ```

pub mod accounting;
pub mod config;
pub mod control;
pub mod device;
pub mod error;
pub mod fallback;
pub mod init;
pub mod process;
pub mod runlevel;
pub mod tty;

pub use accounting::{Accounting, NoAccounting, UtmpAccounting};
pub use config::{BossConfig, ConfigLine};
pub use control::{ControlClient, ControlCommand, ControlResponse, ControlServer};
pub use device::{Devices, SysDevices};
pub use error::{Error, Result};
pub use fallback::{FallbackEvent, FallbackShell};
pub use init::{Init, InitConfig};
pub use process::{Launcher, LoginRequest, ProcessLauncher};
pub use runlevel::{Runlevel, Runlevels};
pub use tty::{Dirty, Lifecycle, Registry, TtyEntry, TtySpec, TtyStatus, TtySupervisor};

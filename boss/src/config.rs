//! Configuration for the TTY supervisor.
//!
//! Settings come from a TOML file. TTY lines come from the `ttys` array
//! of that file and from `tty ...` lines in `*.conf` files under
//! `conf_dir`; each line carries the mtime of the file it was read from.

use crate::device::DEFAULT_DEV_DIR;
use crate::error::{Error, Result};
use crate::process::{DEFAULT_GETTY, DEFAULT_SHELL};
use crate::runlevel::Runlevel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Default configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/boss/tty.toml";

/// Default directory with `*.conf` files.
pub const DEFAULT_CONF_DIR: &str = "/etc/boss/tty.d";

/// Default control socket.
pub const DEFAULT_CONTROL_SOCKET: &str = "/run/boss/tty.sock";

/// Supervisor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BossConfig {
    /// Runlevel to enter at startup
    pub runlevel: Runlevel,
    /// Login program
    pub getty: PathBuf,
    /// Fallback shell
    pub shell: PathBuf,
    /// System console device
    pub console: Option<PathBuf>,
    /// Start a shell when no TTY is active
    pub fallback_shell: bool,
    /// Where relative device names are looked up
    pub dev_dir: PathBuf,
    /// Directory with additional TTY lines
    pub conf_dir: PathBuf,
    /// Control socket path
    pub control_socket: PathBuf,
    /// Record session ends in utmp
    pub utmp: bool,
    /// Inline TTY lines
    pub ttys: Vec<String>,
}

impl Default for BossConfig {
    fn default() -> Self {
        Self {
            runlevel: Runlevel::default(),
            getty: PathBuf::from(DEFAULT_GETTY),
            shell: PathBuf::from(DEFAULT_SHELL),
            console: None,
            fallback_shell: false,
            dev_dir: PathBuf::from(DEFAULT_DEV_DIR),
            conf_dir: PathBuf::from(DEFAULT_CONF_DIR),
            control_socket: PathBuf::from(DEFAULT_CONTROL_SOCKET),
            utmp: true,
            ttys: Vec::new(),
        }
    }
}

impl BossConfig {
    /// Load settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: BossConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load settings, falling back to defaults if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::from_file(path)
    }
}

/// A TTY registration line and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLine {
    /// Registration line, without the `tty` keyword
    pub line: String,
    /// Modification time of the originating file
    pub mtime: Option<SystemTime>,
    /// Originating file
    pub origin: PathBuf,
}

fn mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Extract the TTY lines of a `.conf` file.
pub fn parse_conf(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| {
            let mut parts = l.splitn(2, char::is_whitespace);
            match (parts.next(), parts.next()) {
                (Some("tty"), Some(rest)) => Some(rest.trim().to_string()),
                _ => None,
            }
        })
        .collect()
}

/// Gather every configured TTY line.
///
/// Reads the `ttys` array of the config file fresh, so edits are picked
/// up on reload, then the `*.conf` files of `conf_dir` in name order.
pub fn collect_lines(config_file: &Path, conf_dir: &Path) -> Result<Vec<ConfigLine>> {
    let mut lines = Vec::new();

    if config_file.exists() {
        let config = BossConfig::from_file(config_file)?;
        let stamp = mtime(config_file);
        lines.extend(config.ttys.into_iter().map(|line| ConfigLine {
            line,
            mtime: stamp,
            origin: config_file.to_path_buf(),
        }));
    }

    if !conf_dir.is_dir() {
        debug!(dir = %conf_dir.display(), "No TTY conf directory");
        return Ok(lines);
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(conf_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("conf"))
        .collect();
    files.sort();

    for path in files {
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read conf file");
                continue;
            }
        };

        let stamp = mtime(&path);
        lines.extend(parse_conf(&content).into_iter().map(|line| ConfigLine {
            line,
            mtime: stamp,
            origin: path.clone(),
        }));
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: BossConfig = toml::from_str("").unwrap();
        assert_eq!(config, BossConfig::default());
        assert_eq!(config.runlevel.to_string(), "2");
        assert_eq!(config.getty, PathBuf::from("/sbin/getty"));
        assert!(!config.fallback_shell);
    }

    #[test]
    fn test_parse_toml() {
        let config: BossConfig = toml::from_str(
            r#"
            runlevel = "3"
            console = "/dev/ttyS0"
            fallback_shell = true
            ttys = ["[2-5] /dev/ttyS0 115200 vt100"]
            "#,
        )
        .unwrap();

        assert_eq!(config.runlevel.to_string(), "3");
        assert_eq!(config.console, Some(PathBuf::from("/dev/ttyS0")));
        assert!(config.fallback_shell);
        assert_eq!(config.ttys.len(), 1);
    }

    #[test]
    fn test_bad_runlevel() {
        assert!(toml::from_str::<BossConfig>(r#"runlevel = "12""#).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let config = BossConfig::load(Path::new("/nonexistent/tty.toml")).unwrap();
        assert_eq!(config, BossConfig::default());
    }

    #[test]
    fn test_parse_conf() {
        let lines = parse_conf(
            "# consoles\n\
             tty [12345] /dev/tty1 38400 linux\n\
             \n\
             service /sbin/syslogd\n\
             tty   /dev/ttyS0 115200 vt100 noclear\n\
             tty\n",
        );
        assert_eq!(
            lines,
            vec![
                "[12345] /dev/tty1 38400 linux".to_string(),
                "/dev/ttyS0 115200 vt100 noclear".to_string(),
            ]
        );
    }

    #[test]
    fn test_collect_lines() {
        let dir = tempfile::tempdir().unwrap();
        let config_file = dir.path().join("tty.toml");
        let conf_dir = dir.path().join("tty.d");
        std::fs::create_dir(&conf_dir).unwrap();

        std::fs::write(&config_file, "ttys = [\"/dev/tty1\"]\n").unwrap();
        std::fs::write(conf_dir.join("b.conf"), "tty /dev/tty3\n").unwrap();
        std::fs::write(conf_dir.join("a.conf"), "tty /dev/tty2\n").unwrap();
        std::fs::write(conf_dir.join("ignored.txt"), "tty /dev/tty9\n").unwrap();

        let lines = collect_lines(&config_file, &conf_dir).unwrap();
        let devices: Vec<&str> = lines.iter().map(|l| l.line.as_str()).collect();
        assert_eq!(devices, vec!["/dev/tty1", "/dev/tty2", "/dev/tty3"]);
        assert!(lines.iter().all(|l| l.mtime.is_some()));
        assert_eq!(lines[1].origin, conf_dir.join("a.conf"));
    }

    #[test]
    fn test_collect_lines_nothing_configured() {
        let dir = tempfile::tempdir().unwrap();
        let lines = collect_lines(&dir.path().join("tty.toml"), &dir.path().join("tty.d")).unwrap();
        assert!(lines.is_empty());
    }
}

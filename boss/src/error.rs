//! Error types for the boss TTY supervisor.

use thiserror::Error;

/// Result type alias for TTY supervisor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while supervising TTY lines.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or unusable input to an operation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed TTY registration line
    #[error("Invalid tty specification: {0}")]
    InvalidSpec(String),

    /// Unknown runlevel
    #[error("Invalid runlevel: {0}")]
    InvalidRunlevel(String),

    /// Device name does not resolve to a character device
    #[error("Cannot find TTY device: {0}")]
    DeviceNotFound(String),

    /// Device exists but is not a live terminal
    #[error("Not a valid TTY: {device}: {reason}")]
    DeviceUnusable { device: String, reason: String },

    /// Registry could not grow
    #[error("Out of memory registering tty")]
    OutOfMemory,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Anything else
    #[error("{0}")]
    Other(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Nix error
    #[error("System error: {0}")]
    Nix(#[from] nix::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use nix::errno::Errno;

    #[test]
    fn test_from_errno() {
        let err: Error = Errno::EPERM.into();
        assert_matches!(err, Error::Nix(Errno::EPERM));
        assert!(err.to_string().starts_with("System error"));
    }
}

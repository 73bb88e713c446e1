//! TTY registration line parsing.
//!
//! Format, fields in any order:
//!
//! ```text
//! [<runlevels>] <device> [<baud>[,<baud>...]] [<term>] [noclear]
//! ```

use crate::error::{Error, Result};
use crate::runlevel::Runlevels;
use std::fmt;

/// Parsed registration line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtySpec {
    pub device: String,
    pub baud: Option<String>,
    pub term: Option<String>,
    pub noclear: bool,
    pub runlevels: Runlevels,
}

fn is_baud(tok: &str) -> bool {
    tok.starts_with(|c: char| c.is_ascii_digit())
        && tok.chars().all(|c| c.is_ascii_digit() || c == ',')
}

impl TtySpec {
    /// Parse a registration line.
    pub fn parse(line: &str) -> Result<Self> {
        if line.trim().is_empty() {
            return Err(Error::InvalidArgument("empty tty line".to_string()));
        }

        let mut device = None;
        let mut baud = None;
        let mut term = None;
        let mut runlevels = None;
        let mut noclear = false;

        for tok in line.split_ascii_whitespace() {
            if tok.starts_with('[') {
                runlevels = Some(tok);
            } else if tok.starts_with('/') {
                device = Some(tok);
            } else if baud.is_none() && is_baud(tok) {
                baud = Some(tok);
            } else if tok == "noclear" {
                noclear = true;
            } else {
                term = Some(tok);
            }
        }

        let device = device.ok_or_else(|| {
            Error::InvalidSpec(format!("incomplete tty, no device in '{}'", line.trim()))
        })?;

        Ok(Self {
            device: device.to_string(),
            baud: baud.map(str::to_string),
            term: term.map(str::to_string),
            noclear,
            runlevels: Runlevels::parse(runlevels),
        })
    }
}

impl fmt::Display for TtySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.runlevels, self.device)?;
        if let Some(ref baud) = self.baud {
            write!(f, " {}", baud)?;
        }
        if let Some(ref term) = self.term {
            write!(f, " {}", term)?;
        }
        if self.noclear {
            write!(f, " noclear")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_full_line() {
        let spec = TtySpec::parse("[2-5] /dev/ttyS0 115200 vt100").unwrap();
        assert_eq!(spec.device, "/dev/ttyS0");
        assert_eq!(spec.baud.as_deref(), Some("115200"));
        assert_eq!(spec.term.as_deref(), Some("vt100"));
        assert!(!spec.noclear);
        assert_eq!(spec.runlevels, Runlevels::default());
    }

    #[test]
    fn test_any_order() {
        let spec = TtySpec::parse("noclear linux 38400,9600 /dev/tty1 [12]").unwrap();
        assert_eq!(spec.device, "/dev/tty1");
        assert_eq!(spec.baud.as_deref(), Some("38400,9600"));
        assert_eq!(spec.term.as_deref(), Some("linux"));
        assert!(spec.noclear);
        assert_eq!(spec.runlevels, Runlevels::L1 | Runlevels::L2);
    }

    #[test]
    fn test_device_only() {
        let spec = TtySpec::parse("/dev/tty2").unwrap();
        assert_eq!(spec.baud, None);
        assert_eq!(spec.term, None);
        assert_eq!(spec.runlevels, Runlevels::default());
        assert_eq!(spec.to_string(), "[2345] /dev/tty2");
    }

    #[test]
    fn test_second_baud_is_term() {
        let spec = TtySpec::parse("/dev/ttyS1 9600 19200").unwrap();
        assert_eq!(spec.baud.as_deref(), Some("9600"));
        assert_eq!(spec.term.as_deref(), Some("19200"));
    }

    #[test]
    fn test_digit_prefixed_term() {
        let spec = TtySpec::parse("/dev/ttyS1 3270").unwrap();
        assert_eq!(spec.baud.as_deref(), Some("3270"));

        let spec = TtySpec::parse("/dev/ttyS1 9600 3x").unwrap();
        assert_eq!(spec.term.as_deref(), Some("3x"));
    }

    #[test]
    fn test_missing_device() {
        assert_matches!(TtySpec::parse("[2-5] 115200 vt100"), Err(Error::InvalidSpec(_)));
        assert_matches!(TtySpec::parse("ttyS0"), Err(Error::InvalidSpec(_)));
    }

    #[test]
    fn test_empty_line() {
        assert_matches!(TtySpec::parse("   "), Err(Error::InvalidArgument(_)));
    }
}

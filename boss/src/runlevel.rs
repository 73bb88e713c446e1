//! Runlevels and runlevel sets.
//!
//! A runlevel is one of `0`-`9` or `S` (single-user). TTY lines carry a
//! set of runlevels they are allowed to run in, written in brackets in
//! the registration line, e.g. `[2-5]`, `[!1]` or `[S12345]`.

use crate::error::{Error, Result};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bit used for the single-user level.
const SINGLE_BIT: u8 = 10;

/// A single runlevel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Runlevel(u8);

impl Runlevel {
    /// Single-user mode.
    pub const SINGLE: Runlevel = Runlevel(SINGLE_BIT);

    /// Create a numbered runlevel, `0` through `9`.
    pub fn new(level: u8) -> Result<Self> {
        if level > 9 {
            return Err(Error::InvalidRunlevel(level.to_string()));
        }
        Ok(Self(level))
    }

    fn bit(self) -> Runlevels {
        Runlevels::from_bits_truncate(1 << self.0)
    }
}

impl Default for Runlevel {
    fn default() -> Self {
        Runlevel(2)
    }
}

impl FromStr for Runlevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "S" | "s" => Ok(Runlevel::SINGLE),
            other => other
                .parse::<u8>()
                .map_err(|_| Error::InvalidRunlevel(other.to_string()))
                .and_then(Runlevel::new),
        }
    }
}

impl TryFrom<String> for Runlevel {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Runlevel> for String {
    fn from(level: Runlevel) -> Self {
        level.to_string()
    }
}

impl fmt::Display for Runlevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Runlevel::SINGLE {
            write!(f, "S")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

bitflags! {
    /// Set of runlevels a TTY may run in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Runlevels: u16 {
        const L0 = 1 << 0;
        const L1 = 1 << 1;
        const L2 = 1 << 2;
        const L3 = 1 << 3;
        const L4 = 1 << 4;
        const L5 = 1 << 5;
        const L6 = 1 << 6;
        const L7 = 1 << 7;
        const L8 = 1 << 8;
        const L9 = 1 << 9;
        const SINGLE = 1 << SINGLE_BIT;
    }
}

impl Default for Runlevels {
    /// Levels 2-5, used when a line has no runlevel set.
    fn default() -> Self {
        Runlevels::L2 | Runlevels::L3 | Runlevels::L4 | Runlevels::L5
    }
}

impl Runlevels {
    /// Base set for negated specs: `[!1]` means 2-9.
    const NEGATION_BASE: Runlevels = Runlevels::from_bits_truncate(0x3FE);

    /// Parse an optional bracketed runlevel set.
    ///
    /// `None` yields the default set. Unknown characters are skipped.
    pub fn parse(spec: Option<&str>) -> Self {
        let spec = match spec {
            Some(spec) => spec,
            None => return Runlevels::default(),
        };

        let body = spec.strip_prefix('[').unwrap_or(spec);
        let body = body.split(']').next().unwrap_or_default();

        let mut negate = false;
        let mut levels = Runlevels::empty();
        let mut prev: Option<u8> = None;
        let mut chars = body.chars().peekable();

        while let Some(c) = chars.next() {
            let level = match c {
                '!' => {
                    negate = true;
                    levels = Runlevels::NEGATION_BASE;
                    continue;
                }
                '-' => {
                    // Range: fill in everything after the previous digit
                    let end = chars.peek().and_then(|c| c.to_digit(10));
                    if let (Some(start), Some(end)) = (prev, end) {
                        for n in start..=(end as u8) {
                            levels.apply(Runlevels::from_bits_truncate(1 << n), negate);
                        }
                        chars.next();
                    }
                    prev = None;
                    continue;
                }
                'S' | 's' => SINGLE_BIT,
                c => match c.to_digit(10) {
                    Some(d) => d as u8,
                    None => continue,
                },
            };

            prev = (level <= 9).then_some(level);
            levels.apply(Runlevels::from_bits_truncate(1 << level), negate);
        }

        levels
    }

    /// Whether the set allows the given runlevel.
    pub fn allows(&self, level: Runlevel) -> bool {
        self.contains(level.bit())
    }

    fn apply(&mut self, bit: Runlevels, negate: bool) {
        if negate {
            self.remove(bit);
        } else {
            self.insert(bit);
        }
    }
}

impl fmt::Display for Runlevels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for n in 0..=9u8 {
            if self.contains(Runlevels::from_bits_truncate(1 << n)) {
                write!(f, "{}", n)?;
            }
        }
        if self.contains(Runlevels::SINGLE) {
            write!(f, "S")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(n: u8) -> Runlevel {
        Runlevel::new(n).unwrap()
    }

    #[test]
    fn test_default_set() {
        let levels = Runlevels::parse(None);
        assert_eq!(levels, Runlevels::L2 | Runlevels::L3 | Runlevels::L4 | Runlevels::L5);
        assert!(!levels.allows(level(1)));
        assert!(levels.allows(level(3)));
    }

    #[test]
    fn test_range() {
        let levels = Runlevels::parse(Some("[2-5]"));
        assert_eq!(levels, Runlevels::default());
        assert_eq!(levels.to_string(), "[2345]");
    }

    #[test]
    fn test_list_with_single_user() {
        let levels = Runlevels::parse(Some("[S12]"));
        assert!(levels.allows(Runlevel::SINGLE));
        assert!(levels.allows(level(1)));
        assert!(levels.allows(level(2)));
        assert!(!levels.allows(level(3)));
        assert_eq!(levels.to_string(), "[12S]");
    }

    #[test]
    fn test_negation() {
        let levels = Runlevels::parse(Some("[!1]"));
        assert!(!levels.allows(level(0)));
        assert!(!levels.allows(level(1)));
        for n in 2..=9 {
            assert!(levels.allows(level(n)), "level {} should be allowed", n);
        }
        assert!(!levels.allows(Runlevel::SINGLE));
    }

    #[test]
    fn test_negated_range() {
        let levels = Runlevels::parse(Some("[!6-9]"));
        assert_eq!(levels.to_string(), "[12345]");
    }

    #[test]
    fn test_junk_is_ignored() {
        assert_eq!(Runlevels::parse(Some("[2,x,3")).to_string(), "[23]");
        assert!(Runlevels::parse(Some("[]")).is_empty());
    }

    #[test]
    fn test_runlevel_from_str() {
        assert_eq!("3".parse::<Runlevel>().unwrap(), level(3));
        assert_eq!("s".parse::<Runlevel>().unwrap(), Runlevel::SINGLE);
        assert_eq!(Runlevel::SINGLE.to_string(), "S");
        assert!("10".parse::<Runlevel>().is_err());
        assert!("x".parse::<Runlevel>().is_err());
    }
}

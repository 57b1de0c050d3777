//! Line framing.
//!
//! ds-sim deployments terminate records with either a bare LF or CRLF,
//! selected at server start. The terminator is fixed for the lifetime of a
//! connection and never negotiated on the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Record terminator appended to every outbound line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// Bare `\n` terminator.
    #[default]
    Lf,
    /// `\r\n` terminator.
    Crlf,
}

impl Framing {
    /// The terminator bytes for outbound lines.
    pub fn terminator(&self) -> &'static str {
        match self {
            Framing::Lf => "\n",
            Framing::Crlf => "\r\n",
        }
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framing::Lf => write!(f, "lf"),
            Framing::Crlf => write!(f, "crlf"),
        }
    }
}

impl FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lf" => Ok(Framing::Lf),
            "crlf" => Ok(Framing::Crlf),
            other => Err(format!("invalid framing '{}' (expected lf or crlf)", other)),
        }
    }
}

/// Strip one line terminator from the end of a received line.
///
/// Receive is lenient regardless of the configured framing: a trailing `\n`
/// is removed, then one trailing `\r` if present, so an LF-configured client
/// still tokenizes CRLF input.
pub fn strip_terminator(line: &mut String) {
    if line.ends_with('\n') {
        line.pop();
    }
    if line.ends_with('\r') {
        line.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminators() {
        assert_eq!(Framing::Lf.terminator(), "\n");
        assert_eq!(Framing::Crlf.terminator(), "\r\n");
    }

    #[test]
    fn test_default_is_lf() {
        assert_eq!(Framing::default(), Framing::Lf);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("lf".parse::<Framing>().unwrap(), Framing::Lf);
        assert_eq!("crlf".parse::<Framing>().unwrap(), Framing::Crlf);
        assert_eq!("CRLF".parse::<Framing>().unwrap(), Framing::Crlf);
        assert!("cr".parse::<Framing>().is_err());
    }

    #[test]
    fn test_strip_lf() {
        let mut line = "REDY\n".to_string();
        strip_terminator(&mut line);
        assert_eq!(line, "REDY");
    }

    #[test]
    fn test_strip_crlf() {
        let mut line = "REDY\r\n".to_string();
        strip_terminator(&mut line);
        assert_eq!(line, "REDY");
    }

    #[test]
    fn test_strip_bare_line() {
        let mut line = "REDY".to_string();
        strip_terminator(&mut line);
        assert_eq!(line, "REDY");
    }

    #[test]
    fn test_strip_only_one_terminator() {
        let mut line = "REDY\n\n".to_string();
        strip_terminator(&mut line);
        assert_eq!(line, "REDY\n");
    }

    #[test]
    fn test_serde_round_trip() {
        let json = serde_json::to_string(&Framing::Crlf).unwrap();
        assert_eq!(json, "\"crlf\"");
        let parsed: Framing = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Framing::Crlf);
    }
}

//! # ASLR Tunables
//!
//! Textual configuration of the randomization context, as handed to the
//! loader through its environment or command line.
//!
//! ```text
//! noaslr                  disable randomization (null hints)
//! aslr_space=0x10000000   window width, hex or decimal
//! aslr_space=256m         window width with k/m/g suffix
//! ```
//!
//! Tokens are separated by whitespace or `:`. Unknown tokens are ignored.

use core::fmt;

use crate::context::AslrContext;

/// Tunables parsing error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunableError {
    /// `aslr_space=` value is not a number
    InvalidNumber,
    /// `aslr_space=` value does not fit in an address
    Overflow,
    /// `aslr_space=` given without a value
    MissingValue,
}

impl fmt::Display for TunableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNumber => write!(f, "invalid aslr_space value"),
            Self::Overflow => write!(f, "aslr_space value overflows"),
            Self::MissingValue => write!(f, "aslr_space requires a value"),
        }
    }
}

/// Parsed ASLR settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AslrTunables {
    /// `noaslr` was present
    pub disabled: bool,
    /// Requested window width, before clamping
    pub space: Option<usize>,
}

impl AslrTunables {
    const SPACE_KEY: &'static str = "aslr_space=";

    /// Parse tunables, rejecting malformed values
    pub fn try_parse(input: &str) -> Result<Self, TunableError> {
        let mut tunables = Self::default();

        for token in tokens(input) {
            if token == "noaslr" {
                tunables.disabled = true;
            } else if let Some(value) = token.strip_prefix(Self::SPACE_KEY) {
                tunables.space = Some(parse_size(value)?);
            }
        }

        Ok(tunables)
    }

    /// Parse tunables, skipping malformed values
    ///
    /// A bad value must not stop the loader, so it is logged and dropped.
    pub fn parse(input: &str) -> Self {
        let mut tunables = Self::default();

        for token in tokens(input) {
            if token == "noaslr" {
                tunables.disabled = true;
            } else if let Some(value) = token.strip_prefix(Self::SPACE_KEY) {
                match parse_size(value) {
                    Ok(space) => tunables.space = Some(space),
                    Err(err) => log::debug!("aslr: ignoring '{}': {}", token, err),
                }
            }
        }

        tunables
    }

    /// Apply the settings to a context
    pub fn apply(&self, ctx: &mut AslrContext) {
        if self.disabled {
            ctx.set_enabled(false);
        }
        if let Some(space) = self.space {
            ctx.set_space(space);
        }
    }
}

fn tokens(input: &str) -> impl Iterator<Item = &str> {
    input
        .split(|c: char| c.is_ascii_whitespace() || c == ':')
        .filter(|t| !t.is_empty())
}

/// Parse `0x`-hex or decimal with an optional `k`/`m`/`g` suffix
fn parse_size(value: &str) -> Result<usize, TunableError> {
    if value.is_empty() {
        return Err(TunableError::MissingValue);
    }

    let (digits, shift) = match value.as_bytes()[value.len() - 1] {
        b'k' | b'K' => (&value[..value.len() - 1], 10),
        b'm' | b'M' => (&value[..value.len() - 1], 20),
        b'g' | b'G' => (&value[..value.len() - 1], 30),
        _ => (value, 0),
    };

    let number = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        usize::from_str_radix(hex, 16)
    } else {
        digits.parse::<usize>()
    }
    .map_err(|_| TunableError::InvalidNumber)?;

    number
        .checked_mul(1usize << shift)
        .ok_or(TunableError::Overflow)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ASLR_SPACE_MAX, ASLR_SPACE_MIN};

    #[test]
    fn test_empty() {
        assert_eq!(AslrTunables::parse(""), AslrTunables::default());
        assert_eq!(AslrTunables::parse("quiet verbose"), AslrTunables::default());
    }

    #[test]
    fn test_noaslr() {
        let t = AslrTunables::parse("quiet noaslr");
        assert!(t.disabled);
        assert_eq!(t.space, None);
    }

    #[test]
    fn test_space_formats() {
        assert_eq!(AslrTunables::parse("aslr_space=0x10000000").space, Some(0x1000_0000));
        assert_eq!(AslrTunables::parse("aslr_space=1048576").space, Some(0x10_0000));
        assert_eq!(AslrTunables::parse("aslr_space=256m").space, Some(256 << 20));
        assert_eq!(AslrTunables::parse("aslr_space=64K").space, Some(64 << 10));
        assert_eq!(AslrTunables::parse("aslr_space=0x10M").space, Some(16 << 20));
    }

    #[test]
    fn test_colon_separated() {
        let t = AslrTunables::parse("noaslr:aslr_space=2m");
        assert!(t.disabled);
        assert_eq!(t.space, Some(2 << 20));
    }

    #[test]
    fn test_malformed_values() {
        assert_eq!(
            AslrTunables::try_parse("aslr_space=banana"),
            Err(TunableError::InvalidNumber)
        );
        assert_eq!(
            AslrTunables::try_parse("aslr_space="),
            Err(TunableError::MissingValue)
        );
        assert_eq!(
            AslrTunables::try_parse("aslr_space=0xffffffffffffffffffff"),
            Err(TunableError::InvalidNumber)
        );
        // The lenient parser drops them
        assert_eq!(AslrTunables::parse("aslr_space=banana").space, None);
    }

    #[test]
    fn test_suffix_overflow() {
        let input = std::format!("aslr_space={}g", usize::MAX);
        assert_eq!(AslrTunables::try_parse(&input), Err(TunableError::Overflow));
    }

    #[test]
    fn test_last_value_wins() {
        let t = AslrTunables::parse("aslr_space=2m aslr_space=4m");
        assert_eq!(t.space, Some(4 << 20));
    }

    #[test]
    fn test_apply_clamps() {
        let mut ctx = AslrContext::new();
        AslrTunables::parse("aslr_space=1k").apply(&mut ctx);
        assert_eq!(ctx.effective_space(), ASLR_SPACE_MIN);

        let huge = std::format!("aslr_space={:#x}", usize::MAX);
        AslrTunables::parse(&huge).apply(&mut ctx);
        assert_eq!(ctx.effective_space(), ASLR_SPACE_MAX);
        assert!(ctx.is_enabled());

        AslrTunables::parse("noaslr").apply(&mut ctx);
        assert!(!ctx.is_enabled());
    }
}

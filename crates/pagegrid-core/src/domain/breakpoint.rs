//! Responsive breakpoints and their column counts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named responsive width tier.
///
/// Each breakpoint owns an independent arrangement of the page's blocks.
/// The derived ordering is the canonical iteration order: `lg`, `md`, `sm`, `xs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Breakpoint {
    Lg,
    Md,
    Sm,
    Xs,
}

impl Breakpoint {
    /// Every breakpoint, widest first.
    pub const ALL: [Breakpoint; 4] = [Breakpoint::Lg, Breakpoint::Md, Breakpoint::Sm, Breakpoint::Xs];

    /// Number of grid columns available at this breakpoint.
    pub const fn columns(self) -> u32 {
        match self {
            Breakpoint::Lg => 12,
            Breakpoint::Md => 10,
            Breakpoint::Sm => 6,
            Breakpoint::Xs => 4,
        }
    }

    /// Wire key used in persisted layouts (`"lg"`, `"md"`, ...).
    pub const fn key(self) -> &'static str {
        match self {
            Breakpoint::Lg => "lg",
            Breakpoint::Md => "md",
            Breakpoint::Sm => "sm",
            Breakpoint::Xs => "xs",
        }
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Returned when a string is not one of the known breakpoint keys.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown breakpoint: {0}")]
pub struct UnknownBreakpoint(pub String);

impl FromStr for Breakpoint {
    type Err = UnknownBreakpoint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Breakpoint::ALL
            .into_iter()
            .find(|bp| bp.key() == s)
            .ok_or_else(|| UnknownBreakpoint(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_match_grid_widths() {
        assert_eq!(Breakpoint::Lg.columns(), 12);
        assert_eq!(Breakpoint::Md.columns(), 10);
        assert_eq!(Breakpoint::Sm.columns(), 6);
        assert_eq!(Breakpoint::Xs.columns(), 4);
    }

    #[test]
    fn test_all_is_sorted_widest_first() {
        let mut sorted = Breakpoint::ALL;
        sorted.sort();
        assert_eq!(sorted, Breakpoint::ALL);
        assert!(Breakpoint::ALL
            .windows(2)
            .all(|pair| pair[0].columns() > pair[1].columns()));
    }

    #[test]
    fn test_from_str_accepts_wire_keys() {
        for bp in Breakpoint::ALL {
            assert_eq!(bp.key().parse::<Breakpoint>(), Ok(bp));
        }
    }

    #[test]
    fn test_from_str_rejects_unknown_key() {
        assert_eq!(
            "xxl".parse::<Breakpoint>(),
            Err(UnknownBreakpoint("xxl".to_string()))
        );
    }

    #[test]
    fn test_serde_uses_lowercase_keys() {
        let json = serde_json::to_string(&Breakpoint::Sm).unwrap();
        assert_eq!(json, "\"sm\"");
    }
}

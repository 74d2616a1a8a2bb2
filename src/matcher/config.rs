// Heuristic parameters for the two matchers.
//
// The defaults are the tuned constants of the bsdiff-family delta format.
// None of them has a derivation, so every one can be overridden.

use crate::error::DiffError;

/// Hash window width `H` in bytes.
pub const HASH_WINDOW: usize = 16;

/// Minimum length of a hash candidate before it is considered good enough.
pub const ACCEPT_LEN: usize = 32;

/// Mismatches a candidate must show against the previous alignment before a
/// new control point is opened.
pub const MIN_MISMATCHES: usize = 32;

/// Above this old length the suffix sort seeds ranks with 3-byte context.
pub const WIDE_CONTEXT_THRESHOLD: usize = 0xFF_FFFF;

/// Matching strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Exact suffix-array search.
    #[default]
    Suffix,
    /// Approximate rolling-hash search.
    Hash,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Suffix => "suffix",
            Strategy::Hash => "hash",
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = DiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "suffix" | "sfx" => Ok(Strategy::Suffix),
            "hash" => Ok(Strategy::Hash),
            other => Err(DiffError::InvalidConfig(format!(
                "unknown strategy `{other}` (expected `hash` or `suffix`)"
            ))),
        }
    }
}

/// Matcher tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatcherConfig {
    /// Hash window width `H`.
    pub window: usize,
    /// Hash candidates shorter than this are never accepted.
    pub accept_len: usize,
    /// Required excess of match length over continuation score.
    pub min_mismatches: usize,
    /// Old length above which suffix ranks start from 3-byte context.
    pub wide_context_threshold: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            window: HASH_WINDOW,
            accept_len: ACCEPT_LEN,
            min_mismatches: MIN_MISMATCHES,
            wide_context_threshold: WIDE_CONTEXT_THRESHOLD,
        }
    }
}

impl MatcherConfig {
    /// Reject parameters the matchers cannot work with.
    pub fn validate(&self) -> Result<(), DiffError> {
        if self.window == 0 {
            return Err(DiffError::InvalidConfig("window must be at least 1".into()));
        }
        if self.window > 4096 {
            return Err(DiffError::InvalidConfig(format!(
                "window {} exceeds the 4096-byte maximum",
                self.window
            )));
        }
        if self.accept_len < self.window {
            return Err(DiffError::InvalidConfig(format!(
                "accept length {} is shorter than the window {}",
                self.accept_len, self.window
            )));
        }
        Ok(())
    }
}

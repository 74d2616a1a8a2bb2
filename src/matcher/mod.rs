// Match finders over the old buffer.
//
// Two interchangeable strategies answer the same question for the encoder:
// starting at a scan position in the new buffer, where is the next match
// worth opening a control point for?
//   - `hashed`: rolling-hash block index, approximate, expected linear time.
//   - `suffix`: suffix array built by prefix doubling, exact longest match.

pub mod config;
pub mod hashed;
pub mod rolling;
pub mod suffix;
pub mod table;

pub use config::{MatcherConfig, Strategy};
pub use hashed::HashMatcher;
pub use suffix::SuffixArray;

/// A match reported to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Found {
    /// Position in the new buffer where the match starts.
    pub scan: usize,
    /// Position in the old buffer where the match starts.
    pub pos: usize,
    /// Number of equal bytes.
    pub len: usize,
}

impl Found {
    /// No further match before the end of a new buffer of `new_len` bytes.
    pub fn exhausted(new_len: usize) -> Self {
        Self {
            scan: new_len,
            pos: 0,
            len: 0,
        }
    }

    pub fn is_exhausted(&self, new_len: usize) -> bool {
        self.len == 0 || self.scan >= new_len
    }
}

/// Matcher capability used by the encoder.
///
/// Implementations are read-only once built and can serve any number of
/// scans; all per-scan state lives in the arguments.
pub trait Matcher {
    /// Find the next match at or after `scan` that is not already explained
    /// by the previous alignment `last_offset` (`old pos - new scan` of the
    /// last control point).
    ///
    /// A returned match is byte-exact: `old[pos..pos + len] == new[scan..scan + len]`.
    fn find_next(&self, old: &[u8], new: &[u8], last_offset: isize, scan: usize) -> Found;

    fn name(&self) -> &'static str;
}

/// Length of the common prefix of `a` and `b`.
#[inline]
pub fn match_len(a: &[u8], b: &[u8]) -> usize {
    let n = a.len().min(b.len());
    let (a, b) = (&a[..n], &b[..n]);

    // Eight bytes at a time, then the tail.
    let mut i = 0;
    for (ca, cb) in a.chunks_exact(8).zip(b.chunks_exact(8)) {
        let xor = read_u64_le(ca) ^ read_u64_le(cb);
        if xor != 0 {
            return i + (xor.trailing_zeros() / 8) as usize;
        }
        i += 8;
    }
    while i < n && a[i] == b[i] {
        i += 1;
    }
    i
}

#[inline(always)]
fn read_u64_le(chunk: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(chunk);
    u64::from_le_bytes(word)
}

/// Does `new[at]` agree with the old byte on the alignment `offset`?
///
/// Positions that fall outside the old buffer never agree.
#[inline(always)]
pub fn agrees(old: &[u8], new: &[u8], offset: isize, at: usize) -> bool {
    at.checked_add_signed(offset)
        .and_then(|o| old.get(o))
        .is_some_and(|&b| b == new[at])
}

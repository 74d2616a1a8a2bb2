// Delta engine: drives a matcher over the new buffer and turns its matches
// into an operation stream.
//
// The loop is the classic bsdiff one.  Between two control points the
// previous alignment is carried forward and the next match is extended
// backward, each as far as the `2 * agreeing - length` score allows.
// Whatever neither side claims becomes a literal.  The aligned spans are
// then emitted as exact copies with literals for the bytes that differ.

use log::{debug, trace};

use crate::error::DiffError;
use crate::extend::{self, Alignment};
use crate::matcher::{HashMatcher, Matcher, MatcherConfig, Strategy, SuffixArray};
use crate::ops::{Delta, DeltaBuilder};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for delta construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffOptions {
    /// Which matcher indexes the old buffer.
    pub strategy: Strategy,
    /// Heuristic parameters shared by both matchers.
    pub matcher: MatcherConfig,
}

impl DiffOptions {
    pub fn with_strategy(strategy: Strategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Encoder loop
// ---------------------------------------------------------------------------

/// Encode `new` against `old` using an index already built over `old`.
///
/// Cannot fail: every copy the matcher reports is byte-exact and the
/// extension steps only ever emit verified copies.
pub fn encode<M: Matcher + ?Sized>(matcher: &M, old: &[u8], new: &[u8]) -> Delta {
    let mut builder = DeltaBuilder::new();
    let mut last = Alignment::default();
    let mut last_offset = 0isize;
    let mut scan = 0usize;
    let mut len = 0usize;
    let mut control_points = 0usize;

    loop {
        let found = matcher.find_next(old, new, last_offset, scan + len);
        let done = found.is_exhausted(new.len());
        let next = if done {
            Alignment::new(new.len(), 0)
        } else {
            Alignment::new(found.scan, found.pos)
        };

        let forward = extend::forward_extent(old, new, last, next.scan);
        let backward = if done {
            0
        } else {
            extend::backward_extent(old, new, next, last.scan)
        };
        let (forward, backward) = extend::resolve_overlap(old, new, last, forward, next, backward);

        extend::emit_aligned(&mut builder, old, new, last, forward);
        builder.extra(&new[last.scan + forward..next.scan - backward]);
        trace!(
            "control point: new {}..{} aligned at old {}, {} literal bytes, next match {}+{} at old {}",
            last.scan,
            last.scan + forward,
            last.pos,
            next.scan - backward - last.scan - forward,
            next.scan,
            found.len,
            next.pos
        );

        if done {
            break;
        }
        control_points += 1;
        last = Alignment::new(next.scan - backward, next.pos - backward);
        last_offset = next.offset();
        scan = found.scan;
        len = found.len;
    }

    let delta = builder.finish();
    debug_assert_eq!(delta.new_len(), new.len());
    debug!(
        "{} matcher: {} -> {} bytes, {} control points, {} ops, {} literal bytes",
        matcher.name(),
        old.len(),
        new.len(),
        control_points,
        delta.ops().len(),
        delta.extra_bytes()
    );
    delta
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Index over an old buffer, one variant per strategy.
pub enum MatchIndex {
    Hash(HashMatcher),
    Suffix(SuffixArray),
}

impl MatchIndex {
    pub fn build(old: &[u8], options: &DiffOptions) -> Result<Self, DiffError> {
        Ok(match options.strategy {
            Strategy::Hash => MatchIndex::Hash(HashMatcher::build(old, &options.matcher)?),
            Strategy::Suffix => MatchIndex::Suffix(SuffixArray::build(old, &options.matcher)?),
        })
    }

    pub fn as_matcher(&self) -> &dyn Matcher {
        match self {
            MatchIndex::Hash(m) => m,
            MatchIndex::Suffix(m) => m,
        }
    }
}

/// An old buffer together with its index.
///
/// The index is built once and only read afterwards, so one session can
/// diff any number of new buffers.
pub struct DeltaSession {
    old: Vec<u8>,
    index: MatchIndex,
    options: DiffOptions,
}

impl DeltaSession {
    /// Take ownership of `old` and index it.  On failure nothing is kept.
    pub fn new(old: Vec<u8>, options: &DiffOptions) -> Result<Self, DiffError> {
        let index = MatchIndex::build(&old, options)?;
        Ok(Self {
            old,
            index,
            options: *options,
        })
    }

    pub fn old(&self) -> &[u8] {
        &self.old
    }

    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    /// Delta from the session's old buffer to `new`.
    pub fn diff(&self, new: &[u8]) -> Delta {
        encode(self.index.as_matcher(), &self.old, new)
    }

    /// Diff several new buffers concurrently.  Each scan is still
    /// sequential; only the index is shared.
    #[cfg(feature = "parallel")]
    pub fn diff_many(&self, news: &[&[u8]]) -> Vec<Delta> {
        use rayon::prelude::*;
        news.par_iter().map(|new| self.diff(new)).collect()
    }

    /// Give the old buffer back, dropping the index.
    pub fn into_old(self) -> Vec<u8> {
        self.old
    }
}

/// Delta from `old` to `new` with default options.
pub fn diff(old: &[u8], new: &[u8]) -> Result<Delta, DiffError> {
    diff_with_options(old, new, &DiffOptions::default())
}

/// Delta from `old` to `new`.
pub fn diff_with_options(old: &[u8], new: &[u8], options: &DiffOptions) -> Result<Delta, DiffError> {
    let index = MatchIndex::build(old, options)?;
    Ok(encode(index.as_matcher(), old, new))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

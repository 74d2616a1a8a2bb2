// Match extension between control points.
//
// Once the matcher proposes the next match, the encoder decides how far the
// previous alignment is carried forward and how far the new one reaches
// backward.  Both use the bsdiff score `2 * agreeing - length`, so an
// alignment keeps going through scattered byte changes and stops where the
// two buffers stop resembling each other.  Aligned spans are then split into
// exact copies and literals.

use crate::matcher::agrees;
use crate::matcher::match_len;
use crate::ops::{CONTROL_RECORD_BYTES, DeltaBuilder};

/// A new-buffer position paired with an old-buffer position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Alignment {
    pub scan: usize,
    pub pos: usize,
}

impl Alignment {
    pub fn new(scan: usize, pos: usize) -> Self {
        Self { scan, pos }
    }

    /// `pos - scan`, the diagonal this alignment lies on.
    pub fn offset(&self) -> isize {
        (self.pos as isize).wrapping_sub(self.scan as isize)
    }
}

/// How many bytes the alignment `from` is carried forward before `limit`.
pub fn forward_extent(old: &[u8], new: &[u8], from: Alignment, limit: usize) -> usize {
    let old_tail = old.get(from.pos..).unwrap_or(&[]);
    let new_span = new.get(from.scan..limit).unwrap_or(&[]);

    let (mut agree, mut best, mut extent) = (0isize, 0isize, 0usize);
    for (i, (a, b)) in old_tail.iter().zip(new_span).enumerate() {
        if a == b {
            agree += 1;
        }
        let score = 2 * agree - (i as isize + 1);
        if score > best {
            best = score;
            extent = i + 1;
        }
    }
    extent
}

/// How many bytes the match at `at` is extended backward, never past `floor`
/// in the new buffer.
pub fn backward_extent(old: &[u8], new: &[u8], at: Alignment, floor: usize) -> usize {
    let old_head = &old[..at.pos];
    let new_head = new.get(floor..at.scan).unwrap_or(&[]);

    let (mut agree, mut best, mut extent) = (0isize, 0isize, 0usize);
    for (i, (a, b)) in old_head.iter().rev().zip(new_head.iter().rev()).enumerate() {
        if a == b {
            agree += 1;
        }
        let score = 2 * agree - (i as isize + 1);
        if score > best {
            best = score;
            extent = i + 1;
        }
    }
    extent
}

/// Split the bytes claimed by both extents, returning adjusted
/// `(forward, backward)` lengths that no longer overlap.
pub fn resolve_overlap(
    old: &[u8],
    new: &[u8],
    prev: Alignment,
    forward: usize,
    next: Alignment,
    backward: usize,
) -> (usize, usize) {
    let fwd_end = prev.scan + forward;
    let back_start = next.scan - backward;
    if fwd_end <= back_start {
        return (forward, backward);
    }

    let overlap = fwd_end - back_start;
    let fwd_old = prev.pos + forward - overlap;
    let back_old = next.pos - backward;

    let (mut score, mut best, mut split) = (0isize, 0isize, 0usize);
    for i in 0..overlap {
        if new[back_start + i] == old[fwd_old + i] {
            score += 1;
        }
        if new[back_start + i] == old[back_old + i] {
            score -= 1;
        }
        if score > best {
            best = score;
            split = i + 1;
        }
    }
    (forward + split - overlap, backward - split)
}

/// Emit the aligned span `new[from.scan..][..len]` against
/// `old[from.pos..][..len]` as exact copies and literals.
///
/// An agreeing run with literals on both sides and shorter than a control
/// record is folded into the literal: copying it would cost more than
/// spelling it out.  The span's first and last runs are never folded.
pub fn emit_aligned(builder: &mut DeltaBuilder, old: &[u8], new: &[u8], from: Alignment, len: usize) {
    let old_span = &old[from.pos..from.pos + len];
    let new_span = &new[from.scan..from.scan + len];

    let mut i = 0;
    while i < len {
        let same = match_len(&old_span[i..], &new_span[i..]);
        if same > 0 {
            let end = i + same;
            let boxed_in = end < len && (i > 0 || builder.ends_with_extra());
            if boxed_in && same < CONTROL_RECORD_BYTES {
                builder.extra(&new_span[i..end]);
            } else {
                builder.copy(from.pos + i, same);
            }
            i = end;
            continue;
        }
        let differ = old_span[i..]
            .iter()
            .zip(&new_span[i..])
            .take_while(|(a, b)| a != b)
            .count();
        builder.extra(&new_span[i..i + differ]);
        i += differ;
    }
}

/// Count of bytes in a window of the new buffer that agree with the
/// previous alignment.
///
/// Consecutive windows that start one byte apart are updated by sliding
/// instead of recounting.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinuationScore {
    start: usize,
    len: usize,
    agree: usize,
}

impl ContinuationScore {
    /// Agreement count for `new[scan..scan + len]` on diagonal `offset`.
    pub fn rescore(
        &mut self,
        old: &[u8],
        new: &[u8],
        offset: isize,
        scan: usize,
        len: usize,
    ) -> usize {
        if self.start + 1 != scan || self.len == 0 || self.len - 1 > len {
            self.agree = (scan..scan + len)
                .filter(|&i| agrees(old, new, offset, i))
                .count();
            self.start = scan;
            self.len = len;
            return self.agree;
        }

        if agrees(old, new, offset, self.start) {
            self.agree -= 1;
        }
        self.start += 1;
        self.len -= 1;
        while self.len < len {
            if agrees(old, new, offset, self.start + self.len) {
                self.agree += 1;
            }
            self.len += 1;
        }
        self.agree
    }
}

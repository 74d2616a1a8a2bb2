// Delta operation stream.
//
// The encoder produces a tagged stream of `Copy` and `Extra` operations.
// Container writers that want the classic bsdiff triple
// `(copy length, extra bytes, seek)` get it from `Delta::controls`.

use crate::error::ApplyError;

/// Bytes per control record in the uncompressed bsdiff body
/// (three 64-bit words).
pub const CONTROL_RECORD_BYTES: usize = 24;

/// One delta operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaOp {
    /// Copy `len` bytes from the old buffer starting at `old_offset`.
    Copy { old_offset: usize, len: usize },
    /// Literal bytes not taken from the old buffer.
    Extra(Vec<u8>),
}

impl DeltaOp {
    /// Number of new-buffer bytes this operation produces.
    pub fn len(&self) -> usize {
        match self {
            DeltaOp::Copy { len, .. } => *len,
            DeltaOp::Extra(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A bsdiff control record: copy `copy_len` bytes at the old cursor, append
/// `extra`, then move the old cursor by `copy_len + seek`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRecord<'a> {
    pub copy_len: usize,
    pub extra: &'a [u8],
    pub seek: i64,
}

/// Summary numbers for a delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaStats {
    pub copies: usize,
    pub extras: usize,
    pub controls: usize,
    pub copy_bytes: usize,
    pub extra_bytes: usize,
    pub encoded_size: usize,
}

/// A complete delta from one old buffer to one new buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    ops: Vec<DeltaOp>,
    new_len: usize,
}

impl Delta {
    pub fn ops(&self) -> &[DeltaOp] {
        &self.ops
    }

    /// Length of the buffer this delta reconstructs.
    pub fn new_len(&self) -> usize {
        self.new_len
    }

    /// Total literal bytes.
    pub fn extra_bytes(&self) -> usize {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DeltaOp::Extra(bytes) => Some(bytes.len()),
                DeltaOp::Copy { .. } => None,
            })
            .sum()
    }

    /// Total bytes taken from the old buffer.
    pub fn copy_bytes(&self) -> usize {
        self.new_len - self.extra_bytes()
    }

    /// Rebuild the new buffer from `old`.
    pub fn apply(&self, old: &[u8]) -> Result<Vec<u8>, ApplyError> {
        let mut out = Vec::with_capacity(self.new_len);
        for op in &self.ops {
            match op {
                DeltaOp::Copy { old_offset, len } => {
                    let src = old_offset
                        .checked_add(*len)
                        .and_then(|end| old.get(*old_offset..end))
                        .ok_or(ApplyError::CopyOutOfRange {
                            offset: *old_offset,
                            len: *len,
                            old_len: old.len(),
                        })?;
                    out.extend_from_slice(src);
                }
                DeltaOp::Extra(bytes) => out.extend_from_slice(bytes),
            }
        }
        Ok(out)
    }

    /// Lower the stream to bsdiff control records.
    ///
    /// A leading `(0, [], seek)` record positions the old cursor when the
    /// first copy does not start at offset 0.  The last record always has
    /// seek 0.
    pub fn controls(&self) -> Vec<ControlRecord<'_>> {
        // Each group is an optional copy followed by optional literal bytes.
        let mut groups: Vec<(Option<(usize, usize)>, &[u8])> = Vec::new();
        for op in &self.ops {
            match op {
                DeltaOp::Copy { old_offset, len } => {
                    groups.push((Some((*old_offset, *len)), &[][..]));
                }
                DeltaOp::Extra(bytes) => match groups.last_mut() {
                    Some((_, extra)) if extra.is_empty() => *extra = bytes.as_slice(),
                    _ => groups.push((None, bytes.as_slice())),
                },
            }
        }

        let mut records = Vec::with_capacity(groups.len() + 1);
        let mut cursor = 0usize;
        if let Some((Some((first, _)), _)) = groups.first() {
            if *first != 0 {
                records.push(ControlRecord {
                    copy_len: 0,
                    extra: &[],
                    seek: *first as i64,
                });
                cursor = *first;
            }
        }

        for (i, &(copy, extra)) in groups.iter().enumerate() {
            let copy_len = copy.map_or(0, |(_, len)| len);
            let after = cursor + copy_len;
            let target = match groups.get(i + 1) {
                Some((Some((next, _)), _)) => *next,
                _ => after,
            };
            records.push(ControlRecord {
                copy_len,
                extra,
                seek: target as i64 - after as i64,
            });
            cursor = target;
        }
        records
    }

    /// Uncompressed bsdiff body size: control words plus literal bytes.
    pub fn encoded_size(&self) -> usize {
        CONTROL_RECORD_BYTES * self.controls().len() + self.extra_bytes()
    }

    pub fn stats(&self) -> DeltaStats {
        let copies = self
            .ops
            .iter()
            .filter(|op| matches!(op, DeltaOp::Copy { .. }))
            .count();
        let controls = self.controls().len();
        let extra_bytes = self.extra_bytes();
        DeltaStats {
            copies,
            extras: self.ops.len() - copies,
            controls,
            copy_bytes: self.new_len - extra_bytes,
            extra_bytes,
            encoded_size: CONTROL_RECORD_BYTES * controls + extra_bytes,
        }
    }
}

/// Replay bsdiff control records against `old`.
pub fn apply_controls(old: &[u8], records: &[ControlRecord<'_>]) -> Result<Vec<u8>, ApplyError> {
    let mut out = Vec::new();
    let mut cursor = 0usize;
    for rec in records {
        let end = cursor
            .checked_add(rec.copy_len)
            .filter(|&end| end <= old.len())
            .ok_or(ApplyError::CopyOutOfRange {
                offset: cursor,
                len: rec.copy_len,
                old_len: old.len(),
            })?;
        out.extend_from_slice(&old[cursor..end]);
        out.extend_from_slice(rec.extra);

        cursor = isize::try_from(rec.seek)
            .ok()
            .and_then(|seek| end.checked_add_signed(seek))
            .filter(|&c| c <= old.len())
            .ok_or(ApplyError::SeekOutOfRange {
                cursor: end,
                seek: rec.seek,
            })?;
    }
    Ok(out)
}

/// Accumulates operations, keeping the stream canonical.
///
/// Zero-length operations are dropped, adjacent literals merge, and a copy
/// that continues the previous copy in the old buffer extends it.
#[derive(Debug, Default)]
pub struct DeltaBuilder {
    ops: Vec<DeltaOp>,
    new_len: usize,
}

impl DeltaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copy(&mut self, old_offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        self.new_len += len;
        if let Some(DeltaOp::Copy {
            old_offset: prev,
            len: prev_len,
        }) = self.ops.last_mut()
        {
            if *prev + *prev_len == old_offset {
                *prev_len += len;
                return;
            }
        }
        self.ops.push(DeltaOp::Copy { old_offset, len });
    }

    pub fn extra(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.new_len += bytes.len();
        if let Some(DeltaOp::Extra(prev)) = self.ops.last_mut() {
            prev.extend_from_slice(bytes);
            return;
        }
        self.ops.push(DeltaOp::Extra(bytes.to_vec()));
    }

    /// True when the last operation so far is a literal.
    pub fn ends_with_extra(&self) -> bool {
        matches!(self.ops.last(), Some(DeltaOp::Extra(_)))
    }

    pub fn finish(self) -> Delta {
        Delta {
            ops: self.ops,
            new_len: self.new_len,
        }
    }
}

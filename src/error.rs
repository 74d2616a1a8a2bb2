// Error types for delta construction and replay.

use thiserror::Error;

/// Failure while building a matcher index or validating options.
///
/// Once an index exists, encoding itself cannot fail.
#[derive(Debug, Error)]
pub enum DiffError {
    /// An index table could not be allocated.  The session is unusable.
    #[error("failed to allocate {bytes} bytes for the {what}")]
    Allocation { what: &'static str, bytes: usize },

    /// A matcher parameter is out of range.
    #[error("invalid matcher configuration: {0}")]
    InvalidConfig(String),
}

/// Failure while replaying a delta against an old buffer.
///
/// Only happens when the delta was produced for a different old buffer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApplyError {
    #[error("copy of {len} bytes at old offset {offset} exceeds old buffer of {old_len} bytes")]
    CopyOutOfRange {
        offset: usize,
        len: usize,
        old_len: usize,
    },

    #[error("seek by {seek} moves the old cursor from {cursor} out of range")]
    SeekOutOfRange { cursor: usize, seek: i64 },
}

/// Allocate a zero-filled table, reporting allocation failure instead of aborting.
pub(crate) fn alloc_zeroed<T: Copy + Default>(
    len: usize,
    what: &'static str,
) -> Result<Vec<T>, DiffError> {
    let mut table = Vec::new();
    table
        .try_reserve_exact(len)
        .map_err(|_| DiffError::Allocation {
            what,
            bytes: len.saturating_mul(size_of::<T>()),
        })?;
    table.resize(len, T::default());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_zeroed_fills_with_default() {
        let t: Vec<u32> = alloc_zeroed(17, "test table").unwrap();
        assert_eq!(t.len(), 17);
        assert!(t.iter().all(|&v| v == 0));
    }

    #[test]
    fn alloc_zeroed_reports_impossible_sizes() {
        let err = alloc_zeroed::<u64>(usize::MAX / 4, "huge table").unwrap_err();
        match err {
            DiffError::Allocation { what, .. } => assert_eq!(what, "huge table"),
            other => panic!("unexpected error: {other}"),
        }
    }
}

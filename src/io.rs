// File-level helpers around the in-memory core.
//
// The engine only ever sees byte slices.  These helpers read both inputs
// fully into memory (the old buffer has to be indexed as a whole anyway),
// optionally digesting them with SHA-256 on the way in (`file-io` feature),
// and can verify a delta by replaying it.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;
use thiserror::Error;

use crate::engine::{DeltaSession, DiffOptions};
use crate::error::{ApplyError, DiffError};
use crate::ops::{Delta, DeltaStats, apply_controls};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `diff_files()`.
#[derive(Debug, Clone)]
pub struct DiffStats {
    /// Old file size in bytes.
    pub old_size: u64,
    /// New file size in bytes.
    pub new_size: u64,
    /// Shape of the produced delta.
    pub delta: DeltaStats,
    /// Whether the delta was replayed and compared against the new file.
    pub verified: bool,
    /// SHA-256 of the old file (if `file-io` feature is enabled).
    pub old_sha256: Option<[u8; 32]>,
    /// SHA-256 of the new file (if `file-io` feature is enabled).
    pub new_sha256: Option<[u8; 32]>,
}

/// A file read into memory.
#[derive(Debug, Clone)]
pub struct Input {
    pub bytes: Vec<u8>,
    pub sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file-level operations.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("diff error: {0}")]
    Diff(#[from] DiffError),

    #[error("apply error: {0}")]
    Apply(#[from] ApplyError),

    /// Replaying the delta did not reproduce the new file.
    #[error("verification failed: output differs from new file at byte {position}")]
    VerifyMismatch { position: usize },
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

/// Read a whole file, hashing it as it streams in.
pub fn read_input(path: &Path) -> Result<Input, IoError> {
    let file = File::open(path)?;
    let size_hint = file.metadata().map(|m| m.len() as usize).unwrap_or(0);
    let mut reader = BufReader::with_capacity(BUF_SIZE, file);

    let mut bytes = Vec::with_capacity(size_hint);
    #[cfg(feature = "file-io")]
    let mut hasher = sha2::Sha256::new();

    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        #[cfg(feature = "file-io")]
        hasher.update(&buf[..n]);
        bytes.extend_from_slice(&buf[..n]);
    }

    #[cfg(feature = "file-io")]
    let sha256 = Some(hasher.finalize().into());
    #[cfg(not(feature = "file-io"))]
    let sha256: Option<[u8; 32]> = None;

    Ok(Input { bytes, sha256 })
}

/// Lowercase hex rendering of a digest.
pub fn hex(digest: &[u8]) -> String {
    use std::fmt::Write;
    digest.iter().fold(String::with_capacity(digest.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

// ---------------------------------------------------------------------------
// Diffing
// ---------------------------------------------------------------------------

/// Check that `delta` rebuilds `new` from `old`, both as a tagged stream and
/// through its control records.
pub fn verify(delta: &Delta, old: &[u8], new: &[u8]) -> Result<(), IoError> {
    let rebuilt = delta.apply(old)?;
    check_same(&rebuilt, new)?;
    let replayed = apply_controls(old, &delta.controls())?;
    check_same(&replayed, new)
}

fn check_same(got: &[u8], want: &[u8]) -> Result<(), IoError> {
    match got.iter().zip(want).position(|(a, b)| a != b) {
        Some(position) => Err(IoError::VerifyMismatch { position }),
        None if got.len() != want.len() => Err(IoError::VerifyMismatch {
            position: got.len().min(want.len()),
        }),
        None => Ok(()),
    }
}

/// Diff two files.  When `verify_output` is set the delta is replayed
/// before returning.
pub fn diff_files(
    old_path: &Path,
    new_path: &Path,
    options: &DiffOptions,
    verify_output: bool,
) -> Result<(Delta, DiffStats), IoError> {
    let old = read_input(old_path)?;
    let new = read_input(new_path)?;
    let old_size = old.bytes.len() as u64;
    let new_size = new.bytes.len() as u64;

    let session = DeltaSession::new(old.bytes, options)?;
    let delta = session.diff(&new.bytes);
    if verify_output {
        verify(&delta, session.old(), &new.bytes)?;
    }

    let stats = DiffStats {
        old_size,
        new_size,
        delta: delta.stats(),
        verified: verify_output,
        old_sha256: old.sha256,
        new_sha256: new.sha256,
    };
    Ok((delta, stats))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

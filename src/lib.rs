//! pkgdelta: bsdiff-family binary delta construction in Rust.
//!
//! Given an old and a new byte buffer, the crate produces a sequence of
//! copy-from-old and literal-extra operations that rebuilds the new buffer.
//! Two interchangeable matchers find the copies:
//! - a suffix array over the old buffer (`matcher::suffix`), exact and slower
//! - a block hash index (`matcher::hashed`), faster with coarser matches
//!
//! The crate provides:
//! - The matchers and their tuning (`matcher`)
//! - The driver loop and reusable sessions (`engine`)
//! - Delta operations, control records and replay (`ops`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use pkgdelta::engine;
//!
//! let old = b"hello old world";
//! let new = b"hello new world";
//!
//! let delta = engine::diff(old, new).unwrap();
//! let rebuilt = delta.apply(old).unwrap();
//! assert_eq!(rebuilt, new);
//! ```

pub mod engine;
pub mod error;
pub mod extend;
pub mod io;
pub mod matcher;
pub mod ops;

#[cfg(feature = "cli")]
pub mod cli;

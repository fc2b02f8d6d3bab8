//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`MotionError`] separates failures by how a caller is
//! expected to react:
//! - Malformed data (bad magic, truncated records, negative lengths) aborts
//!   the load and is never worth retrying.
//! - An unsuitable pose cache (hash or layout mismatch against the live
//!   skeleton) is recoverable: fall back to live posing.
//! - I/O failures are passed through untouched.
//!
//! Name lookups that miss, IK non-convergence and physics step caps are not
//! errors at all. Mis-sized output buffers are programmer errors and panic.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mmd_motion::errors::{MotionError, Result};
//!
//! fn open_cache() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for motion assets, pose caches and workers.
#[derive(Error, Debug)]
pub enum MotionError {
    // ========================================================================
    // Data Errors
    // ========================================================================
    /// The data is malformed: wrong magic, unsupported version, negative
    /// counts or records cut short.
    #[error("Malformed data: {0}")]
    Format(String),

    /// The data is well-formed but was produced for a different skeleton.
    #[error("Pose cache not applicable to this skeleton: {0}")]
    Unsuitable(String),

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // ========================================================================
    // Async & Threading Errors
    // ========================================================================
    /// A background worker thread panicked or could not be joined.
    #[error("Worker error: {0}")]
    Worker(String),
}

impl MotionError {
    /// Whether the caller can carry on by computing poses live instead.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MotionError::Unsuitable(_))
    }

    /// Maps an I/O error raised while decoding a fixed layout. A short read
    /// means the record was truncated, which is a format error rather than
    /// an I/O failure.
    pub(crate) fn from_read(err: io::Error, what: &str) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            MotionError::Format(format!("truncated {what}"))
        } else {
            MotionError::Io(err)
        }
    }
}

/// Alias for `Result<T, MotionError>`.
pub type Result<T> = std::result::Result<T, MotionError>;

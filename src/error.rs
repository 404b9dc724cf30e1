//! Error types for the safe layer of trueno-dense
//!
//! The dense kernels themselves never fail: malformed shapes are the caller's
//! responsibility and an indefinite matrix simply produces NaN. These errors are
//! only produced by view construction, descriptor validation, block splitting and
//! the launch drivers.

use thiserror::Error;

/// Result type for trueno-dense operations
pub type Result<T> = std::result::Result<T, DenseError>;

/// Errors that can occur while preparing or launching dense primitives
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DenseError {
    /// Buffer is too small for the declared shape
    #[error("Size mismatch: expected {expected}, got {actual}")]
    SizeMismatch {
        /// Required number of elements
        expected: usize,
        /// Number of elements actually supplied
        actual: usize,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A batch element's block runs past the end of its backing buffer
    #[error("Batch element {batch} ends at {end}, past buffer length {len}")]
    OutOfBounds {
        /// Offending batch element
        batch: usize,
        /// One past the last element of its block
        end: usize,
        /// Length of the backing buffer
        len: usize,
    },

    /// Two batch elements claim overlapping regions of the same buffer
    #[error("Blocks of batch elements {first} and {second} overlap")]
    OverlappingBlocks {
        /// Batch element with the lower start offset
        first: usize,
        /// Batch element that starts inside `first`'s block
        second: usize,
    },

    /// Descriptor tables describe zero batch elements
    #[error("Empty batch")]
    EmptyBatch,
}

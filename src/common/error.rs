//! Error types for slabtable.

use thiserror::Error;

use super::BufferKey;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors raised by the buffer table.
///
/// None of these are fatal to the table itself: every operation that
/// fails unwinds its partial locks and allocations before returning.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Storage for a buffer or a session registry could not be reserved,
    /// or a requested region is larger than the table hands out.
    #[error("allocation failed (user: {user_size} bytes, kernel: {kernel_size} bytes)")]
    AllocationFailed { user_size: usize, kernel_size: usize },

    /// The generated key is already present in the index.
    ///
    /// Ids are never reused, so this indicates a bug in id generation.
    #[error("{0} already present in buffer table")]
    DuplicateKey(BufferKey),

    /// No live buffer matches the key (stale id or double free).
    #[error("{0} not found")]
    NotFound(BufferKey),
}

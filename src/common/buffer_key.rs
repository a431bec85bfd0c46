//! Composite key for the buffer table index.

use std::fmt;

use super::{BufferId, SessionId};

/// `(session, buffer)` pair uniquely identifying one buffer.
///
/// Keys order lexicographically: by session first, then by buffer id.
/// Field order matters here since `Ord` is derived; it keeps all of a
/// session's buffers contiguous in the index.
///
/// # Example
/// ```
/// use slabtable::{BufferKey, BufferId, SessionId};
///
/// let a = BufferKey::new(SessionId::new(1), BufferId::new(9));
/// let b = BufferKey::new(SessionId::new(2), BufferId::new(0));
/// assert!(a < b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferKey {
    pub session: SessionId,
    pub buffer: BufferId,
}

impl BufferKey {
    /// Create a key from its parts.
    #[inline]
    pub fn new(session: SessionId, buffer: BufferId) -> Self {
        Self { session, buffer }
    }

    /// Smallest key belonging to `session`.
    #[inline]
    pub fn session_start(session: SessionId) -> Self {
        Self::new(session, BufferId(0))
    }

    /// Largest key belonging to `session`.
    #[inline]
    pub fn session_end(session: SessionId) -> Self {
        Self::new(session, BufferId(u64::MAX))
    }
}

impl fmt::Display for BufferKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({}, {})", self.session.0, self.buffer.0)
    }
}

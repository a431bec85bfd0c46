//! Buffer identifier type.

use std::fmt;

/// Identifies a buffer within its session.
///
/// Ids come from a single table-wide counter and are never reused, so a
/// stale id held by a client can not alias a newer buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

impl BufferId {
    /// Create a new BufferId.
    #[inline]
    pub fn new(id: u64) -> Self {
        BufferId(id)
    }
}

impl From<u64> for BufferId {
    fn from(id: u64) -> Self {
        BufferId(id)
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buffer({})", self.0)
    }
}

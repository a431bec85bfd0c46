//! Session identifier type.

use std::fmt;

/// Identifies a client session (the process-like owner of buffers).
///
/// Using `u32` to match the width of a process id on the platforms
/// sessions are usually keyed by.
///
/// # Example
/// ```
/// use slabtable::SessionId;
///
/// let session = SessionId::new(7);
/// assert_eq!(session.0, 7);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u32);

impl SessionId {
    /// Create a new SessionId.
    #[inline]
    pub fn new(id: u32) -> Self {
        SessionId(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_new() {
        let sid = SessionId::new(42);
        assert_eq!(sid.0, 42);
    }

    #[test]
    fn test_session_id_ordering() {
        assert!(SessionId::new(1) < SessionId::new(2));
        assert!(SessionId::new(9) > SessionId::new(3));
    }

    #[test]
    fn test_session_id_display() {
        assert_eq!(format!("{}", SessionId::new(7)), "Session(7)");
    }
}

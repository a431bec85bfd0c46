//! Session - a client's handle onto the shared buffer table.

use std::fmt;
use std::sync::Arc;

use crate::buffer::{BufferSlab, BufferTable, SessionRegistry, SlabReadGuard, SlabWriteGuard};
use crate::common::{BufferId, Result, SessionId};

/// One client session's view of a [`BufferTable`].
///
/// Owns the session's [`SessionRegistry`]. Closing or dropping the session
/// releases every buffer it still owns, exactly once; since `close` takes
/// the session by value, two threads can never tear down the same session.
///
/// Guards obtained through the session must be dropped before the session
/// is closed, or teardown waits on them forever.
///
/// # Example
/// ```
/// use slabtable::{BufferTable, SessionId};
/// use std::sync::Arc;
///
/// let table = Arc::new(BufferTable::with_defaults());
/// let session = table.open_session(SessionId::new(7)).unwrap();
///
/// session.allocate(4096, 256).unwrap();
/// session.allocate(4096, 256).unwrap();
/// assert_eq!(table.len(), 2);
///
/// assert_eq!(session.close(), 2);
/// assert!(table.is_empty());
/// ```
pub struct Session {
    table: Arc<BufferTable>,
    registry: SessionRegistry,
    closed: bool,
}

impl Session {
    pub(crate) fn new(table: Arc<BufferTable>, registry: SessionRegistry) -> Self {
        Self {
            table,
            registry,
            closed: false,
        }
    }

    #[inline]
    pub fn id(&self) -> SessionId {
        self.registry.session_id()
    }

    pub fn table(&self) -> &Arc<BufferTable> {
        &self.table
    }

    /// Allocate a buffer owned by this session.
    ///
    /// # Errors
    /// See [`BufferTable::allocate`].
    pub fn allocate(&self, user_size: usize, kernel_size: usize) -> Result<BufferSlab> {
        self.table.allocate(user_size, kernel_size, &self.registry)
    }

    /// Free one of this session's buffers.
    ///
    /// # Errors
    /// - `Error::NotFound` if the session owns no such buffer
    pub fn free(&self, buffer_id: BufferId) -> Result<()> {
        self.table.free(buffer_id, &self.registry)
    }

    /// Look up one of this session's buffers for reading.
    ///
    /// # Errors
    /// - `Error::NotFound` if no such buffer is live
    pub fn get(&self, buffer_id: BufferId) -> Result<SlabReadGuard> {
        self.table.get(buffer_id, self.id())
    }

    /// Look up one of this session's buffers for writing.
    ///
    /// # Errors
    /// - `Error::NotFound` if no such buffer is live
    pub fn get_mut(&self, buffer_id: BufferId) -> Result<SlabWriteGuard> {
        self.table.get_mut(buffer_id, self.id())
    }

    /// Ids of the buffers this session currently owns, ascending.
    pub fn buffer_ids(&self) -> Vec<BufferId> {
        self.registry.keys().into_iter().map(|key| key.buffer).collect()
    }

    pub fn buffer_count(&self) -> usize {
        self.registry.len()
    }

    /// Release all of this session's buffers and end the session.
    ///
    /// Returns how many buffers were released.
    pub fn close(mut self) -> usize {
        self.teardown()
    }

    fn teardown(&mut self) -> usize {
        if self.closed {
            return 0;
        }
        self.closed = true;
        self.table.teardown_session(&self.registry)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id())
            .field("buffers", &self.buffer_count())
            .field("closed", &self.closed)
            .finish()
    }
}

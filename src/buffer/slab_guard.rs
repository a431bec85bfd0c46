//! RAII guards for buffer content access.
//!
//! These guards are the release mechanism for the content lock:
//! - [`SlabReadGuard`] - Shared access (multiple allowed)
//! - [`SlabWriteGuard`] - Exclusive access
//!
//! Each guard owns a reference to the content, so it stays valid after
//! the table lock it was acquired under has been dropped. Dropping the
//! guard (or calling `release`) unlocks the content.
//!
//! Don't call back into the table while holding a guard: not `allocate`,
//! `free` or session teardown, and not `get` / `get_mut` of any buffer.
//! Removal of the guarded buffer holds the exclusive table lock while it
//! waits for the guard, so every other table operation queues behind it;
//! a lookup of the guarded buffer likewise holds the shared table lock
//! while it waits. Either way the guard's own thread ends up waiting on
//! itself.

use std::fmt;
use std::ops::{Deref, DerefMut};

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::RawRwLock;

use crate::buffer::SlabContent;
use crate::common::{BufferId, BufferKey};

/// Guard for shared access to a buffer's content.
///
/// # Example
/// ```
/// use slabtable::{BufferTable, SessionId};
/// use std::sync::Arc;
///
/// let table = Arc::new(BufferTable::with_defaults());
/// let session = table.open_session(SessionId::new(7)).unwrap();
/// let slab = session.allocate(4096, 256).unwrap();
///
/// let guard = session.get(slab.buffer_id()).unwrap();
/// assert_eq!(guard.user().len(), 4096);
/// guard.release();
/// ```
pub struct SlabReadGuard {
    key: BufferKey,
    lock: ArcRwLockReadGuard<RawRwLock, SlabContent>,
}

impl SlabReadGuard {
    pub(crate) fn new(key: BufferKey, lock: ArcRwLockReadGuard<RawRwLock, SlabContent>) -> Self {
        Self { key, lock }
    }

    #[inline]
    pub fn key(&self) -> BufferKey {
        self.key
    }

    #[inline]
    pub fn buffer_id(&self) -> BufferId {
        self.key.buffer
    }

    /// Unlock the content now instead of at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for SlabReadGuard {
    type Target = SlabContent;

    #[inline]
    fn deref(&self) -> &SlabContent {
        &self.lock
    }
}

impl fmt::Debug for SlabReadGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlabReadGuard")
            .field("key", &self.key)
            .field("content", &*self.lock)
            .finish()
    }
}

/// Guard for exclusive access to a buffer's content.
pub struct SlabWriteGuard {
    key: BufferKey,
    lock: ArcRwLockWriteGuard<RawRwLock, SlabContent>,
}

impl SlabWriteGuard {
    pub(crate) fn new(key: BufferKey, lock: ArcRwLockWriteGuard<RawRwLock, SlabContent>) -> Self {
        Self { key, lock }
    }

    #[inline]
    pub fn key(&self) -> BufferKey {
        self.key
    }

    #[inline]
    pub fn buffer_id(&self) -> BufferId {
        self.key.buffer
    }

    /// Unlock the content now instead of at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for SlabWriteGuard {
    type Target = SlabContent;

    #[inline]
    fn deref(&self) -> &SlabContent {
        &self.lock
    }
}

impl DerefMut for SlabWriteGuard {
    #[inline]
    fn deref_mut(&mut self) -> &mut SlabContent {
        &mut self.lock
    }
}

impl fmt::Debug for SlabWriteGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlabWriteGuard")
            .field("key", &self.key)
            .field("content", &*self.lock)
            .finish()
    }
}

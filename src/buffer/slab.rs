//! BufferSlab - the storage behind one table entry.
//!
//! A [`BufferSlab`] pairs a [`BufferKey`] with its [`SlabContent`]:
//! - The kernel-side payload region
//! - The user-exchange region shared with the session
//!
//! The content sits behind its own `RwLock`, independent of the table
//! lock. Any code touching payload bytes holds that lock.

use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::buffer::{SlabReadGuard, SlabWriteGuard};
use crate::common::{BufferId, BufferKey, Error, Result, SessionId};

/// Payload regions of a buffer.
///
/// Both regions are zero-filled on allocation. Once the owning entry is
/// removed from the table the regions are dropped and the content is
/// marked released; handles still pointing at it can no longer lock it.
pub struct SlabContent {
    kernel: Box<[u8]>,
    user: Box<[u8]>,
    released: bool,
}

impl SlabContent {
    /// Reserve both regions, reporting exhaustion instead of aborting.
    pub(crate) fn try_new(user_size: usize, kernel_size: usize) -> Result<Self> {
        let failed = || Error::AllocationFailed {
            user_size,
            kernel_size,
        };

        let kernel = zeroed(kernel_size).ok_or_else(failed)?;
        // On failure `kernel` drops here, so nothing leaks.
        let user = zeroed(user_size).ok_or_else(failed)?;

        Ok(Self {
            kernel,
            user,
            released: false,
        })
    }

    /// Kernel-side payload.
    #[inline]
    pub fn kernel(&self) -> &[u8] {
        &self.kernel
    }

    #[inline]
    pub fn kernel_mut(&mut self) -> &mut [u8] {
        &mut self.kernel
    }

    /// Region exchanged with the session's memory.
    #[inline]
    pub fn user(&self) -> &[u8] {
        &self.user
    }

    #[inline]
    pub fn user_mut(&mut self) -> &mut [u8] {
        &mut self.user
    }

    /// Whether the owning entry has been freed.
    #[inline]
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Drop both regions. Caller holds the exclusive content lock and has
    /// already made the entry unreachable through the table.
    pub(crate) fn release(&mut self) {
        self.kernel = Box::default();
        self.user = Box::default();
        self.released = true;
    }
}

impl fmt::Debug for SlabContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlabContent")
            .field("kernel_len", &self.kernel.len())
            .field("user_len", &self.user.len())
            .field("released", &self.released)
            .finish()
    }
}

fn zeroed(size: usize) -> Option<Box<[u8]>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size).ok()?;
    buf.resize(size, 0);
    Some(buf.into_boxed_slice())
}

/// Handle to a buffer in the table.
///
/// Cloning a handle is cheap; all clones share the same content and the
/// same content lock. The table keeps one clone in its index; `allocate`
/// hands another back to the caller.
///
/// # Thread Safety
/// - `key`: immutable once assigned
/// - `content`: `Arc<RwLock<_>>` so guards can outlive the table lock
///   they were taken under (hand-over-hand)
#[derive(Clone)]
pub struct BufferSlab {
    key: BufferKey,
    content: Arc<RwLock<SlabContent>>,
}

impl BufferSlab {
    pub(crate) fn new(key: BufferKey, content: Arc<RwLock<SlabContent>>) -> Self {
        Self { key, content }
    }

    #[inline]
    pub fn key(&self) -> BufferKey {
        self.key
    }

    #[inline]
    pub fn buffer_id(&self) -> BufferId {
        self.key.buffer
    }

    #[inline]
    pub fn session_id(&self) -> SessionId {
        self.key.session
    }

    // ========================================================================
    // Content access through the handle
    // ========================================================================

    /// Lock the content for reading.
    ///
    /// # Errors
    /// - `Error::NotFound` if the buffer has been freed
    pub fn read(&self) -> Result<SlabReadGuard> {
        let guard = self.read_guard();
        if guard.is_released() {
            return Err(Error::NotFound(self.key));
        }
        Ok(guard)
    }

    /// Lock the content for writing.
    ///
    /// # Errors
    /// - `Error::NotFound` if the buffer has been freed
    pub fn write(&self) -> Result<SlabWriteGuard> {
        let guard = self.write_guard();
        if guard.is_released() {
            return Err(Error::NotFound(self.key));
        }
        Ok(guard)
    }

    /// Whether both handles refer to the same underlying storage.
    #[inline]
    pub fn same_storage(&self, other: &BufferSlab) -> bool {
        Arc::ptr_eq(&self.content, &other.content)
    }

    /// Whether anyone currently holds the content lock, in either mode.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.content.is_locked()
    }

    #[inline]
    pub fn is_locked_exclusive(&self) -> bool {
        self.content.is_locked_exclusive()
    }

    // ========================================================================
    // Internal: used by the table under its own locks
    // ========================================================================

    pub(crate) fn read_guard(&self) -> SlabReadGuard {
        SlabReadGuard::new(self.key, self.content.read_arc())
    }

    pub(crate) fn write_guard(&self) -> SlabWriteGuard {
        SlabWriteGuard::new(self.key, self.content.write_arc())
    }

    /// Exclusive content lock held for the rest of a removal.
    pub(crate) fn lock_for_removal(&self) -> RwLockWriteGuard<'_, SlabContent> {
        self.content.write()
    }
}

impl fmt::Debug for BufferSlab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferSlab")
            .field("key", &self.key)
            .field("locked", &self.is_locked())
            .finish()
    }
}

//! Per-session list of allocated buffer keys.
//!
//! A [`SessionRegistry`] lets a session enumerate and bulk-release its own
//! buffers without scanning the whole table. It stores keys only; the
//! table's index stays the single owner of every buffer.

use std::collections::HashSet;

use parking_lot::{Mutex, MutexGuard};

use crate::common::{BufferKey, Error, Result, SessionId};

/// The keys owned by one session. Only reachable through the registry lock.
#[derive(Debug, Default)]
pub(crate) struct SessionList {
    keys: HashSet<BufferKey>,
    closed: bool,
}

impl SessionList {
    /// Mark the session torn down. Returns true only the first time.
    pub(crate) fn mark_closed(&mut self) -> bool {
        !std::mem::replace(&mut self.closed, true)
    }

    /// Make room for one more key so a later `add` cannot allocate.
    pub(crate) fn reserve_one(&mut self) -> bool {
        self.keys.try_reserve(1).is_ok()
    }

    pub(crate) fn add(&mut self, key: BufferKey) {
        self.keys.insert(key);
    }

    pub(crate) fn remove(&mut self, key: &BufferKey) -> bool {
        self.keys.remove(key)
    }

    pub(crate) fn contains(&self, key: &BufferKey) -> bool {
        self.keys.contains(key)
    }

    pub(crate) fn drain(&mut self) -> Vec<BufferKey> {
        let mut keys: Vec<BufferKey> = self.keys.drain().collect();
        keys.sort_unstable();
        keys
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Registry of the buffers one session has allocated.
///
/// # Thread Safety
/// The list sits behind a `Mutex`. When a table operation needs both the
/// registry and the table, it always takes the registry first.
#[derive(Debug)]
pub struct SessionRegistry {
    session_id: SessionId,
    list: Mutex<SessionList>,
}

impl SessionRegistry {
    /// Create an empty registry for `session_id` with room for `capacity` keys.
    ///
    /// # Errors
    /// - `Error::AllocationFailed` if the initial list storage can't be reserved
    pub fn attach(session_id: SessionId, capacity: usize) -> Result<Self> {
        let mut list = SessionList::default();
        list.keys
            .try_reserve(capacity)
            .map_err(|_| Error::AllocationFailed {
                user_size: 0,
                kernel_size: capacity.saturating_mul(std::mem::size_of::<BufferKey>()),
            })?;

        Ok(Self {
            session_id,
            list: Mutex::new(list),
        })
    }

    #[inline]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Record `key` as owned by this session.
    pub fn add(&self, key: BufferKey) {
        debug_assert_eq!(key.session, self.session_id);
        self.list.lock().add(key);
    }

    /// Forget `key`. Returns false if it wasn't recorded.
    pub fn remove(&self, key: &BufferKey) -> bool {
        self.list.lock().remove(key)
    }

    pub fn contains(&self, key: &BufferKey) -> bool {
        self.list.lock().contains(key)
    }

    /// Like [`contains`](Self::contains), but returns `None` instead of
    /// waiting when the registry is locked by an operation in progress.
    pub fn try_contains(&self, key: &BufferKey) -> Option<bool> {
        self.list.try_lock().map(|list| list.contains(key))
    }

    /// Take every recorded key, leaving the registry empty.
    pub fn drain(&self) -> Vec<BufferKey> {
        self.list.lock().drain()
    }

    /// Snapshot of the recorded keys in index order.
    pub fn keys(&self) -> Vec<BufferKey> {
        let mut keys: Vec<BufferKey> = self.list.lock().keys.iter().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.list.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Acquire the registry lock. Table operations go through
    /// `BufferTable::lock_session`, which takes this before the table lock.
    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionList> {
        self.list.lock()
    }
}

//! Buffer Table - the ordered index of every live buffer.
//!
//! The [`BufferTable`] provides:
//! - Allocation of per-session buffers with table-wide unique ids
//! - Lookup by `(session, buffer)` with hand-over-hand content locking
//! - Explicit free and bulk release of a session's buffers
//!
//! # Lock Order
//! Three kinds of lock are involved: the session registry lock, the table
//! lock, and each buffer's content lock. Every operation takes them in
//! this order, with the one exception described below:
//!
//! ```text
//!   allocate / free / teardown:  registry → table → content
//!   get / get_mut:                           table → content
//! ```
//!
//! The table's exclusive lock is only reachable through
//! `SessionTableLock`, which is built from the registry lock, so the
//! mutating paths can't take the pair out of order.
//!
//! `allocate` is the one exception: it locks the new buffer's content
//! before the registry and table. That content isn't in the index yet, so
//! no other thread can be holding or waiting on it. It stays locked until
//! the key is in both the index and the registry, so a racing lookup
//! blocks until construction is done.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{MutexGuard, RwLock, RwLockWriteGuard};
use tracing::{debug, trace, warn};

use crate::buffer::session_registry::SessionList;
use crate::buffer::{
    BufferSlab, Session, SessionRegistry, SlabContent, SlabReadGuard, SlabWriteGuard, TableStats,
};
use crate::common::{BufferId, BufferKey, Error, Result, SessionId, TableConfig};

/// Ordered map from key to buffer. Only touched under the table lock.
#[derive(Debug, Default)]
pub(crate) struct BufferIndex {
    map: BTreeMap<BufferKey, BufferSlab>,
}

impl BufferIndex {
    /// Insert `slab` under its key. Returns false, leaving the index
    /// unchanged, if the key is already present.
    pub(crate) fn insert(&mut self, slab: BufferSlab) -> bool {
        use std::collections::btree_map::Entry;

        match self.map.entry(slab.key()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(slab);
                true
            }
        }
    }

    pub(crate) fn find(&self, key: &BufferKey) -> Option<&BufferSlab> {
        self.map.get(key)
    }

    pub(crate) fn erase(&mut self, key: &BufferKey) -> Option<BufferSlab> {
        self.map.remove(key)
    }

    pub(crate) fn session_keys(&self, session: SessionId) -> Vec<BufferKey> {
        self.map
            .range(BufferKey::session_start(session)..=BufferKey::session_end(session))
            .map(|(key, _)| *key)
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }
}

/// Registry lock and exclusive table lock, held together.
///
/// Constructing one is the only way the mutating operations reach the
/// index, and it always locks the registry before the table.
struct SessionTableLock<'a> {
    list: MutexGuard<'a, SessionList>,
    index: RwLockWriteGuard<'a, BufferIndex>,
}

/// Table of every live buffer, shared by all sessions.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                        BufferTable                           │
/// │  ┌────────────────────────────┐   ┌───────────────────────┐  │
/// │  │ index: RwLock<BTreeMap>    │   │ next_id: AtomicU64    │  │
/// │  │ (session, id) → BufferSlab │   └───────────────────────┘  │
/// │  └─────────────┬──────────────┘                              │
/// │                ▼                                             │
/// │  ┌────────────────────────────┐   ┌───────────────────────┐  │
/// │  │ BufferSlab                 │◀──│ SessionRegistry (one  │  │
/// │  │ RwLock<SlabContent>        │   │ per session): keys    │  │
/// │  └────────────────────────────┘   └───────────────────────┘  │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `index`: `RwLock`; lookups share it, insert/erase take it exclusively
/// - `next_id`: atomic, never reset, so ids are not reused
/// - `stats`: all atomic counters
///
/// # Usage
/// ```
/// use slabtable::{BufferTable, SessionId};
/// use std::sync::Arc;
///
/// let table = Arc::new(BufferTable::with_defaults());
/// let session = table.open_session(SessionId::new(7)).unwrap();
///
/// let slab = session.allocate(4096, 256).unwrap();
/// {
///     let guard = table.get(slab.buffer_id(), SessionId::new(7)).unwrap();
///     assert_eq!(guard.kernel().len(), 256);
/// }
/// session.free(slab.buffer_id()).unwrap();
/// assert!(table.is_empty());
/// ```
#[derive(Debug)]
pub struct BufferTable {
    index: RwLock<BufferIndex>,
    next_id: AtomicU64,
    config: TableConfig,
    stats: TableStats,
}

impl BufferTable {
    /// Create an empty table.
    pub fn new(config: TableConfig) -> Self {
        Self {
            index: RwLock::new(BufferIndex::default()),
            next_id: AtomicU64::new(0),
            config,
            stats: TableStats::new(),
        }
    }

    /// Create an empty table with [`TableConfig::default`].
    pub fn with_defaults() -> Self {
        Self::new(TableConfig::default())
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn stats(&self) -> &TableStats {
        &self.stats
    }

    /// Fresh table-wide buffer id. Strictly increasing across all callers.
    pub fn next_id(&self) -> BufferId {
        BufferId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // ========================================================================
    // Public API: Sessions
    // ========================================================================

    /// Attach a new session and return a handle that releases its buffers
    /// when closed or dropped.
    ///
    /// # Errors
    /// - `Error::AllocationFailed` if the session registry can't be created
    pub fn open_session(self: &Arc<Self>, session_id: SessionId) -> Result<Session> {
        let registry = self.attach_session(session_id)?;
        Ok(Session::new(Arc::clone(self), registry))
    }

    /// Create a bare registry for `session_id`. The caller is responsible
    /// for passing it to [`teardown_session`](Self::teardown_session).
    ///
    /// # Errors
    /// - `Error::AllocationFailed` if the registry storage can't be reserved
    pub fn attach_session(&self, session_id: SessionId) -> Result<SessionRegistry> {
        let registry = SessionRegistry::attach(session_id, self.config.session_capacity)?;
        TableStats::bump(&self.stats.sessions_opened);
        debug!(session = session_id.0, "session attached");
        Ok(registry)
    }

    /// Release every buffer recorded in `registry`, leaving it empty.
    ///
    /// Returns how many buffers were released. Calling this on an empty
    /// registry is a no-op. Concurrent teardown of the same registry must be
    /// prevented by the caller; [`Session`] does so by ownership.
    pub fn teardown_session(&self, registry: &SessionRegistry) -> usize {
        let mut lock = self.lock_session(registry);

        let first_teardown = lock.list.mark_closed();
        let mut released = 0;
        for key in lock.list.drain() {
            let Some(slab) = lock.index.find(&key).cloned() else {
                warn!(%key, "session listed a buffer missing from the table");
                continue;
            };

            // Held until the storage is gone; no one can reach the entry again.
            let mut content = slab.lock_for_removal();
            lock.index.erase(&key);
            content.release();
            released += 1;
        }
        drop(lock);

        self.stats
            .buffers_reclaimed
            .fetch_add(released as u64, Ordering::Relaxed);
        if first_teardown {
            TableStats::bump(&self.stats.sessions_closed);
        }
        debug!(session = registry.session_id().0, released, "session torn down");
        released
    }

    // ========================================================================
    // Public API: Allocate and free
    // ========================================================================

    /// Allocate a buffer owned by `registry`'s session.
    ///
    /// The buffer is visible in the table and in the registry before this
    /// returns, and never partly visible: a racing lookup either misses it or
    /// waits for construction to finish.
    ///
    /// # Errors
    /// - `Error::AllocationFailed` if storage can't be reserved or either
    ///   region exceeds the configured limit
    /// - `Error::DuplicateKey` if the generated key is already present
    pub fn allocate(
        &self,
        user_size: usize,
        kernel_size: usize,
        registry: &SessionRegistry,
    ) -> Result<BufferSlab> {
        self.allocate_internal(user_size, kernel_size, registry)
            .inspect_err(|err| {
                TableStats::bump(&self.stats.allocation_failures);
                warn!(
                    session = registry.session_id().0,
                    user_size, kernel_size, %err, "allocate failed"
                );
            })
    }

    /// Free buffer `buffer_id` of `registry`'s session.
    ///
    /// Waits for any reader or writer still holding the content lock, then
    /// drops the storage. Freeing an unknown or already freed id is reported
    /// and otherwise has no effect.
    ///
    /// # Errors
    /// - `Error::NotFound` if the session owns no such buffer
    pub fn free(&self, buffer_id: BufferId, registry: &SessionRegistry) -> Result<()> {
        let key = BufferKey::new(registry.session_id(), buffer_id);
        let mut lock = self.lock_session(registry);

        let slab = match lock.index.find(&key).cloned() {
            Some(slab) if lock.list.contains(&key) => slab,
            found => {
                let in_table = found.is_some();
                drop(lock);
                TableStats::bump(&self.stats.free_misses);
                warn!(%key, in_table, "free of a buffer this session does not own");
                return Err(Error::NotFound(key));
            }
        };

        // Blocks until current readers are done; nobody can find the entry
        // while we wait since the table lock is held.
        let mut content = slab.lock_for_removal();
        lock.index.erase(&key);
        lock.list.remove(&key);
        drop(lock);

        content.release();
        drop(content);

        TableStats::bump(&self.stats.frees);
        debug!(%key, "buffer freed");
        Ok(())
    }

    // ========================================================================
    // Public API: Lookup
    // ========================================================================

    /// Look up a buffer and lock its content for reading.
    ///
    /// The content lock is taken before the table lock is released, so the
    /// buffer can't be freed between lookup and return. It stays locked
    /// until the returned guard is dropped.
    ///
    /// # Errors
    /// - `Error::NotFound` if no such buffer is live
    pub fn get(&self, buffer_id: BufferId, session_id: SessionId) -> Result<SlabReadGuard> {
        self.lookup(BufferKey::new(session_id, buffer_id), BufferSlab::read_guard)
    }

    /// Like [`get`](Self::get), but locks the content exclusively.
    ///
    /// # Errors
    /// - `Error::NotFound` if no such buffer is live
    pub fn get_mut(&self, buffer_id: BufferId, session_id: SessionId) -> Result<SlabWriteGuard> {
        self.lookup(BufferKey::new(session_id, buffer_id), BufferSlab::write_guard)
    }

    // ========================================================================
    // Public API: Inspection
    // ========================================================================

    pub fn contains(&self, key: &BufferKey) -> bool {
        self.index.read().find(key).is_some()
    }

    /// Number of live buffers across all sessions.
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of every live buffer of `session_id`, in index order.
    pub fn session_keys(&self, session_id: SessionId) -> Vec<BufferKey> {
        self.index.read().session_keys(session_id)
    }

    // ========================================================================
    // Internal
    // ========================================================================

    /// Take the registry lock, then the exclusive table lock.
    fn lock_session<'a>(&'a self, registry: &'a SessionRegistry) -> SessionTableLock<'a> {
        let list = registry.lock();
        let index = self.index.write();
        SessionTableLock { list, index }
    }

    fn allocate_internal(
        &self,
        user_size: usize,
        kernel_size: usize,
        registry: &SessionRegistry,
    ) -> Result<BufferSlab> {
        self.check_limits(user_size, kernel_size)?;

        let content = Arc::new(RwLock::new(SlabContent::try_new(user_size, kernel_size)?));
        // Under construction until it is in both the table and the registry.
        let construction = content.write();

        let mut lock = self.lock_session(registry);
        if !lock.list.reserve_one() {
            return Err(Error::AllocationFailed {
                user_size,
                kernel_size,
            });
        }

        let key = BufferKey::new(registry.session_id(), self.next_id());
        let slab = BufferSlab::new(key, Arc::clone(&content));
        if !lock.index.insert(slab.clone()) {
            return Err(Error::DuplicateKey(key));
        }

        let SessionTableLock { mut list, index } = lock;
        drop(index);
        list.add(key);
        drop(list);
        drop(construction);

        TableStats::bump(&self.stats.allocations);
        debug!(%key, user_size, kernel_size, "buffer allocated");
        Ok(slab)
    }

    /// Oversized requests fail the same way exhausted storage does.
    fn check_limits(&self, user_size: usize, kernel_size: usize) -> Result<()> {
        if user_size > self.config.max_user_size || kernel_size > self.config.max_kernel_size {
            return Err(Error::AllocationFailed {
                user_size,
                kernel_size,
            });
        }
        Ok(())
    }

    /// Find `key` under the shared table lock and lock its content with
    /// `lock_content` before letting go of the table.
    fn lookup<G>(&self, key: BufferKey, lock_content: impl FnOnce(&BufferSlab) -> G) -> Result<G> {
        let index = self.index.read();
        let Some(slab) = index.find(&key) else {
            drop(index);
            TableStats::bump(&self.stats.lookup_misses);
            trace!(%key, "lookup miss");
            return Err(Error::NotFound(key));
        };

        let guard = lock_content(slab);
        drop(index);

        TableStats::bump(&self.stats.lookups);
        Ok(guard)
    }
}

impl Default for BufferTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::thread;
    use std::time::Duration;

    fn create_table() -> Arc<BufferTable> {
        Arc::new(BufferTable::with_defaults())
    }

    fn key(session: u32, buffer: u64) -> BufferKey {
        BufferKey::new(SessionId::new(session), BufferId::new(buffer))
    }

    #[test]
    fn test_index_insert_find_erase() {
        let mut index = BufferIndex::default();
        let content = Arc::new(RwLock::new(SlabContent::try_new(1, 1).unwrap()));
        let slab = BufferSlab::new(key(1, 0), content);

        assert!(index.insert(slab.clone()));
        assert!(!index.insert(slab.clone()));
        assert_eq!(index.len(), 1);
        assert!(index.find(&key(1, 0)).is_some());

        assert!(index.erase(&key(1, 0)).is_some());
        assert!(index.erase(&key(1, 0)).is_none());
        assert!(index.find(&key(1, 0)).is_none());
    }

    #[test]
    fn test_index_session_keys_range() {
        let mut index = BufferIndex::default();
        for (s, b) in [(1, 5), (2, 0), (2, 3), (3, 1), (2, 9)] {
            let content = Arc::new(RwLock::new(SlabContent::try_new(0, 0).unwrap()));
            assert!(index.insert(BufferSlab::new(key(s, b), content)));
        }

        assert_eq!(index.session_keys(SessionId::new(2)), vec![key(2, 0), key(2, 3), key(2, 9)]);
        assert!(index.session_keys(SessionId::new(4)).is_empty());
    }

    #[test]
    fn test_next_id_is_monotonic() {
        let table = BufferTable::with_defaults();
        let ids: Vec<BufferId> = (0..5).map(|_| table.next_id()).collect();
        assert_eq!(ids, (0..5).map(BufferId::new).collect::<Vec<_>>());
    }

    #[test]
    fn test_allocate_get_free_scenario() {
        let table = create_table();
        let registry = table.attach_session(SessionId::new(7)).unwrap();

        let slab = table.allocate(4096, 256, &registry).unwrap();
        assert_eq!(slab.buffer_id(), BufferId::new(0));
        assert_eq!(slab.session_id(), SessionId::new(7));

        {
            let guard = table.get(BufferId::new(0), SessionId::new(7)).unwrap();
            assert_eq!(guard.user().len(), 4096);
            assert_eq!(guard.kernel().len(), 256);
        }

        table.free(BufferId::new(0), &registry).unwrap();
        assert_eq!(
            table.get(BufferId::new(0), SessionId::new(7)).unwrap_err(),
            Error::NotFound(key(7, 0))
        );
        assert_eq!(
            table.free(BufferId::new(0), &registry).unwrap_err(),
            Error::NotFound(key(7, 0))
        );
        assert!(registry.is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn test_ids_not_reused_after_free() {
        let table = create_table();
        let registry = table.attach_session(SessionId::new(7)).unwrap();

        let first = table.allocate(8, 8, &registry).unwrap();
        table.free(first.buffer_id(), &registry).unwrap();
        let second = table.allocate(8, 8, &registry).unwrap();

        assert_eq!(first.buffer_id(), BufferId::new(0));
        assert_eq!(second.buffer_id(), BufferId::new(1));
    }

    #[test]
    fn test_get_shares_storage_with_handle() {
        let table = create_table();
        let registry = table.attach_session(SessionId::new(1)).unwrap();
        let slab = table.allocate(16, 16, &registry).unwrap();

        slab.write().unwrap().user_mut()[3] = 0x5A;

        let guard = table.get(slab.buffer_id(), SessionId::new(1)).unwrap();
        assert_eq!(guard.user()[3], 0x5A);
    }

    #[test]
    fn test_get_mut_writes_are_visible() {
        let table = create_table();
        let registry = table.attach_session(SessionId::new(1)).unwrap();
        let slab = table.allocate(16, 16, &registry).unwrap();

        {
            let mut guard = table.get_mut(slab.buffer_id(), SessionId::new(1)).unwrap();
            guard.kernel_mut()[0] = 0x11;
        }

        assert_eq!(slab.read().unwrap().kernel()[0], 0x11);
    }

    #[test]
    fn test_get_wrong_session_is_not_found() {
        let table = create_table();
        let registry = table.attach_session(SessionId::new(1)).unwrap();
        let slab = table.allocate(8, 8, &registry).unwrap();

        let result = table.get(slab.buffer_id(), SessionId::new(2));
        assert_eq!(result.unwrap_err(), Error::NotFound(key(2, 0)));
    }

    #[test]
    fn test_free_from_other_registry_is_not_found() {
        let table = create_table();
        let owner = table.attach_session(SessionId::new(1)).unwrap();
        let other = table.attach_session(SessionId::new(1)).unwrap();
        let slab = table.allocate(8, 8, &owner).unwrap();

        assert!(table.free(slab.buffer_id(), &other).is_err());
        assert!(table.contains(&slab.key()));
        assert!(owner.contains(&slab.key()));
    }

    #[test]
    fn test_handle_unusable_after_free() {
        let table = create_table();
        let registry = table.attach_session(SessionId::new(1)).unwrap();
        let slab = table.allocate(8, 8, &registry).unwrap();

        table.free(slab.buffer_id(), &registry).unwrap();

        assert_eq!(slab.read().unwrap_err(), Error::NotFound(slab.key()));
    }

    #[test]
    fn test_size_limits() {
        let config = TableConfig::default()
            .with_max_user_size(64)
            .with_max_kernel_size(32);
        let table = BufferTable::new(config);
        let registry = table.attach_session(SessionId::new(1)).unwrap();

        assert_eq!(
            table.allocate(65, 0, &registry).unwrap_err(),
            Error::AllocationFailed {
                user_size: 65,
                kernel_size: 0
            }
        );
        assert_eq!(
            table.allocate(0, 33, &registry).unwrap_err(),
            Error::AllocationFailed {
                user_size: 0,
                kernel_size: 33
            }
        );
        assert!(table.is_empty());
        assert!(registry.is_empty());
        assert!(table.allocate(64, 32, &registry).is_ok());
        assert_eq!(table.stats().snapshot().allocation_failures, 2);
    }

    #[test]
    fn test_allocation_failure_leaves_table_unchanged() {
        let config = TableConfig::default().with_max_user_size(usize::MAX);
        let table = BufferTable::new(config);
        let registry = table.attach_session(SessionId::new(1)).unwrap();

        let result = table.allocate(usize::MAX, 8, &registry);
        assert!(matches!(result, Err(Error::AllocationFailed { .. })));
        assert!(table.is_empty());
        assert!(registry.is_empty());

        // No id was consumed by the failed call.
        let slab = table.allocate(8, 8, &registry).unwrap();
        assert_eq!(slab.buffer_id(), BufferId::new(0));
    }

    #[test]
    fn test_duplicate_key_leaves_table_unchanged() {
        let table = create_table();
        let registry = table.attach_session(SessionId::new(7)).unwrap();
        let original = table.allocate(8, 8, &registry).unwrap();
        original.write().unwrap().user_mut()[0] = 0x77;

        // Force the generator back onto an id that is still live.
        table.next_id.store(0, Ordering::Relaxed);

        let result = table.allocate(8, 8, &registry);
        assert_eq!(result.unwrap_err(), Error::DuplicateKey(key(7, 0)));
        assert_eq!(table.len(), 1);
        assert_eq!(registry.len(), 1);

        let guard = table.get(BufferId::new(0), SessionId::new(7)).unwrap();
        assert_eq!(guard.user()[0], 0x77);
    }

    #[test]
    fn test_teardown_releases_session_buffers() {
        let table = create_table();
        let a = table.attach_session(SessionId::new(1)).unwrap();
        let b = table.attach_session(SessionId::new(2)).unwrap();

        let handles: Vec<BufferSlab> = (0..4).map(|_| table.allocate(8, 8, &a).unwrap()).collect();
        let kept = table.allocate(8, 8, &b).unwrap();

        assert_eq!(table.teardown_session(&a), 4);
        assert!(a.is_empty());
        assert!(table.session_keys(SessionId::new(1)).is_empty());
        assert!(handles.iter().all(|h| h.read().is_err()));

        assert!(table.contains(&kept.key()));
        assert_eq!(table.teardown_session(&a), 0);
    }

    #[test]
    fn test_repeated_teardown_counts_one_close() {
        let table = create_table();
        let registry = table.attach_session(SessionId::new(1)).unwrap();
        table.allocate(8, 8, &registry).unwrap();

        assert_eq!(table.teardown_session(&registry), 1);
        assert_eq!(table.teardown_session(&registry), 0);
        assert_eq!(table.teardown_session(&registry), 0);

        let snapshot = table.stats().snapshot();
        assert_eq!(snapshot.sessions_closed, 1);
        assert_eq!(snapshot.buffers_reclaimed, 1);
    }

    #[test]
    fn test_free_waits_for_reader() {
        let table = create_table();
        let registry = Arc::new(table.attach_session(SessionId::new(1)).unwrap());
        let slab = table.allocate(8, 8, &registry).unwrap();

        let reader = table.get(slab.buffer_id(), SessionId::new(1)).unwrap();
        let freed = Arc::new(AtomicBool::new(false));

        let handle = {
            let table = Arc::clone(&table);
            let registry = Arc::clone(&registry);
            let freed = Arc::clone(&freed);
            let id = slab.buffer_id();
            thread::spawn(move || {
                table.free(id, &registry).unwrap();
                freed.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!freed.load(Ordering::SeqCst));
        // Storage is intact while the reader holds the lock.
        assert_eq!(reader.user().len(), 8);

        reader.release();
        handle.join().unwrap();
        assert!(freed.load(Ordering::SeqCst));
        assert!(!table.contains(&slab.key()));
    }

    #[test]
    fn test_stats_track_operations() {
        let table = create_table();
        let registry = table.attach_session(SessionId::new(1)).unwrap();
        let slab = table.allocate(8, 8, &registry).unwrap();

        let _ = table.get(slab.buffer_id(), SessionId::new(1)).unwrap();
        let _ = table.get(BufferId::new(99), SessionId::new(1));
        table.free(slab.buffer_id(), &registry).unwrap();
        let _ = table.free(slab.buffer_id(), &registry);

        let snapshot = table.stats().snapshot();
        assert_eq!(snapshot.allocations, 1);
        assert_eq!(snapshot.lookups, 1);
        assert_eq!(snapshot.lookup_misses, 1);
        assert_eq!(snapshot.frees, 1);
        assert_eq!(snapshot.free_misses, 1);
        assert_eq!(snapshot.live_buffers(), 0);
    }
}

//! slabtable - a concurrent table of per-session shared buffers.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Session entry point (caller)                   │
//! │        open_session → allocate / get / free → close             │
//! └─────────────────────────────────────────────────────────────────┘
//!                                ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    BufferTable (buffer/)                        │
//! │  ┌──────────────────────┐      ┌─────────────────────────────┐  │
//! │  │ SessionRegistry      │      │ index: RwLock<BTreeMap>     │  │
//! │  │ Mutex<keys>          │ ───▶ │ (session, buffer) → slab    │  │
//! │  │ (one per session)    │      │ next_id: AtomicU64          │  │
//! │  └──────────────────────┘      └──────────────┬──────────────┘  │
//! │                                               ↓                 │
//! │                    ┌──────────────────────────────────────────┐ │
//! │                    │ BufferSlab: RwLock<kernel + user bytes>  │ │
//! │                    └──────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Locks are always taken registry → table → content. Lookups skip the
//! registry and hand the content lock to the caller as a guard.
//!
//! # Modules
//! - [`common`] - Shared primitives (ids, keys, Error, config)
//! - [`buffer`] - The buffer table, sessions, and content guards
//!
//! # Quick Start
//! ```
//! use slabtable::{BufferTable, SessionId};
//! use std::sync::Arc;
//!
//! let table = Arc::new(BufferTable::with_defaults());
//! let session = table.open_session(SessionId::new(7)).unwrap();
//!
//! let slab = session.allocate(4096, 256).unwrap();
//! session.get_mut(slab.buffer_id()).unwrap().user_mut()[0] = 0xAB;
//! assert_eq!(session.get(slab.buffer_id()).unwrap().user()[0], 0xAB);
//!
//! session.close();
//! assert!(table.is_empty());
//! ```

pub mod buffer;
pub mod common;

pub use common::config::TableConfig;
pub use common::{BufferId, BufferKey, Error, Result, SessionId};

pub use buffer::{
    BufferSlab, BufferTable, Session, SessionRegistry, SlabContent, SlabReadGuard, SlabWriteGuard,
    StatsSnapshot, TableStats,
};

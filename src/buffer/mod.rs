//! Per-session buffer management.
//!
//! The buffer table is the shared index of every live buffer, keyed by
//! `(session, buffer)`. Each session also keeps a registry of its own
//! keys so its buffers can be released in bulk.
//!
//! # Components
//! - [`BufferTable`] - The index, id generator, and locking protocol
//! - [`BufferSlab`] - A buffer's storage plus its content lock
//! - [`SlabReadGuard`] / [`SlabWriteGuard`] - RAII guards for content access
//! - [`SessionRegistry`] - Keys owned by one session
//! - [`Session`] - A client handle that releases its buffers on close
//! - [`TableStats`] - Operation statistics

mod buffer_table;
mod session;
mod session_registry;
mod slab;
mod slab_guard;
mod stats;

pub use buffer_table::BufferTable;
pub use session::Session;
pub use session_registry::SessionRegistry;
pub use slab::{BufferSlab, SlabContent};
pub use slab_guard::{SlabReadGuard, SlabWriteGuard};
pub use stats::{StatsSnapshot, TableStats};

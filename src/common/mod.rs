//! Common types and utilities shared across slabtable.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`TableConfig`]
//! - Error types
//! - Identifiers (SessionId, BufferId) and the composite [`BufferKey`]

pub mod config;
pub mod error;
mod buffer_id;
mod buffer_key;
mod session_id;

pub use buffer_id::BufferId;
pub use buffer_key::BufferKey;
pub use config::TableConfig;
pub use error::{Error, Result};
pub use session_id::SessionId;

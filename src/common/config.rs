//! Configuration for slabtable.

/// Default upper bound on a buffer's kernel-side payload region (16MB).
pub const DEFAULT_MAX_KERNEL_SIZE: usize = 16 * 1024 * 1024;

/// Default upper bound on a buffer's user-exchange region (64MB).
///
/// The user region backs the ring shared with the session, so it is
/// allowed to be larger than the kernel-side payload.
pub const DEFAULT_MAX_USER_SIZE: usize = 64 * 1024 * 1024;

/// Number of list slots reserved up front when a session registry attaches.
pub const DEFAULT_SESSION_CAPACITY: usize = 16;

/// Tunables for a [`BufferTable`](crate::buffer::BufferTable).
///
/// # Example
/// ```
/// use slabtable::TableConfig;
///
/// let config = TableConfig::default()
///     .with_max_kernel_size(4096)
///     .with_session_capacity(4);
/// assert_eq!(config.max_kernel_size, 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableConfig {
    /// Largest kernel payload `allocate` accepts.
    pub max_kernel_size: usize,

    /// Largest user-exchange region `allocate` accepts.
    pub max_user_size: usize,

    /// Slots reserved in each session's registry list on attach.
    pub session_capacity: usize,
}

impl TableConfig {
    pub fn with_max_kernel_size(mut self, size: usize) -> Self {
        self.max_kernel_size = size;
        self
    }

    pub fn with_max_user_size(mut self, size: usize) -> Self {
        self.max_user_size = size;
        self
    }

    pub fn with_session_capacity(mut self, capacity: usize) -> Self {
        self.session_capacity = capacity;
        self
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            max_kernel_size: DEFAULT_MAX_KERNEL_SIZE,
            max_user_size: DEFAULT_MAX_USER_SIZE,
            session_capacity: DEFAULT_SESSION_CAPACITY,
        }
    }
}

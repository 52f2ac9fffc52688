//! Configuration for strataheap.
//!
//! Sizes and policies are carried in a [`StorageConfig`] that is handed to
//! every [`HeapFile`](crate::storage::HeapFile) and
//! [`BufferPool`](crate::buffer::BufferPool) at construction. The only
//! ambient value is the default page size, which tests may override for the
//! duration of a scope with [`override_page_size`].

use std::cell::Cell;
use std::time::Duration;

/// Default size of a page in bytes (4KB).
///
/// Matches the OS page size on most systems, so one page is one block of I/O.
pub const PAGE_SIZE: usize = 4096;

/// Default number of pages a buffer pool caches.
pub const DEFAULT_POOL_PAGES: usize = 50;

/// Fixed on-disk width of a text field's payload, in bytes.
///
/// Text fields are stored as a 4-byte length followed by `STRING_LEN` bytes,
/// so every tuple of a schema has the same width.
pub const STRING_LEN: usize = 128;

thread_local! {
    static PAGE_SIZE_OVERRIDE: Cell<Option<usize>> = const { Cell::new(None) };
}

/// The effective default page size for the current thread.
///
/// Returns [`PAGE_SIZE`] unless a [`PageSizeOverride`] is alive.
pub fn page_size() -> usize {
    PAGE_SIZE_OVERRIDE.with(|o| o.get()).unwrap_or(PAGE_SIZE)
}

/// Override the default page size until the returned guard is dropped.
///
/// Intended for tests that want small pages to force multi-page files.
/// The override is thread-local, so tests running in parallel do not see
/// each other's value.
///
/// # Example
/// ```
/// use strataheap::common::config;
///
/// {
///     let _guard = config::override_page_size(512);
///     assert_eq!(config::page_size(), 512);
/// }
/// assert_eq!(config::page_size(), config::PAGE_SIZE);
/// ```
pub fn override_page_size(page_size: usize) -> PageSizeOverride {
    let previous = PAGE_SIZE_OVERRIDE.with(|o| o.replace(Some(page_size)));
    PageSizeOverride { previous }
}

/// RAII guard returned by [`override_page_size`].
#[must_use = "the override is reverted as soon as the guard is dropped"]
pub struct PageSizeOverride {
    previous: Option<usize>,
}

impl Drop for PageSizeOverride {
    fn drop(&mut self) {
        PAGE_SIZE_OVERRIDE.with(|o| o.set(self.previous));
    }
}

/// How a blocked lock request decides that it must give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeadlockPolicy {
    /// Maintain a wait-for graph and abort the requester as soon as the edge
    /// it adds closes a cycle.
    #[default]
    CycleDetection,
    /// Abort a request that has been blocked for longer than the duration.
    ///
    /// Cheaper than cycle detection but aborts long waits that are not
    /// deadlocks.
    Timeout(Duration),
}

/// How a heap file materializes a page appended by an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppendPolicy {
    /// Extend the file with an empty page and hand the populated page back
    /// dirty. Aborting the inserting transaction rereads the empty page.
    #[default]
    ExtendEmpty,
    /// Write the populated page straight to the file. The inserted tuple is
    /// durable immediately, even if the transaction later aborts.
    WriteThrough,
}

/// Construction-time settings for heap files and the buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageConfig {
    /// Bytes per page.
    pub page_size: usize,
    /// Maximum number of pages the buffer pool caches.
    pub pool_pages: usize,
    pub deadlock_policy: DeadlockPolicy,
    pub append_policy: AppendPolicy,
}

impl StorageConfig {
    /// Config with the given pool capacity and defaults elsewhere.
    pub fn with_pool_pages(pool_pages: usize) -> Self {
        Self {
            pool_pages,
            ..Self::default()
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: page_size(),
            pool_pages: DEFAULT_POOL_PAGES,
            deadlock_policy: DeadlockPolicy::default(),
            append_policy: AppendPolicy::default(),
        }
    }
}

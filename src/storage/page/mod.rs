//! Page types and layout.
//!
//! This module contains:
//! - [`HeapPage`] - A decoded heap page (slot array of tuples)
//! - [`PageHeader`] - Checksum and slot bitmap at the start of every page
//! - [`PageRef`] - Shared handle to a page owned by the buffer pool

mod heap_page;
mod page_header;

use std::sync::Arc;

use parking_lot::RwLock;

pub use heap_page::HeapPage;
pub use page_header::PageHeader;

/// Shared handle to a cached page.
///
/// The buffer pool owns the cached copy; callers receive a clone of the
/// handle. The `RwLock` is a short-lived latch for memory safety only; the
/// transactional page lock taken by the pool decides who may read or modify
/// the page.
pub type PageRef = Arc<RwLock<HeapPage>>;

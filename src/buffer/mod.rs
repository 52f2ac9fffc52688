//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache layer between heap files and
//! transactions. Every page access goes through it, and it takes the
//! matching page lock before handing a page out.
//!
//! # Components
//! - [`BufferPool`] - The transactional page cache
//! - [`BufferPoolStats`] - Performance statistics
//! - [`replacer`] - Eviction policy implementations

mod buffer_pool;
pub mod replacer;
mod stats;

pub use buffer_pool::BufferPool;
pub use stats::{BufferPoolStats, StatsSnapshot};

//! Concurrency control - page locks, deadlock detection, transactions.
//!
//! - [`LockManager`] - Shared/exclusive page locks under two-phase locking
//! - [`WaitForGraph`] - Waits-for edges and cycle search
//! - [`Transaction`] - Commit/abort handle over the buffer pool

mod lock_manager;
mod transaction;
mod wait_for_graph;

pub use lock_manager::{LockManager, LockMode};
pub use transaction::Transaction;
pub use wait_for_graph::WaitForGraph;

//! Common types and utilities shared across strataheap.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`StorageConfig`](config::StorageConfig)
//! - Error types
//! - Identifiers (TableId, PageId, TransactionId) and Permissions

pub mod config;
pub mod error;
mod page_id;
mod transaction_id;

pub use error::{Error, ErrorKind, Result};
pub use page_id::{PageId, TableId};
pub use transaction_id::{Permissions, TransactionId};

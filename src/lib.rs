//! strataheap - a transactional page cache over heap files.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           strataheap                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Transactions (concurrency/)                    │   │
//! │  │     Transaction → commit / abort at the pool boundary    │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │       Buffer Pool (buffer/)                             │   │
//! │  │   BufferPool + LruReplacer + Statistics                 │   │
//! │  │        ↕ LockManager + WaitForGraph (concurrency/)      │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Storage Layer (storage/)                       │   │
//! │  │     Catalog + HeapFile + HeapPage + PageHeader           │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, TransactionId, Error, config)
//! - [`tuple`] - Fixed-width tuples and their layouts
//! - [`storage`] - Heap files, page format, catalog
//! - [`concurrency`] - Page locks, deadlock detection, transactions
//! - [`buffer`] - Buffer pool and eviction policy
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use strataheap::tuple::{Field, FieldType, Tuple, TupleDesc};
//! use strataheap::{BufferPool, Catalog, HeapFile, StorageConfig, Transaction};
//!
//! let config = StorageConfig::default();
//! let desc = Arc::new(TupleDesc::new(vec![FieldType::Int, FieldType::Text]));
//! let catalog = Arc::new(Catalog::new());
//! let table = catalog
//!     .add_table(Arc::new(HeapFile::create("people.dat", Arc::clone(&desc), &config).unwrap()))
//!     .unwrap();
//! let pool = BufferPool::new(Arc::clone(&catalog), &config);
//!
//! let txn = Transaction::begin();
//! let row = Tuple::new(desc, vec![Field::Int(1), Field::from("ada")]).unwrap();
//! pool.insert_tuple(txn.id(), table, row).unwrap();
//! txn.commit(&pool).unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod concurrency;
pub mod storage;
pub mod tuple;

// Re-export commonly used items at crate root for convenience
pub use common::config::{AppendPolicy, DeadlockPolicy, StorageConfig, PAGE_SIZE};
pub use common::{Error, ErrorKind, PageId, Permissions, Result, TableId, TransactionId};

pub use buffer::{BufferPool, BufferPoolStats, StatsSnapshot};
pub use concurrency::{LockManager, LockMode, Transaction, WaitForGraph};
pub use storage::page::{HeapPage, PageHeader};
pub use storage::{Catalog, DbFile, HeapFile, HeapFileIter};

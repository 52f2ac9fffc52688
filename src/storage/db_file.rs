//! The page-provider contract between tables and the buffer pool.

use std::sync::Arc;

use crate::buffer::BufferPool;
use crate::common::{PageId, Result, TableId, TransactionId};
use crate::storage::page::{HeapPage, PageRef};
use crate::tuple::{Tuple, TupleDesc};

/// A table's on-disk storage as seen by the buffer pool.
///
/// The pool reads and writes whole pages through this trait when it faults a
/// page in, flushes it, or rereads it on abort. Tuple-level mutations go the
/// other way: the file fetches the pages it needs through the pool, mutates
/// them under the transaction's exclusive lock, and returns the pages it
/// dirtied so the pool can install them.
pub trait DbFile: Send + Sync {
    /// Identifier used in every [`PageId`] of this file.
    fn id(&self) -> TableId;

    fn tuple_desc(&self) -> &Arc<TupleDesc>;

    /// Read one page from storage.
    ///
    /// # Errors
    /// - `Error::InvalidArgument` if `page_id` belongs to another table
    /// - `Error::Io` if the block cannot be read
    /// - `Error::Format` if the block does not decode
    fn read_page(&self, page_id: PageId) -> Result<HeapPage>;

    /// Write one page to storage, extending the file if it is the next page.
    fn write_page(&self, page: &HeapPage) -> Result<()>;

    /// Number of whole pages in the file.
    fn page_count(&self) -> Result<u32>;

    /// Insert a tuple, returning the pages it dirtied.
    fn insert_tuple(&self, pool: &BufferPool, txn: TransactionId, tuple: Tuple)
        -> Result<Vec<PageRef>>;

    /// Delete a stored tuple, returning the pages it dirtied.
    fn delete_tuple(&self, pool: &BufferPool, txn: TransactionId, tuple: &Tuple)
        -> Result<Vec<PageRef>>;
}

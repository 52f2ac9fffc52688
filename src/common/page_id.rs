//! Table and page identifier types.

use std::fmt;

/// Identifies a table, i.e. one heap file registered in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl TableId {
    /// Create a new TableId.
    #[inline]
    pub fn new(id: u32) -> Self {
        TableId(id)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Table({})", self.0)
    }
}

/// Identifies a page: the table it belongs to and its position in that
/// table's file.
///
/// Page `n` of a table lives at byte offset `n * page_size` of the table's
/// heap file. `PageId` is `Copy` and hashes both components, so it is used
/// directly as the key of the page cache and the lock table.
///
/// # Example
/// ```
/// use strataheap::{PageId, TableId};
///
/// let pid = PageId::new(TableId::new(7), 3);
/// assert_eq!(pid.table_id(), TableId::new(7));
/// assert_eq!(pid.page_no(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    table_id: TableId,
    page_no: u32,
}

impl PageId {
    /// Create a new PageId.
    #[inline]
    pub fn new(table_id: TableId, page_no: u32) -> Self {
        Self { table_id, page_no }
    }

    #[inline]
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    /// Zero-based position of the page within its table's file.
    #[inline]
    pub fn page_no(&self) -> u32 {
        self.page_no
    }

    /// Byte offset of this page in its heap file.
    #[inline]
    pub fn offset(&self, page_size: usize) -> u64 {
        self.page_no as u64 * page_size as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({}:{})", self.table_id.0, self.page_no)
    }
}

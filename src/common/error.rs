//! Error types for strataheap.

use thiserror::Error;

use super::{PageId, TableId, TransactionId};

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in strataheap.
///
/// Every variant belongs to one [`ErrorKind`]. Any error returned by a
/// transactional operation aborts the enclosing transaction; a
/// [`ErrorKind::TransactionAborted`] error additionally means the caller must
/// run the abort path before doing anything else with that transaction.
#[derive(Debug, Error)]
pub enum Error {
    /// The lock request would have completed a wait-for cycle, or waited
    /// longer than the configured timeout.
    #[error("{0} aborted: lock request would deadlock")]
    TransactionAborted(TransactionId),

    /// The pool is full and every cached page is dirty (or being written).
    #[error("no evictable page: all {0} cached pages are dirty or in use")]
    NoEvictablePage(usize),

    /// Delete of a tuple whose slot is already free.
    #[error("slot {slot} of {page_id} is already empty")]
    SlotEmpty { page_id: PageId, slot: usize },

    /// Insert into a page with no free slot.
    #[error("{0} has no free slot")]
    PageFull(PageId),

    /// Tuple layout differs from the table's layout.
    #[error("tuple schema does not match {0}")]
    SchemaMismatch(TableId),

    /// Delete of a tuple that was never stored.
    #[error("tuple has no record id")]
    MissingRecordId,

    #[error("{0} is not registered in the catalog")]
    UnknownTable(TableId),

    #[error("{0} is already registered in the catalog")]
    DuplicateTable(TableId),

    /// I/O error from heap file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Page bytes that cannot be decoded.
    #[error("malformed {page_id}: {reason}")]
    Format { page_id: PageId, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TransactionAborted,
    /// Logical or capacity failure.
    Db,
    Io,
    Format,
    InvalidArgument,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::TransactionAborted(_) => ErrorKind::TransactionAborted,
            Error::NoEvictablePage(_)
            | Error::SlotEmpty { .. }
            | Error::PageFull(_)
            | Error::SchemaMismatch(_)
            | Error::MissingRecordId
            | Error::UnknownTable(_)
            | Error::DuplicateTable(_) => ErrorKind::Db,
            Error::Io(_) => ErrorKind::Io,
            Error::Format { .. } => ErrorKind::Format,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    pub(crate) fn format(page_id: PageId, reason: impl Into<String>) -> Self {
        Error::Format {
            page_id,
            reason: reason.into(),
        }
    }
}

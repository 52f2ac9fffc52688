//! Transaction handle.

use crate::buffer::BufferPool;
use crate::common::{Result, TransactionId};

/// One unit of work against a [`BufferPool`].
///
/// The handle is consumed by [`commit`](Self::commit) or
/// [`abort`](Self::abort), so a transaction completes at most once.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
}

impl Transaction {
    /// Start a transaction with a fresh id.
    pub fn begin() -> Self {
        let id = TransactionId::new();
        log::trace!("{} started", id);
        Self { id }
    }

    #[inline]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Flush every page this transaction dirtied, then release its locks.
    ///
    /// If a flush fails the transaction is aborted instead (unflushed pages
    /// are reread from storage, locks released) and the flush error is
    /// returned.
    pub fn commit(self, pool: &BufferPool) -> Result<()> {
        match pool.transaction_complete(self.id, true) {
            Ok(()) => Ok(()),
            Err(e) => {
                log::warn!("{} commit failed, aborting: {}", self.id, e);
                // The flush error is the one the caller needs to see.
                if let Err(abort_err) = pool.transaction_complete(self.id, false) {
                    log::warn!("{} abort after failed commit also failed: {}", self.id, abort_err);
                }
                Err(e)
            }
        }
    }

    /// Discard every change this transaction made to cached pages and
    /// release its locks.
    pub fn abort(self, pool: &BufferPool) -> Result<()> {
        pool.transaction_complete(self.id, false)
    }
}

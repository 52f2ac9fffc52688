//! Buffer Pool - the transactional page cache.
//!
//! The [`BufferPool`] provides:
//! - Page caching between heap files and memory
//! - Lock acquisition before every page access (two-phase locking)
//! - LRU eviction of clean pages only (no-steal)
//! - Flush-on-commit and reread-on-abort at transaction end

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::buffer::replacer::LruReplacer;
use crate::buffer::BufferPoolStats;
use crate::common::config::StorageConfig;
use crate::common::{Error, PageId, Permissions, Result, TableId, TransactionId};
use crate::concurrency::{LockManager, LockMode};
use crate::storage::page::PageRef;
use crate::storage::Catalog;
use crate::tuple::Tuple;

/// Bounded cache of heap pages with transactional access control.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                         BufferPool                          │
/// │  ┌──────────────┐  ┌───────────────────────────────────┐   │
/// │  │ lock_manager │  │  pages: PageId → PageRef          │   │
/// │  │ page locks   │  │  [Page(t:0)] [Page(t:3)] ...      │   │
/// │  └──────────────┘  └───────────────────────────────────┘   │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
/// │  │   catalog    │  │   replacer   │  │    latch     │      │
/// │  │ TableId→File │  │ LruReplacer  │  │ Mutex<()>    │      │
/// │  └──────────────┘  └──────────────┘  └──────────────┘      │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `pages`: `RwLock` - concurrent hits, one structural writer
/// - `replacer`: `Mutex` - always taken after `pages`, never before
/// - `latch`: `Mutex` - serializes page faults, installs, eviction and
///   flushes; never held while waiting for a page lock
/// - `lock_manager`: internally synchronized per page
/// - `stats`: No lock - all atomic counters
///
/// # Usage
/// ```ignore
/// let catalog = Arc::new(Catalog::new());
/// let table = catalog.add_table(Arc::new(HeapFile::create(path, desc, &config)?))?;
/// let pool = BufferPool::new(Arc::clone(&catalog), &config);
///
/// let txn = Transaction::begin();
/// pool.insert_tuple(txn.id(), table, tuple)?;
/// txn.commit(&pool)?;
/// ```
pub struct BufferPool {
    /// Maximum number of cached pages.
    capacity: usize,

    /// Resolves a page's table to the file that stores it.
    catalog: Arc<Catalog>,

    lock_manager: LockManager,

    /// Cached pages.
    pages: RwLock<HashMap<PageId, PageRef>>,

    /// Recency order over exactly the keys of `pages`.
    replacer: Mutex<LruReplacer>,

    /// Pool-wide mutual exclusion for structural changes and I/O.
    latch: Mutex<()>,

    stats: BufferPoolStats,
}

impl BufferPool {
    /// Create a pool caching up to `config.pool_pages` pages.
    ///
    /// # Panics
    /// Panics if `config.pool_pages` is 0.
    pub fn new(catalog: Arc<Catalog>, config: &StorageConfig) -> Self {
        assert!(config.pool_pages > 0, "pool_pages must be > 0");

        Self {
            capacity: config.pool_pages,
            catalog,
            lock_manager: LockManager::new(config.deadlock_policy),
            pages: RwLock::new(HashMap::new()),
            replacer: Mutex::new(LruReplacer::new()),
            latch: Mutex::new(()),
            stats: BufferPoolStats::new(),
        }
    }

    // ========================================================================
    // Public API: Page access
    // ========================================================================

    /// Fetch a page under `txn` with the given permission.
    ///
    /// Takes a shared lock for [`Permissions::ReadOnly`] and an exclusive
    /// lock for [`Permissions::ReadWrite`] first, blocking while another
    /// transaction holds a conflicting lock. The lock is held until the
    /// transaction completes.
    ///
    /// # Errors
    /// - `Error::TransactionAborted` if the lock request would deadlock
    /// - `Error::UnknownTable` if no file backs the page's table
    /// - `Error::NoEvictablePage` if the pool is full of dirty pages
    /// - `Error::Io` / `Error::Format` from reading the page
    pub fn fetch(&self, txn: TransactionId, page_id: PageId, perm: Permissions) -> Result<PageRef> {
        self.lock_page(txn, page_id, perm)?;

        if let Some(page) = self.cached(page_id) {
            BufferPoolStats::bump(&self.stats.cache_hits);
            return Ok(page);
        }

        let _latch = self.latch.lock();

        // Another thread may have faulted it in while we waited.
        if let Some(page) = self.cached(page_id) {
            BufferPoolStats::bump(&self.stats.cache_hits);
            return Ok(page);
        }

        BufferPoolStats::bump(&self.stats.cache_misses);
        let file = self.catalog.get_database_file(page_id.table_id())?;
        let page = Arc::new(RwLock::new(file.read_page(page_id)?));
        BufferPoolStats::bump(&self.stats.pages_read);

        self.install(page_id, Arc::clone(&page))?;
        log::trace!("{} faulted in {}", txn, page_id);
        Ok(page)
    }

    /// Acquire the lock `perm` implies on `page_id` without touching the
    /// cache.
    ///
    /// Heap files use this to lock a page id before the page exists.
    pub fn lock_page(&self, txn: TransactionId, page_id: PageId, perm: Permissions) -> Result<()> {
        let mode = match perm {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        };
        let result = self.lock_manager.acquire(txn, page_id, mode);
        if let Err(Error::TransactionAborted(_)) = &result {
            BufferPoolStats::bump(&self.stats.deadlock_aborts);
        }
        result
    }

    /// Insert a tuple into `table_id` on behalf of `txn`.
    ///
    /// Every page the insert dirtied is installed in the cache, replacing
    /// any cached copy.
    pub fn insert_tuple(&self, txn: TransactionId, table_id: TableId, tuple: Tuple) -> Result<()> {
        let file = self.catalog.get_database_file(table_id)?;
        let dirtied = file.insert_tuple(self, txn, tuple)?;
        self.install_dirtied(txn, dirtied)
    }

    /// Delete a stored tuple on behalf of `txn`.
    ///
    /// The table is taken from the tuple's record id.
    pub fn delete_tuple(&self, txn: TransactionId, tuple: &Tuple) -> Result<()> {
        let rid = tuple.record_id().ok_or(Error::MissingRecordId)?;
        let file = self.catalog.get_database_file(rid.page_id.table_id())?;
        let dirtied = file.delete_tuple(self, txn, tuple)?;
        self.install_dirtied(txn, dirtied)
    }

    // ========================================================================
    // Public API: Transaction boundary
    // ========================================================================

    /// Finish `txn`: flush its pages on commit, restore them on abort, then
    /// release all of its locks.
    ///
    /// # Errors
    /// On commit, a failed flush leaves that page dirty, keeps every lock
    /// and returns the error; the caller must then abort.
    ///
    /// On abort, a page that cannot be reread is dropped from the cache
    /// (storage still holds its committed state). The remaining pages are
    /// restored, locks are released, and the first error is returned.
    pub fn transaction_complete(&self, txn: TransactionId, commit: bool) -> Result<()> {
        if commit {
            self.flush_pages(txn)?;
            self.lock_manager.release_all(txn);
            log::debug!("{} committed", txn);
            return Ok(());
        }

        let restored = self.restore_pages(txn);
        self.lock_manager.release_all(txn);
        log::debug!("{} aborted", txn);
        restored
    }

    fn restore_pages(&self, txn: TransactionId) -> Result<()> {
        let _latch = self.latch.lock();
        let mut first_err = None;

        for (page_id, page) in self.pages_dirtied_by(Some(txn)) {
            let fresh = self
                .catalog
                .get_database_file(page_id.table_id())
                .and_then(|file| file.read_page(page_id));

            match fresh {
                Ok(fresh) => {
                    *page.write() = fresh;
                    BufferPoolStats::bump(&self.stats.pages_reread);
                    log::trace!("{} restored {}", txn, page_id);
                }
                Err(e) => {
                    log::warn!("{} could not reread {}, dropping it: {}", txn, page_id, e);
                    self.remove_cached(page_id);
                    first_err.get_or_insert(e);
                }
            }
        }

        first_err.map_or(Ok(()), Err)
    }

    // ========================================================================
    // Public API: Flush and discard
    // ========================================================================

    /// Write `page_id` to storage if it is cached and dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let _latch = self.latch.lock();
        let page = self.pages.read().get(&page_id).cloned();
        match page {
            Some(page) => self.flush_ref(&page),
            None => Ok(()),
        }
    }

    /// Write every dirty cached page to storage.
    ///
    /// Flushes uncommitted changes too; meant for checkpoints and shutdown
    /// of a quiesced pool.
    pub fn flush_all_pages(&self) -> Result<()> {
        let _latch = self.latch.lock();
        for (_, page) in self.pages_dirtied_by(None) {
            self.flush_ref(&page)?;
        }
        Ok(())
    }

    /// Write every page dirtied by `txn` to storage.
    pub fn flush_pages(&self, txn: TransactionId) -> Result<()> {
        let _latch = self.latch.lock();
        for (_, page) in self.pages_dirtied_by(Some(txn)) {
            self.flush_ref(&page)?;
        }
        Ok(())
    }

    /// Flush `page_id` if dirty, then drop it from the cache.
    pub fn discard_page(&self, page_id: PageId) -> Result<()> {
        let _latch = self.latch.lock();
        let page = self.pages.read().get(&page_id).cloned();
        let Some(page) = page else {
            return Ok(());
        };
        self.flush_ref(&page)?;
        self.remove_cached(page_id);
        log::trace!("discarded {}", page_id);
        Ok(())
    }

    // ========================================================================
    // Public API: Queries
    // ========================================================================

    /// Release `txn`'s lock on one page before the transaction ends.
    pub fn release_page(&self, txn: TransactionId, page_id: PageId) {
        self.lock_manager.release(txn, page_id);
    }

    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds_lock(txn, page_id)
    }

    pub fn contains_page(&self, page_id: PageId) -> bool {
        self.pages.read().contains_key(&page_id)
    }

    pub fn cached_page_count(&self) -> usize {
        self.pages.read().len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    // ========================================================================
    // Internal
    // ========================================================================

    /// Cache lookup that also refreshes recency on a hit.
    fn cached(&self, page_id: PageId) -> Option<PageRef> {
        let pages = self.pages.read();
        let page = pages.get(&page_id).cloned()?;
        self.replacer.lock().record_access(page_id);
        Some(page)
    }

    fn install_dirtied(&self, txn: TransactionId, dirtied: Vec<PageRef>) -> Result<()> {
        let _latch = self.latch.lock();
        for page in dirtied {
            let page_id = {
                let mut guard = page.write();
                guard.mark_dirty(Some(txn));
                guard.id()
            };
            self.install(page_id, page)?;
        }
        Ok(())
    }

    /// Put `page` in the cache under `page_id`, evicting first if a new entry
    /// would exceed capacity. Caller holds `latch`.
    fn install(&self, page_id: PageId, page: PageRef) -> Result<()> {
        let mut pages = self.pages.write();
        let mut replacer = self.replacer.lock();

        if !pages.contains_key(&page_id) {
            while pages.len() >= self.capacity {
                self.evict(&mut pages, &mut replacer)?;
            }
        }
        pages.insert(page_id, page);
        replacer.record_access(page_id);
        Ok(())
    }

    /// Drop the least recently used clean page.
    fn evict(&self, pages: &mut HashMap<PageId, PageRef>, replacer: &mut LruReplacer) -> Result<()> {
        let victim = replacer.evict(|page_id| {
            pages
                .get(page_id)
                .and_then(|page| page.try_read())
                .is_some_and(|guard| !guard.is_dirty())
        });

        match victim {
            Some(page_id) => {
                pages.remove(&page_id);
                BufferPoolStats::bump(&self.stats.evictions);
                log::trace!("evicted {}", page_id);
                Ok(())
            }
            None => {
                log::debug!("no clean page to evict among {}", pages.len());
                Err(Error::NoEvictablePage(pages.len()))
            }
        }
    }

    /// Write one page if dirty and clear its dirty marker. Caller holds `latch`.
    fn flush_ref(&self, page: &PageRef) -> Result<()> {
        let mut guard = page.write();
        if !guard.is_dirty() {
            return Ok(());
        }

        let page_id = guard.id();
        let file = self.catalog.get_database_file(page_id.table_id())?;
        if let Err(e) = file.write_page(&guard) {
            log::warn!("flush of {} failed, page stays dirty: {}", page_id, e);
            return Err(e);
        }

        guard.mark_dirty(None);
        BufferPoolStats::bump(&self.stats.pages_written);
        log::trace!("flushed {}", page_id);
        Ok(())
    }

    fn remove_cached(&self, page_id: PageId) {
        let mut pages = self.pages.write();
        pages.remove(&page_id);
        self.replacer.lock().remove(&page_id);
    }

    /// Cached dirty pages, in page id order. `None` selects every dirtier.
    fn pages_dirtied_by(&self, txn: Option<TransactionId>) -> Vec<(PageId, PageRef)> {
        let mut dirty: Vec<(PageId, PageRef)> = self
            .pages
            .read()
            .iter()
            .filter(|(_, page)| {
                let dirtier = page.read().dirtier();
                match txn {
                    Some(txn) => dirtier == Some(txn),
                    None => dirtier.is_some(),
                }
            })
            .map(|(page_id, page)| (*page_id, Arc::clone(page)))
            .collect();
        dirty.sort_by_key(|(page_id, _)| *page_id);
        dirty
    }
}

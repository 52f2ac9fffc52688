//! Heap File - a table stored as an array of fixed-size pages.
//!
//! The [`HeapFile`] handles all direct file operations for one table:
//! - Reading and writing whole pages
//! - Inserting tuples into the first page with a free slot, or a new page
//! - Deleting tuples by record id
//! - Scanning tuples page by page through the buffer pool

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::buffer::BufferPool;
use crate::common::config::{AppendPolicy, StorageConfig};
use crate::common::{Error, PageId, Permissions, Result, TableId, TransactionId};
use crate::storage::page::{HeapPage, PageHeader, PageRef};
use crate::storage::DbFile;
use crate::tuple::{Tuple, TupleDesc};

/// A table stored as a sequence of pages in a single file.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0   page_size  2×page_size  ...  N×page_size
/// ```
///
/// There is no file header and no free-space map: the page count is the
/// file length divided by the page size, and inserts scan for a free slot.
/// The file only ever grows by whole pages.
///
/// # Thread Safety
/// File I/O is serialized by an internal mutex. An insert that needs a new
/// page first takes the exclusive page lock on the next page number, then
/// grows the file under a short per-file latch; no lock wait ever happens
/// while that latch is held.
pub struct HeapFile {
    id: TableId,
    path: PathBuf,
    desc: Arc<TupleDesc>,
    page_size: usize,
    append_policy: AppendPolicy,
    file: Mutex<File>,
    append_latch: Mutex<()>,
}

impl HeapFile {
    /// Create a new, empty heap file.
    ///
    /// The table id is derived from the file's absolute path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created, or
    /// if no tuple of `desc` fits in a page.
    pub fn create<P: AsRef<Path>>(
        path: P,
        desc: Arc<TupleDesc>,
        config: &StorageConfig,
    ) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        let id = table_id_for(path.as_ref())?;
        Self::from_file(file, path.as_ref(), id, desc, config)
    }

    /// Create a new, empty heap file with an explicit table id.
    pub fn create_with_id<P: AsRef<Path>>(
        path: P,
        id: TableId,
        desc: Arc<TupleDesc>,
        config: &StorageConfig,
    ) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        Self::from_file(file, path.as_ref(), id, desc, config)
    }

    /// Open an existing heap file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(
        path: P,
        desc: Arc<TupleDesc>,
        config: &StorageConfig,
    ) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let id = table_id_for(path.as_ref())?;
        Self::from_file(file, path.as_ref(), id, desc, config)
    }

    /// Open an existing heap file with an explicit table id.
    pub fn open_with_id<P: AsRef<Path>>(
        path: P,
        id: TableId,
        desc: Arc<TupleDesc>,
        config: &StorageConfig,
    ) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Self::from_file(file, path.as_ref(), id, desc, config)
    }

    /// Open an existing heap file, or create it if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(
        path: P,
        desc: Arc<TupleDesc>,
        config: &StorageConfig,
    ) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path, desc, config)
        } else {
            Self::create(path, desc, config)
        }
    }

    fn from_file(
        file: File,
        path: &Path,
        id: TableId,
        desc: Arc<TupleDesc>,
        config: &StorageConfig,
    ) -> Result<Self> {
        if desc.num_fields() == 0 {
            return Err(Error::InvalidArgument("tuple layout has no columns".into()));
        }
        if PageHeader::num_slots(config.page_size, desc.byte_len()) == 0 {
            return Err(Error::InvalidArgument(format!(
                "page size {} cannot hold a {}-byte tuple",
                config.page_size,
                desc.byte_len()
            )));
        }

        let len = file.metadata()?.len();
        if len % config.page_size as u64 != 0 {
            log::warn!(
                "{}: length {} is not a multiple of the page size {}; trailing bytes ignored",
                path.display(),
                len,
                config.page_size
            );
        }

        Ok(Self {
            id,
            path: path.to_path_buf(),
            desc,
            page_size: config.page_size,
            append_policy: config.append_policy,
            file: Mutex::new(file),
            append_latch: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Size of the backing file in bytes.
    pub fn file_size(&self) -> Result<u64> {
        Ok(self.file.lock().metadata()?.len())
    }

    /// Scan every tuple of the table under `txn`.
    ///
    /// Pages are fetched through `pool` with read permission as the scan
    /// reaches them, so the scan leaves `txn` holding a shared lock on every
    /// page it visited.
    pub fn iter<'a>(&'a self, pool: &'a BufferPool, txn: TransactionId) -> HeapFileIter<'a> {
        HeapFileIter {
            file: self,
            pool,
            txn,
            next_page: 0,
            current: Vec::new().into_iter(),
            done: false,
        }
    }

    fn check_owner(&self, page_id: PageId) -> Result<()> {
        if page_id.table_id() != self.id {
            return Err(Error::InvalidArgument(format!(
                "{} does not belong to {}",
                page_id, self.id
            )));
        }
        Ok(())
    }

    /// Materialize page `page_no` as a new trailing page holding `tuple`.
    ///
    /// The caller already holds the exclusive lock on the page id. Returns
    /// the tuple back if another transaction grew the file first.
    fn append_page(
        &self,
        txn: TransactionId,
        page_no: u32,
        tuple: Tuple,
    ) -> Result<std::result::Result<PageRef, Tuple>> {
        let _append = self.append_latch.lock();
        if self.page_count()? != page_no {
            return Ok(Err(tuple));
        }

        let page_id = PageId::new(self.id, page_no);
        let mut page = HeapPage::empty(page_id, Arc::clone(&self.desc), self.page_size);
        match self.append_policy {
            AppendPolicy::ExtendEmpty => {
                self.write_page(&page)?;
                page.insert_tuple(tuple)?;
            }
            AppendPolicy::WriteThrough => {
                page.insert_tuple(tuple)?;
                self.write_page(&page)?;
            }
        }
        page.mark_dirty(Some(txn));

        log::debug!("{} appended {} ({:?})", txn, page_id, self.append_policy);
        Ok(Ok(Arc::new(RwLock::new(page))))
    }
}

/// Number of whole pages in `len` bytes.
fn pages_in(len: u64, page_size: usize) -> Result<u32> {
    u32::try_from(len / page_size as u64).map_err(|_| {
        Error::InvalidArgument(format!(
            "{} bytes hold more than {} pages of {} bytes",
            len,
            u32::MAX,
            page_size
        ))
    })
}

impl DbFile for HeapFile {
    fn id(&self) -> TableId {
        self.id
    }

    fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    fn read_page(&self, page_id: PageId) -> Result<HeapPage> {
        self.check_owner(page_id)?;

        let mut data = vec![0u8; self.page_size];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(page_id.offset(self.page_size)))?;
            file.read_exact(&mut data)?;
        }

        HeapPage::from_bytes(page_id, Arc::clone(&self.desc), self.page_size, &data)
    }

    fn write_page(&self, page: &HeapPage) -> Result<()> {
        let page_id = page.id();
        self.check_owner(page_id)?;
        if page.page_size() != self.page_size {
            return Err(Error::InvalidArgument(format!(
                "{} has size {}, file pages are {}",
                page_id,
                page.page_size(),
                self.page_size
            )));
        }

        let data = page.to_bytes();
        let mut file = self.file.lock();
        let page_count = file.metadata()?.len() / self.page_size as u64;
        if page_id.page_no() as u64 > page_count {
            return Err(Error::InvalidArgument(format!(
                "{} would leave a gap after page {}",
                page_id, page_count
            )));
        }

        file.seek(SeekFrom::Start(page_id.offset(self.page_size)))?;
        file.write_all(&data)?;
        file.sync_data()?;

        Ok(())
    }

    fn page_count(&self) -> Result<u32> {
        pages_in(self.file_size()?, self.page_size)
    }

    fn insert_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        mut tuple: Tuple,
    ) -> Result<Vec<PageRef>> {
        if **tuple.desc() != *self.desc {
            return Err(Error::SchemaMismatch(self.id));
        }

        // Pages already scanned stay locked by `txn`, so they stay full.
        let mut next = 0;
        loop {
            let page_count = self.page_count()?;
            for page_no in next..page_count {
                let page = pool.fetch(txn, PageId::new(self.id, page_no), Permissions::ReadWrite)?;
                let mut guard = page.write();
                if guard.num_empty_slots() > 0 {
                    guard.insert_tuple(tuple)?;
                    guard.mark_dirty(Some(txn));
                    drop(guard);
                    return Ok(vec![page]);
                }
            }
            next = page_count;

            // Lock the would-be page before touching the append latch so the
            // wait is seen by deadlock detection.
            pool.lock_page(txn, PageId::new(self.id, page_count), Permissions::ReadWrite)?;
            match self.append_page(txn, page_count, tuple)? {
                Ok(page) => return Ok(vec![page]),
                Err(back) => {
                    log::trace!("{} lost the append race on {}, rescanning", txn, self.id);
                    tuple = back;
                }
            }
        }
    }

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageRef>> {
        let rid = tuple.record_id().ok_or(Error::MissingRecordId)?;
        self.check_owner(rid.page_id)?;

        let page = pool.fetch(txn, rid.page_id, Permissions::ReadWrite)?;
        {
            let mut guard = page.write();
            guard.delete_tuple(tuple)?;
            guard.mark_dirty(Some(txn));
        }
        Ok(vec![page])
    }
}

fn table_id_for(path: &Path) -> Result<TableId> {
    let absolute = path.canonicalize()?;
    Ok(TableId::new(crc32fast::hash(
        absolute.to_string_lossy().as_bytes(),
    )))
}

/// Lazy scan over a heap file's tuples, in page order then slot order.
///
/// Yields `Err` once and then ends if a page cannot be fetched (for example
/// when the lock request is aborted as a deadlock). [`rewind`](Self::rewind)
/// restarts the scan from the first page.
pub struct HeapFileIter<'a> {
    file: &'a HeapFile,
    pool: &'a BufferPool,
    txn: TransactionId,
    next_page: u32,
    current: std::vec::IntoIter<Tuple>,
    done: bool,
}

impl HeapFileIter<'_> {
    /// Restart from the first slot of the first page.
    pub fn rewind(&mut self) {
        self.next_page = 0;
        self.current = Vec::new().into_iter();
        self.done = false;
    }

    fn load_next_page(&mut self) -> Result<bool> {
        if self.next_page >= self.file.page_count()? {
            return Ok(false);
        }
        let page_id = PageId::new(self.file.id, self.next_page);
        let page = self.pool.fetch(self.txn, page_id, Permissions::ReadOnly)?;
        let tuples: Vec<Tuple> = page.read().tuples().cloned().collect();

        self.current = tuples.into_iter();
        self.next_page += 1;
        Ok(true)
    }
}

impl Iterator for HeapFileIter<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if let Some(tuple) = self.current.next() {
                return Some(Ok(tuple));
            }
            match self.load_next_page() {
                Ok(true) => continue,
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

//! Integration tests for the buffer pool over heap files.
//!
//! These tests verify cross-component behavior that unit tests don't cover.

use std::sync::Arc;

use strataheap::tuple::{Field, FieldType, RecordId, Tuple, TupleDesc};
use strataheap::{
    AppendPolicy, BufferPool, Catalog, DbFile, Error, HeapFile, PageId, Permissions,
    StorageConfig, TableId, Transaction, TransactionId,
};
use tempfile::{tempdir, TempDir};

/// 64-byte pages hold 7 `(Int, Int)` rows.
const ROWS_PER_PAGE: i32 = 7;

struct Db {
    dir: TempDir,
    config: StorageConfig,
    desc: Arc<TupleDesc>,
    file: Arc<HeapFile>,
    catalog: Arc<Catalog>,
    table: TableId,
}

impl Db {
    fn new(pool_pages: usize, append_policy: AppendPolicy) -> Self {
        let config = StorageConfig {
            page_size: 64,
            pool_pages,
            append_policy,
            ..StorageConfig::default()
        };
        let dir = tempdir().unwrap();
        let desc = Arc::new(TupleDesc::new(vec![FieldType::Int, FieldType::Int]));
        let file = Arc::new(
            HeapFile::create(dir.path().join("table.dat"), Arc::clone(&desc), &config).unwrap(),
        );
        let catalog = Arc::new(Catalog::new());
        let table = catalog.add_table(file.clone()).unwrap();
        Self { dir, config, desc, file, catalog, table }
    }

    /// A fresh pool over the same files, with an empty cache.
    fn pool(&self) -> BufferPool {
        BufferPool::new(Arc::clone(&self.catalog), &self.config)
    }

    fn row(&self, v: i32) -> Tuple {
        Tuple::new(Arc::clone(&self.desc), vec![Field::Int(v), Field::Int(-v)]).unwrap()
    }

    fn page(&self, n: u32) -> PageId {
        PageId::new(self.table, n)
    }

    /// Insert `values`, one committed transaction per row so the pool never
    /// holds more than one dirty page.
    fn load(&self, pool: &BufferPool, values: impl IntoIterator<Item = i32>) {
        for v in values {
            let txn = Transaction::begin();
            pool.insert_tuple(txn.id(), self.table, self.row(v)).unwrap();
            txn.commit(pool).unwrap();
        }
    }

    fn scan(&self, pool: &BufferPool, txn: TransactionId) -> Vec<Tuple> {
        self.file.iter(pool, txn).collect::<Result<Vec<_>, _>>().unwrap()
    }

    /// First column of every stored row, read through a fresh pool.
    fn committed_values(&self) -> Vec<i32> {
        let pool = self.pool();
        let txn = Transaction::begin();
        let values = self.scan(&pool, txn.id()).iter().map(first).collect();
        txn.commit(&pool).unwrap();
        values
    }
}

fn first(tuple: &Tuple) -> i32 {
    match tuple.field(0) {
        Some(Field::Int(v)) => *v,
        other => panic!("unexpected field {:?}", other),
    }
}

#[test]
fn test_insert_fills_pages_in_order() {
    let db = Db::new(10, AppendPolicy::default());
    let pool = db.pool();

    db.load(&pool, 0..10);

    assert_eq!(db.file.page_count().unwrap(), 2);
    assert_eq!(db.committed_values(), (0..10).collect::<Vec<_>>());

    let txn = Transaction::begin();
    let rids: Vec<RecordId> = db
        .scan(&pool, txn.id())
        .iter()
        .map(|t| t.record_id().unwrap())
        .collect();
    txn.commit(&pool).unwrap();

    assert_eq!(rids[0], RecordId::new(db.page(0), 0));
    assert_eq!(rids[6], RecordId::new(db.page(0), 6));
    assert_eq!(rids[7], RecordId::new(db.page(1), 0));
}

#[test]
fn test_freed_slot_is_reused() {
    let db = Db::new(10, AppendPolicy::default());
    let pool = db.pool();
    db.load(&pool, 0..ROWS_PER_PAGE + 2);

    let txn = Transaction::begin();
    let victim = db.scan(&pool, txn.id()).into_iter().nth(2).unwrap();
    pool.delete_tuple(txn.id(), &victim).unwrap();
    pool.insert_tuple(txn.id(), db.table, db.row(100)).unwrap();
    txn.commit(&pool).unwrap();

    assert_eq!(db.file.page_count().unwrap(), 2);
    let page = db.file.read_page(db.page(0)).unwrap();
    assert_eq!(first(page.tuple(2).unwrap()), 100);
}

#[test]
fn test_double_delete_fails() {
    let db = Db::new(10, AppendPolicy::default());
    let pool = db.pool();
    db.load(&pool, 0..3);

    let txn = Transaction::begin();
    let victim = db.scan(&pool, txn.id()).into_iter().next().unwrap();
    pool.delete_tuple(txn.id(), &victim).unwrap();

    let err = pool.delete_tuple(txn.id(), &victim).unwrap_err();
    assert!(matches!(err, Error::SlotEmpty { slot: 0, .. }));
    txn.abort(&pool).unwrap();

    assert_eq!(db.committed_values(), vec![0, 1, 2]);
}

#[test]
fn test_schema_mismatch_rejected() {
    let db = Db::new(10, AppendPolicy::default());
    let pool = db.pool();
    let other = Arc::new(TupleDesc::new(vec![FieldType::Int]));
    let tuple = Tuple::new(other, vec![Field::Int(1)]).unwrap();

    let txn = Transaction::begin();
    let err = pool.insert_tuple(txn.id(), db.table, tuple).unwrap_err();
    assert!(matches!(err, Error::SchemaMismatch(_)));
    txn.abort(&pool).unwrap();
}

#[test]
fn test_abort_restores_committed_state() {
    let db = Db::new(10, AppendPolicy::default());
    let pool = db.pool();
    db.load(&pool, 0..3);

    let txn = Transaction::begin();
    pool.insert_tuple(txn.id(), db.table, db.row(99)).unwrap();
    assert!(pool.holds_lock(txn.id(), db.page(0)));
    let id = txn.id();
    txn.abort(&pool).unwrap();

    assert!(!pool.holds_lock(id, db.page(0)));
    assert_eq!(db.committed_values(), vec![0, 1, 2]);

    let txn = Transaction::begin();
    let values: Vec<i32> = db.scan(&pool, txn.id()).iter().map(first).collect();
    txn.commit(&pool).unwrap();
    assert_eq!(values, vec![0, 1, 2]);
}

#[test]
fn test_commit_is_durable_across_pools() {
    let db = Db::new(10, AppendPolicy::default());
    {
        let pool = db.pool();
        db.load(&pool, 0..3);

        let txn = Transaction::begin();
        pool.insert_tuple(txn.id(), db.table, db.row(3)).unwrap();
        txn.commit(&pool).unwrap();
    }

    let reopened = Arc::new(
        HeapFile::open(db.file.path(), Arc::clone(&db.desc), &db.config).unwrap(),
    );
    assert_eq!(reopened.id(), db.table);
    assert_eq!(db.committed_values(), vec![0, 1, 2, 3]);
    assert!(db.dir.path().join("table.dat").exists());
}

#[test]
fn test_read_your_writes() {
    let db = Db::new(10, AppendPolicy::default());
    let pool = db.pool();
    db.load(&pool, 0..2);

    let txn = Transaction::begin();
    pool.insert_tuple(txn.id(), db.table, db.row(42)).unwrap();
    let values: Vec<i32> = db.scan(&pool, txn.id()).iter().map(first).collect();
    assert_eq!(values, vec![0, 1, 42]);
    txn.abort(&pool).unwrap();
}

#[test]
fn test_iterator_rewind() {
    let db = Db::new(10, AppendPolicy::default());
    let pool = db.pool();
    db.load(&pool, 0..ROWS_PER_PAGE + 1);

    let txn = Transaction::begin();
    let mut iter = db.file.iter(&pool, txn.id());
    let head: Vec<i32> = iter.by_ref().take(3).map(|t| first(&t.unwrap())).collect();
    assert_eq!(head, vec![0, 1, 2]);

    iter.rewind();
    let all: Vec<i32> = iter.map(|t| first(&t.unwrap())).collect();
    assert_eq!(all, (0..ROWS_PER_PAGE + 1).collect::<Vec<_>>());
    txn.commit(&pool).unwrap();
}

#[test]
fn test_scan_holds_shared_locks_until_end() {
    let db = Db::new(10, AppendPolicy::default());
    let pool = db.pool();
    db.load(&pool, 0..ROWS_PER_PAGE + 1);

    let txn = Transaction::begin();
    assert_eq!(db.scan(&pool, txn.id()).len(), (ROWS_PER_PAGE + 1) as usize);
    assert_eq!(
        pool.lock_manager().locked_pages(txn.id()),
        vec![db.page(0), db.page(1)]
    );
    let id = txn.id();
    txn.commit(&pool).unwrap();
    assert!(pool.lock_manager().locked_pages(id).is_empty());
}

#[test]
fn test_extend_empty_append_is_undone_by_abort() {
    let db = Db::new(10, AppendPolicy::ExtendEmpty);
    let pool = db.pool();

    let txn = Transaction::begin();
    pool.insert_tuple(txn.id(), db.table, db.row(1)).unwrap();
    assert_eq!(db.file.page_count().unwrap(), 1);
    assert_eq!(db.file.read_page(db.page(0)).unwrap().num_empty_slots(), 7);
    txn.abort(&pool).unwrap();

    assert_eq!(db.file.page_count().unwrap(), 1);
    assert!(db.committed_values().is_empty());
}

#[test]
fn test_write_through_append_survives_abort() {
    let db = Db::new(10, AppendPolicy::WriteThrough);
    let pool = db.pool();

    let txn = Transaction::begin();
    pool.insert_tuple(txn.id(), db.table, db.row(1)).unwrap();
    assert_eq!(db.file.read_page(db.page(0)).unwrap().num_empty_slots(), 6);
    txn.abort(&pool).unwrap();

    assert_eq!(db.committed_values(), vec![1]);
}

#[test]
fn test_eviction_drops_least_recently_used() {
    let db = Db::new(3, AppendPolicy::default());
    db.load(&db.pool(), 0..ROWS_PER_PAGE * 4);
    assert_eq!(db.file.page_count().unwrap(), 4);

    let pool = db.pool();
    let txn = Transaction::begin();
    for n in [0, 1, 2, 0, 3] {
        pool.fetch(txn.id(), db.page(n), Permissions::ReadOnly).unwrap();
    }

    assert!(pool.contains_page(db.page(0)));
    assert!(!pool.contains_page(db.page(1)));
    assert!(pool.contains_page(db.page(2)));
    assert!(pool.contains_page(db.page(3)));
    assert_eq!(pool.stats().snapshot().evictions, 1);
    txn.commit(&pool).unwrap();
}

#[test]
fn test_dirty_pages_are_never_evicted() {
    let db = Db::new(2, AppendPolicy::default());
    db.load(&db.pool(), 0..ROWS_PER_PAGE * 3);

    let pool = db.pool();
    let txn = Transaction::begin();
    let victim = db.file.read_page(db.page(0)).unwrap().tuple(0).cloned().unwrap();
    pool.delete_tuple(txn.id(), &victim).unwrap();

    pool.fetch(txn.id(), db.page(1), Permissions::ReadOnly).unwrap();
    pool.fetch(txn.id(), db.page(2), Permissions::ReadOnly).unwrap();
    assert!(pool.contains_page(db.page(0)));
    assert!(!pool.contains_page(db.page(1)));

    let page = pool.fetch(txn.id(), db.page(2), Permissions::ReadWrite).unwrap();
    page.write().mark_dirty(Some(txn.id()));
    let err = pool.fetch(txn.id(), db.page(1), Permissions::ReadOnly).unwrap_err();
    assert!(matches!(err, Error::NoEvictablePage(2)));

    txn.abort(&pool).unwrap();
    assert_eq!(db.committed_values().len(), (ROWS_PER_PAGE * 3) as usize);
}

#[test]
fn test_discard_page_writes_then_drops() {
    let db = Db::new(4, AppendPolicy::default());
    let pool = db.pool();
    db.load(&pool, 0..3);

    let txn = Transaction::begin();
    let victim = db.scan(&pool, txn.id()).into_iter().next().unwrap();
    pool.delete_tuple(txn.id(), &victim).unwrap();
    pool.discard_page(db.page(0)).unwrap();
    assert!(!pool.contains_page(db.page(0)));
    txn.commit(&pool).unwrap();

    assert_eq!(db.committed_values(), vec![1, 2]);
}

#[test]
fn test_stats_accuracy() {
    let db = Db::new(4, AppendPolicy::default());
    db.load(&db.pool(), 0..ROWS_PER_PAGE * 2);

    let pool = db.pool();
    let txn = Transaction::begin();
    for n in [0, 1, 0, 0] {
        pool.fetch(txn.id(), db.page(n), Permissions::ReadOnly).unwrap();
    }
    txn.commit(&pool).unwrap();

    let stats = pool.stats().snapshot();
    assert_eq!(stats.cache_misses, 2);
    assert_eq!(stats.cache_hits, 2);
    assert_eq!(stats.pages_read, 2);
    assert_eq!(stats.pages_written, 0);
    assert_eq!(stats.hit_rate(), 0.5);
}

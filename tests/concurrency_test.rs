//! Multi-threaded tests for page locking through the buffer pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use strataheap::tuple::{Field, FieldType, Tuple, TupleDesc};
use strataheap::{
    AppendPolicy, BufferPool, Catalog, DbFile, DeadlockPolicy, Error, HeapFile, LockMode, PageId,
    Permissions, StorageConfig, TableId, Transaction,
};
use tempfile::{tempdir, TempDir};

struct Db {
    _dir: TempDir,
    desc: Arc<TupleDesc>,
    file: Arc<HeapFile>,
    table: TableId,
    pool: Arc<BufferPool>,
}

/// A table with `pages` committed full pages behind a 16-page pool.
fn setup(pages: u32, deadlock_policy: DeadlockPolicy) -> Db {
    let config = StorageConfig {
        page_size: 64,
        pool_pages: 16,
        deadlock_policy,
        append_policy: AppendPolicy::ExtendEmpty,
    };
    let dir = tempdir().unwrap();
    let desc = Arc::new(TupleDesc::new(vec![FieldType::Int]));
    let file = Arc::new(HeapFile::create(dir.path().join("t.dat"), Arc::clone(&desc), &config).unwrap());
    let catalog = Arc::new(Catalog::new());
    let table = catalog.add_table(file.clone()).unwrap();
    let pool = Arc::new(BufferPool::new(catalog, &config));

    let db = Db { _dir: dir, desc, file, table, pool };
    let txn = Transaction::begin();
    let mut v = 0;
    while db.file.page_count().unwrap() < pages {
        db.pool.insert_tuple(txn.id(), db.table, db.row(v)).unwrap();
        v += 1;
    }
    txn.commit(&db.pool).unwrap();
    db
}

impl Db {
    fn row(&self, v: i32) -> Tuple {
        Tuple::new(Arc::clone(&self.desc), vec![Field::Int(v)]).unwrap()
    }

    fn page(&self, n: u32) -> PageId {
        PageId::new(self.table, n)
    }
}

#[test]
fn test_exclusive_excludes_readers() {
    let db = setup(1, DeadlockPolicy::default());
    let writer = Transaction::begin();
    db.pool.fetch(writer.id(), db.page(0), Permissions::ReadWrite).unwrap();

    let read_done = Arc::new(AtomicBool::new(false));
    let reader = {
        let pool = Arc::clone(&db.pool);
        let pid = db.page(0);
        let read_done = Arc::clone(&read_done);
        thread::spawn(move || {
            let txn = Transaction::begin();
            pool.fetch(txn.id(), pid, Permissions::ReadOnly).unwrap();
            read_done.store(true, Ordering::SeqCst);
            assert_eq!(pool.lock_manager().lock_mode(pid), Some(LockMode::Shared));
            txn.commit(&pool).unwrap();
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!read_done.load(Ordering::SeqCst));
    assert_eq!(db.pool.lock_manager().holders(db.page(0)), vec![writer.id()]);

    writer.commit(&db.pool).unwrap();
    reader.join().unwrap();
    assert!(read_done.load(Ordering::SeqCst));
}

#[test]
fn test_readers_share() {
    let db = setup(1, DeadlockPolicy::default());
    let (a, b) = (Transaction::begin(), Transaction::begin());

    db.pool.fetch(a.id(), db.page(0), Permissions::ReadOnly).unwrap();
    db.pool.fetch(b.id(), db.page(0), Permissions::ReadOnly).unwrap();
    assert!(db.pool.holds_lock(a.id(), db.page(0)));
    assert!(db.pool.holds_lock(b.id(), db.page(0)));

    a.commit(&db.pool).unwrap();
    b.commit(&db.pool).unwrap();
    assert_eq!(db.pool.lock_manager().lock_mode(db.page(0)), None);
}

#[test]
fn test_release_page_lets_writer_in() {
    let db = setup(1, DeadlockPolicy::default());
    let (reader, writer) = (Transaction::begin(), Transaction::begin());

    db.pool.fetch(reader.id(), db.page(0), Permissions::ReadOnly).unwrap();
    db.pool.release_page(reader.id(), db.page(0));
    db.pool.fetch(writer.id(), db.page(0), Permissions::ReadWrite).unwrap();

    assert!(!db.pool.holds_lock(reader.id(), db.page(0)));
    reader.commit(&db.pool).unwrap();
    writer.commit(&db.pool).unwrap();
}

/// Run two transactions that each lock `first` then `second` of two pages
/// in opposite orders. Returns one result per transaction.
fn run_crossed_writers(db: &Db) -> Vec<Result<(), Error>> {
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [(0, 1), (1, 0)]
        .into_iter()
        .map(|(first, second)| {
            let pool = Arc::clone(&db.pool);
            let barrier = Arc::clone(&barrier);
            let (first, second) = (db.page(first), db.page(second));
            thread::spawn(move || {
                let txn = Transaction::begin();
                pool.fetch(txn.id(), first, Permissions::ReadWrite).unwrap();
                barrier.wait();
                match pool.fetch(txn.id(), second, Permissions::ReadWrite) {
                    Ok(_) => {
                        txn.commit(&pool).unwrap();
                        Ok(())
                    }
                    Err(e) => {
                        txn.abort(&pool).unwrap();
                        Err(e)
                    }
                }
            })
        })
        .collect();

    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn test_deadlock_aborts_exactly_one() {
    let db = setup(2, DeadlockPolicy::CycleDetection);

    let results = run_crossed_writers(&db);

    let aborted: Vec<_> = results.iter().filter(|r| r.is_err()).collect();
    assert_eq!(aborted.len(), 1);
    assert!(matches!(aborted[0], Err(Error::TransactionAborted(_))));
    assert_eq!(db.pool.stats().snapshot().deadlock_aborts, 1);

    assert_eq!(db.pool.lock_manager().lock_mode(db.page(0)), None);
    assert_eq!(db.pool.lock_manager().lock_mode(db.page(1)), None);
}

#[test]
fn test_timeout_policy_breaks_deadlock() {
    let db = setup(2, DeadlockPolicy::Timeout(Duration::from_millis(200)));

    let results = run_crossed_writers(&db);

    assert!(results.iter().any(|r| matches!(r, Err(Error::TransactionAborted(_)))));
    assert_eq!(db.pool.lock_manager().lock_mode(db.page(0)), None);
    assert_eq!(db.pool.lock_manager().lock_mode(db.page(1)), None);
}

#[test]
fn test_append_waits_on_page_lock_not_file_latch() {
    let db = setup(0, DeadlockPolicy::CycleDetection);
    let first = Transaction::begin();

    // Page 0 does not exist yet, but the failed fetch still leaves it locked.
    assert!(matches!(
        db.pool.fetch(first.id(), db.page(0), Permissions::ReadWrite),
        Err(Error::Io(_))
    ));
    assert!(db.pool.holds_lock(first.id(), db.page(0)));

    let (tx, rx) = mpsc::channel();
    let second = {
        let pool = Arc::clone(&db.pool);
        let table = db.table;
        let row = db.row(2);
        thread::spawn(move || {
            let txn = Transaction::begin();
            let result = pool.insert_tuple(txn.id(), table, row);
            match &result {
                Ok(()) => txn.commit(&pool).unwrap(),
                Err(_) => txn.abort(&pool).unwrap(),
            }
            tx.send(result).unwrap();
        })
    };

    // Let the second inserter block on page 0.
    thread::sleep(Duration::from_millis(100));
    db.pool.insert_tuple(first.id(), db.table, db.row(1)).unwrap();
    first.commit(&db.pool).unwrap();

    let result = rx.recv_timeout(Duration::from_secs(5)).expect("second insert never finished");
    second.join().unwrap();
    result.unwrap();

    assert_eq!(db.file.page_count().unwrap(), 1);
    let reader = Transaction::begin();
    let values: Vec<_> = db
        .file
        .iter(&db.pool, reader.id())
        .map(|t| t.unwrap().field(0).cloned())
        .collect();
    reader.commit(&db.pool).unwrap();
    assert_eq!(values, vec![Some(Field::Int(1)), Some(Field::Int(2))]);
}

#[test]
fn test_concurrent_inserters() {
    let db = setup(1, DeadlockPolicy::default());
    let reader = Transaction::begin();
    let before = db.file.iter(&db.pool, reader.id()).count();
    reader.commit(&db.pool).unwrap();
    const THREADS: i32 = 4;
    const ROWS: i32 = 20;

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let pool = Arc::clone(&db.pool);
            let desc = Arc::clone(&db.desc);
            let table = db.table;
            thread::spawn(move || {
                for i in 0..ROWS {
                    loop {
                        let txn = Transaction::begin();
                        let row = Tuple::new(Arc::clone(&desc), vec![Field::Int(t * 1000 + i)]).unwrap();
                        match pool.insert_tuple(txn.id(), table, row) {
                            Ok(()) => {
                                txn.commit(&pool).unwrap();
                                break;
                            }
                            Err(Error::TransactionAborted(_)) => txn.abort(&pool).unwrap(),
                            Err(e) => panic!("insert failed: {}", e),
                        }
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let txn = Transaction::begin();
    let mut values: Vec<i32> = db
        .file
        .iter(&db.pool, txn.id())
        .map(|t| match t.unwrap().field(0) {
            Some(Field::Int(v)) => *v,
            other => panic!("unexpected field {:?}", other),
        })
        .collect();
    txn.commit(&db.pool).unwrap();

    assert_eq!(values.len(), before + (THREADS * ROWS) as usize);
    values.sort();
    for t in 0..THREADS {
        for i in 0..ROWS {
            assert!(values.binary_search(&(t * 1000 + i)).is_ok());
        }
    }
}

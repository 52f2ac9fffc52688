//! Lock Manager - page-granularity shared/exclusive locks.
//!
//! The [`LockManager`] provides:
//! - Shared and exclusive page locks with in-place upgrade
//! - Blocking acquisition with wake-up on release
//! - Eager deadlock detection over a wait-for graph (or a wait timeout)
//! - Release of everything a transaction holds at once

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::common::config::DeadlockPolicy;
use crate::common::{Error, PageId, Result, TransactionId};

use super::WaitForGraph;

/// Lock strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Who holds a page and how. Absent when the page is unlocked.
///
/// An exclusive entry has exactly one holder.
#[derive(Debug)]
struct LockEntry {
    mode: LockMode,
    holders: HashSet<TransactionId>,
}

/// Per-page mutual-exclusion domain: the page's lock entry plus the
/// condition its waiters sleep on.
#[derive(Default)]
struct LockSlot {
    entry: Mutex<Option<LockEntry>>,
    released: Condvar,
}

enum Decision {
    Granted,
    Blocked(Vec<TransactionId>),
}

/// Try to grant `mode` on a page to `txn`, updating the entry in place.
///
/// Returns the conflicting holders when the request must wait.
fn decide(entry: &mut Option<LockEntry>, txn: TransactionId, mode: LockMode) -> Decision {
    if let Some(e) = entry.as_mut() {
        let only_holder = e.holders.len() == 1 && e.holders.contains(&txn);
        return match (mode, e.mode) {
            (LockMode::Shared, LockMode::Shared) => {
                e.holders.insert(txn);
                Decision::Granted
            }
            (LockMode::Shared, LockMode::Exclusive) if only_holder => Decision::Granted,
            (LockMode::Exclusive, _) if only_holder => {
                e.mode = LockMode::Exclusive;
                Decision::Granted
            }
            _ => Decision::Blocked(e.holders.iter().copied().filter(|h| *h != txn).collect()),
        };
    }

    *entry = Some(LockEntry {
        mode,
        holders: HashSet::from([txn]),
    });
    Decision::Granted
}

fn remove_holder(entry: &mut Option<LockEntry>, txn: TransactionId) -> bool {
    let Some(e) = entry.as_mut() else {
        return false;
    };
    let removed = e.holders.remove(&txn);
    if e.holders.is_empty() {
        *entry = None;
    }
    removed
}

/// Page lock table for two-phase locking.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────┐
/// │                       LockManager                        │
/// │  ┌────────────────────┐    ┌──────────────────────────┐  │
/// │  │ slots              │    │ LockSlot (one per page)  │  │
/// │  │ PageId → LockSlot  │───▶│ Mutex<entry> + Condvar   │  │
/// │  └────────────────────┘    └──────────────────────────┘  │
/// │  ┌────────────────────┐    ┌──────────────────────────┐  │
/// │  │ held               │    │ graph                    │  │
/// │  │ Txn → {PageId}     │    │ WaitForGraph             │  │
/// │  └────────────────────┘    └──────────────────────────┘  │
/// └──────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `slots`: `Mutex` held only to find or create a page's slot
/// - each `LockSlot`: serializes decisions for its page; waiters on the page
///   sleep on its condvar, so unrelated pages never contend
/// - `graph`: `Mutex` for global operations (edge updates, cycle search),
///   taken while holding at most one slot mutex
/// - `held`: `Mutex` over the per-transaction page sets used by release
///
/// Slots are kept after their page becomes unlocked.
pub struct LockManager {
    slots: Mutex<HashMap<PageId, Arc<LockSlot>>>,
    held: Mutex<HashMap<TransactionId, HashSet<PageId>>>,
    graph: Mutex<WaitForGraph>,
    policy: DeadlockPolicy,
}

impl LockManager {
    pub fn new(policy: DeadlockPolicy) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            held: Mutex::new(HashMap::new()),
            graph: Mutex::new(WaitForGraph::new()),
            policy,
        }
    }

    pub fn policy(&self) -> DeadlockPolicy {
        self.policy
    }

    // ========================================================================
    // Acquire
    // ========================================================================

    /// Acquire `mode` on `page_id` for `txn`, blocking while it conflicts.
    ///
    /// Re-requesting a lock the transaction already holds (or a shared lock
    /// while holding exclusive) returns immediately. A sole shared holder
    /// asking for exclusive is upgraded in place.
    ///
    /// # Errors
    /// `Error::TransactionAborted` if waiting would complete a wait-for cycle
    /// (or, under [`DeadlockPolicy::Timeout`], the wait timed out). The
    /// request is not left waiting; the caller must abort `txn`.
    pub fn acquire(&self, txn: TransactionId, page_id: PageId, mode: LockMode) -> Result<()> {
        let slot = self.slot(page_id);
        let mut deadline: Option<Instant> = None;
        let mut waited = false;

        let mut entry = slot.entry.lock();
        loop {
            let blockers = match decide(&mut entry, txn, mode) {
                Decision::Granted => break,
                Decision::Blocked(blockers) => blockers,
            };
            waited = true;

            match self.policy {
                DeadlockPolicy::CycleDetection => {
                    let mut graph = self.graph.lock();
                    graph.set_waits(txn, blockers.iter().copied());
                    if graph.has_cycle() {
                        graph.remove_waiter(txn);
                        log::debug!(
                            "{} aborted: {:?} on {} would deadlock with {:?}",
                            txn,
                            mode,
                            page_id,
                            blockers
                        );
                        return Err(Error::TransactionAborted(txn));
                    }
                    drop(graph);

                    log::trace!("{} waiting for {:?} on {} held by {:?}", txn, mode, page_id, blockers);
                    slot.released.wait(&mut entry);
                }
                DeadlockPolicy::Timeout(limit) => {
                    let until = *deadline.get_or_insert_with(|| Instant::now() + limit);
                    if slot.released.wait_until(&mut entry, until).timed_out() {
                        if let Decision::Granted = decide(&mut entry, txn, mode) {
                            break;
                        }
                        log::debug!(
                            "{} aborted: {:?} on {} timed out after {:?}",
                            txn,
                            mode,
                            page_id,
                            limit
                        );
                        return Err(Error::TransactionAborted(txn));
                    }
                }
            }
        }

        if waited && self.policy == DeadlockPolicy::CycleDetection {
            self.graph.lock().remove_waiter(txn);
        }
        drop(entry);

        self.held.lock().entry(txn).or_default().insert(page_id);
        log::trace!("{} granted {:?} on {}", txn, mode, page_id);
        Ok(())
    }

    // ========================================================================
    // Release
    // ========================================================================

    /// Release every lock `txn` holds and remove it from the wait-for graph.
    ///
    /// Waiters on each released page are woken to retry.
    pub fn release_all(&self, txn: TransactionId) {
        let pages = self.held.lock().remove(&txn).unwrap_or_default();
        for page_id in &pages {
            self.release_slot(txn, *page_id);
        }
        self.graph.lock().remove_transaction(txn);
        log::trace!("{} released {} page locks", txn, pages.len());
    }

    /// Release one page lock ahead of transaction end.
    ///
    /// Breaks two-phase locking; only safe for pages the transaction did not
    /// read or modify in a way later operations depend on.
    pub fn release(&self, txn: TransactionId, page_id: PageId) {
        {
            let mut held = self.held.lock();
            if let Some(pages) = held.get_mut(&txn) {
                pages.remove(&page_id);
                if pages.is_empty() {
                    held.remove(&txn);
                }
            }
        }
        self.release_slot(txn, page_id);
    }

    fn release_slot(&self, txn: TransactionId, page_id: PageId) {
        let Some(slot) = self.slots.lock().get(&page_id).cloned() else {
            return;
        };
        let mut entry = slot.entry.lock();
        remove_holder(&mut entry, txn);
        slot.released.notify_all();
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Whether `txn` holds any lock on `page_id`. Never blocks on page locks.
    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.with_entry(page_id, |e| e.is_some_and(|e| e.holders.contains(&txn)))
    }

    /// Current mode of `page_id`, or `None` if unlocked.
    pub fn lock_mode(&self, page_id: PageId) -> Option<LockMode> {
        self.with_entry(page_id, |e| e.map(|e| e.mode))
    }

    /// Current holders of `page_id`, in id order.
    pub fn holders(&self, page_id: PageId) -> Vec<TransactionId> {
        let mut holders = self.with_entry(page_id, |e| {
            e.map(|e| e.holders.iter().copied().collect::<Vec<_>>())
                .unwrap_or_default()
        });
        holders.sort();
        holders
    }

    /// Pages `txn` holds locks on, in id order.
    pub fn locked_pages(&self, txn: TransactionId) -> Vec<PageId> {
        let mut pages: Vec<PageId> = self
            .held
            .lock()
            .get(&txn)
            .map(|p| p.iter().copied().collect())
            .unwrap_or_default();
        pages.sort();
        pages
    }

    /// Transactions `txn` is currently recorded as waiting on.
    pub fn waits_for(&self, txn: TransactionId) -> Vec<TransactionId> {
        self.graph.lock().waits_for(txn)
    }

    fn with_entry<T>(&self, page_id: PageId, f: impl FnOnce(Option<&LockEntry>) -> T) -> T {
        let slot = self.slots.lock().get(&page_id).cloned();
        match slot {
            Some(slot) => f(slot.entry.lock().as_ref()),
            None => f(None),
        }
    }

    fn slot(&self, page_id: PageId) -> Arc<LockSlot> {
        Arc::clone(self.slots.lock().entry(page_id).or_default())
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(DeadlockPolicy::default())
    }
}

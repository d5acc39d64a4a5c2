//! Strict two-phase page locking.
//!
//! Every page has one `Lock` word plus a FIFO queue of suspended requests.
//! All bookkeeping (lock words, holders, per-transaction grants, queues and
//! the blocked-on map) lives behind a single table mutex, so a grant attempt,
//! the deadlock check and the decision to enqueue see one consistent snapshot,
//! and a release can never slip in between a failed attempt and the enqueue.

use std::collections::{HashMap, HashSet, VecDeque};

use crossbeam::sync::{Parker, Unparker};
use log::{debug, warn};
use parking_lot::Mutex;

use crate::common::types::{PageId, Permissions, TransactionId};
use super::error::LockError;
use super::lock::Lock;

/// Who holds a page, as seen by the lock manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    Free,
    Shared(HashSet<TransactionId>),
    Exclusive(TransactionId),
}

struct LockRequest {
    txn: TransactionId,
    perm: Permissions,
    unparker: Unparker,
}

enum Grant {
    AlreadyHeld,
    Upgraded,
    Acquired,
    Denied,
}

#[derive(Default)]
struct LockTable {
    locks: HashMap<PageId, Lock>,
    /// page -> transactions holding any lock on it
    holders: HashMap<PageId, HashSet<TransactionId>>,
    /// transaction -> pages it holds, with the permission held
    held: HashMap<TransactionId, HashMap<PageId, Permissions>>,
    wait_queues: HashMap<PageId, VecDeque<LockRequest>>,
    blocked_on: HashMap<TransactionId, PageId>,
    /// parked transactions whose request was cancelled by `release_all`
    withdrawn: HashSet<TransactionId>,
}

impl LockTable {
    fn held_permission(&self, txn: TransactionId, page: PageId) -> Option<Permissions> {
        self.held.get(&txn).and_then(|pages| pages.get(&page)).copied()
    }

    fn try_grant(&mut self, txn: TransactionId, page: PageId, perm: Permissions) -> Grant {
        if let Some(current) = self.held_permission(txn, page) {
            if current.covers(perm) {
                return Grant::AlreadyHeld;
            }
            // Upgrades are gated only by the other readers, never by the queue.
            let lock = self.locks.entry(page).or_default();
            if lock.upgrade() {
                self.record_grant(txn, page, Permissions::ReadWrite);
                return Grant::Upgraded;
            }
            return Grant::Denied;
        }

        if self.has_waiters_ahead(txn, page) {
            return Grant::Denied;
        }

        let lock = self.locks.entry(page).or_default();
        let acquired = match perm {
            Permissions::ReadOnly => lock.acquire_shared(),
            Permissions::ReadWrite => lock.acquire_exclusive(),
        };
        if acquired {
            self.record_grant(txn, page, perm);
            Grant::Acquired
        } else {
            Grant::Denied
        }
    }

    fn record_grant(&mut self, txn: TransactionId, page: PageId, perm: Permissions) {
        self.held.entry(txn).or_default().insert(page, perm);
        self.holders.entry(page).or_default().insert(txn);
    }

    fn has_waiters_ahead(&self, txn: TransactionId, page: PageId) -> bool {
        match self.wait_queues.get(&page) {
            None => false,
            Some(queue) => match queue.iter().position(|request| request.txn == txn) {
                Some(position) => position > 0,
                None => !queue.is_empty(),
            },
        }
    }

    fn requested_permission(&self, txn: TransactionId, page: PageId) -> Permissions {
        self.wait_queues
            .get(&page)
            .and_then(|queue| queue.iter().find(|request| request.txn == txn))
            .map_or(Permissions::ReadWrite, |request| request.perm)
    }

    /// Outgoing wait-for edges of `txn` if it waits for `perm` on `page`:
    /// conflicting holders, plus everyone queued ahead of it.
    fn blockers(&self, txn: TransactionId, page: PageId, perm: Permissions) -> Vec<TransactionId> {
        let mut blockers: Vec<TransactionId> = self
            .holders
            .get(&page)
            .into_iter()
            .flatten()
            .copied()
            .filter(|&holder| holder != txn)
            .filter(|&holder| {
                perm == Permissions::ReadWrite
                    || self.held_permission(holder, page) == Some(Permissions::ReadWrite)
            })
            .collect();

        let upgrading = self.held_permission(txn, page).is_some();
        if !upgrading {
            if let Some(queue) = self.wait_queues.get(&page) {
                blockers.extend(
                    queue
                        .iter()
                        .map(|request| request.txn)
                        .take_while(|&waiter| waiter != txn),
                );
            }
        }
        blockers
    }

    /// Depth-first search of the wait-for graph starting at the blockers of
    /// `txn`. `on_path` holds the current DFS path only and is popped on
    /// backtrack; `explored` holds nodes whose subtree is known cycle-free.
    fn has_deadlock(&self, txn: TransactionId, page: PageId, perm: Permissions) -> bool {
        let mut on_path = HashSet::from([txn]);
        let mut explored = HashSet::new();
        self.blockers(txn, page, perm)
            .into_iter()
            .any(|blocker| self.closes_cycle(blocker, &mut on_path, &mut explored))
    }

    fn closes_cycle(
        &self,
        txn: TransactionId,
        on_path: &mut HashSet<TransactionId>,
        explored: &mut HashSet<TransactionId>,
    ) -> bool {
        if on_path.contains(&txn) {
            return true;
        }
        if !explored.insert(txn) {
            return false;
        }
        let Some(&next_page) = self.blocked_on.get(&txn) else {
            return false;
        };

        let perm = self.requested_permission(txn, next_page);
        on_path.insert(txn);
        let found = self
            .blockers(txn, next_page, perm)
            .into_iter()
            .any(|blocker| self.closes_cycle(blocker, on_path, explored));
        on_path.remove(&txn);
        found
    }

    fn enqueue(&mut self, txn: TransactionId, page: PageId, perm: Permissions, unparker: Unparker) {
        self.blocked_on.insert(txn, page);
        let upgrading = self.held_permission(txn, page).is_some();
        let queue = self.wait_queues.entry(page).or_default();
        if queue.iter().any(|request| request.txn == txn) {
            return;
        }
        let request = LockRequest { txn, perm, unparker };
        if upgrading {
            queue.push_front(request);
        } else {
            queue.push_back(request);
        }
    }

    fn leave_queue(&mut self, txn: TransactionId, page: PageId) {
        self.blocked_on.remove(&txn);
        if let Some(queue) = self.wait_queues.get_mut(&page) {
            queue.retain(|request| {
                if request.txn == txn {
                    // A parked owner wakes up; `get_lock` decides whether it retries.
                    request.unparker.unpark();
                    false
                } else {
                    true
                }
            });
            if queue.is_empty() {
                self.wait_queues.remove(&page);
            }
        }
        self.wake_head(page);
        self.prune(page);
    }

    fn wake_head(&self, page: PageId) {
        if let Some(head) = self.wait_queues.get(&page).and_then(|queue| queue.front()) {
            head.unparker.unpark();
        }
    }

    fn prune(&mut self, page: PageId) {
        let unused = self.locks.get(&page).is_some_and(Lock::is_free)
            && !self.wait_queues.contains_key(&page);
        if unused {
            self.locks.remove(&page);
        }
    }

    fn release(&mut self, txn: TransactionId, page: PageId, perm: Permissions) -> bool {
        let Some(pages) = self.held.get_mut(&txn) else {
            return false;
        };
        if pages.get(&page) != Some(&perm) {
            return false;
        }
        pages.remove(&page);
        if pages.is_empty() {
            self.held.remove(&txn);
        }
        self.release_grant(txn, page, perm)
    }

    fn release_grant(&mut self, txn: TransactionId, page: PageId, perm: Permissions) -> bool {
        if let Some(holders) = self.holders.get_mut(&page) {
            holders.remove(&txn);
            if holders.is_empty() {
                self.holders.remove(&page);
            }
        }
        let released = self.locks.get(&page).is_some_and(|lock| match perm {
            Permissions::ReadOnly => lock.release_shared(),
            Permissions::ReadWrite => lock.release_exclusive(),
        });
        if released {
            self.wake_head(page);
        }
        self.prune(page);
        released
    }

    fn lock_state(&self, page: PageId) -> LockState {
        let Some(holders) = self.holders.get(&page) else {
            return LockState::Free;
        };
        let writer = holders
            .iter()
            .copied()
            .find(|&holder| self.held_permission(holder, page) == Some(Permissions::ReadWrite));
        match writer {
            Some(writer) => LockState::Exclusive(writer),
            None => LockState::Shared(holders.clone()),
        }
    }
}

/// Grants, tracks and releases page locks on behalf of transactions.
#[derive(Default)]
pub struct LockManager {
    table: Mutex<LockTable>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire `perm` on `page` for `txn`, blocking until it can be granted.
    ///
    /// Re-requesting a permission already held (or weaker) returns at once; a
    /// sole reader asking for `ReadWrite` is upgraded in place. If waiting
    /// would close a cycle in the wait-for graph the request fails with
    /// `LockError::Deadlock` and the caller must roll the transaction back.
    pub fn get_lock(
        &self,
        txn: TransactionId,
        page: PageId,
        perm: Permissions,
    ) -> Result<(), LockError> {
        let parker = Parker::new();
        let mut woken = false;
        loop {
            let mut table = self.table.lock();
            if !woken {
                table.withdrawn.remove(&txn);
            } else if table.withdrawn.remove(&txn) {
                debug!("{} withdrawn from the queue of page {}", txn, page);
                return Err(LockError::Withdrawn { txn, page });
            }

            match table.try_grant(txn, page, perm) {
                Grant::AlreadyHeld => return Ok(()),
                Grant::Upgraded | Grant::Acquired => {
                    table.leave_queue(txn, page);
                    debug!("{} granted {:?} on page {}", txn, perm, page);
                    return Ok(());
                }
                Grant::Denied => {}
            }

            if table.has_deadlock(txn, page, perm) {
                table.leave_queue(txn, page);
                warn!("Deadlock: aborting {} waiting for {:?} on page {}", txn, perm, page);
                return Err(LockError::Deadlock { txn, page });
            }

            table.enqueue(txn, page, perm, parker.unparker().clone());
            debug!("{} waiting for {:?} on page {}", txn, perm, page);
            drop(table);
            parker.park();
            woken = true;
        }
    }

    /// Release exactly `perm` on `page`. Returns false if `txn` did not hold it.
    pub fn release_lock(&self, txn: TransactionId, page: PageId, perm: Permissions) -> bool {
        let released = self.table.lock().release(txn, page, perm);
        if released {
            debug!("{} released {:?} on page {}", txn, perm, page);
        }
        released
    }

    /// Release every lock `txn` holds and withdraw any pending request.
    /// A thread parked in `get_lock` for `txn` returns `LockError::Withdrawn`.
    /// Returns the number of locks released.
    pub fn release_all(&self, txn: TransactionId) -> usize {
        let mut table = self.table.lock();
        if let Some(page) = table.blocked_on.get(&txn).copied() {
            table.withdrawn.insert(txn);
            table.leave_queue(txn, page);
        }
        let Some(pages) = table.held.remove(&txn) else {
            return 0;
        };
        let count = pages.len();
        for (page, perm) in pages {
            table.release_grant(txn, page, perm);
        }
        debug!("{} released all {} locks", txn, count);
        count
    }

    /// Whether `txn` holds `perm` or a stronger permission on `page`
    pub fn holds_lock(&self, txn: TransactionId, page: PageId, perm: Permissions) -> bool {
        self.table
            .lock()
            .held_permission(txn, page)
            .is_some_and(|held| held.covers(perm))
    }

    pub fn holds_any_lock(&self, txn: TransactionId, page: PageId) -> bool {
        self.table.lock().held_permission(txn, page).is_some()
    }

    /// Would `txn` waiting for `perm` on `page` close a wait-for cycle?
    pub fn has_deadlock(&self, txn: TransactionId, page: PageId, perm: Permissions) -> bool {
        self.table.lock().has_deadlock(txn, page, perm)
    }

    pub fn lock_state(&self, page: PageId) -> LockState {
        self.table.lock().lock_state(page)
    }

    pub fn locks_held_by(&self, txn: TransactionId) -> Vec<(PageId, Permissions)> {
        let table = self.table.lock();
        let mut locks: Vec<_> = table
            .held
            .get(&txn)
            .into_iter()
            .flatten()
            .map(|(&page, &perm)| (page, perm))
            .collect();
        locks.sort_by_key(|(page, _)| *page);
        locks
    }

    /// The page `txn` is currently suspended on, if any
    pub fn blocked_on(&self, txn: TransactionId) -> Option<PageId> {
        self.table.lock().blocked_on.get(&txn).copied()
    }

    pub fn queue_len(&self, page: PageId) -> usize {
        self.table.lock().wait_queues.get(&page).map_or(0, VecDeque::len)
    }
}

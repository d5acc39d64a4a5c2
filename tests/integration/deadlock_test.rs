// Deadlock and lock fairness integration tests

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use anyhow::Result;
use crossbeam::channel;
use rand::Rng;

use quarrydb::common::types::{PageId, Permissions, TransactionId};
use quarrydb::storage::buffer::BufferPoolError;
use quarrydb::transaction::{LockManager, LockState, Transaction, TransactionError};

#[path = "../common/mod.rs"]
mod common;
use common::{create_memory_pool, wait_until_blocked};

#[test]
fn test_crossed_writers_abort_exactly_one() -> Result<()> {
    let (pool, _table) = create_memory_pool(1, 4, 2)?;
    let barrier = Arc::new(Barrier::new(2));
    let aborts = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = [(0u32, 1u32), (1, 0)]
        .into_iter()
        .map(|(first, second)| {
            let pool = pool.clone();
            let barrier = barrier.clone();
            let aborts = aborts.clone();
            thread::spawn(move || -> Result<()> {
                let mut attempt = 0;
                loop {
                    let mut txn = Transaction::begin();
                    txn.get_page(&pool, PageId::new(1, first), Permissions::ReadWrite)?;
                    if attempt == 0 {
                        barrier.wait();
                    }
                    attempt += 1;

                    match txn.get_page(&pool, PageId::new(1, second), Permissions::ReadWrite) {
                        Ok(_) => {
                            txn.commit(&pool)?;
                            return Ok(());
                        }
                        Err(TransactionError::BufferPool(e)) if e.is_transaction_aborted() => {
                            aborts.fetch_add(1, Ordering::SeqCst);
                            // Already rolled back by the pool
                            assert!(pool.lock_manager().locks_held_by(txn.id()).is_empty());
                            txn.abort(&pool)?;
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap()?;
    }
    assert_eq!(aborts.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn test_requester_is_the_victim() -> Result<()> {
    let (pool, _table) = create_memory_pool(1, 4, 2)?;
    let (p1, p2) = (PageId::new(1, 0), PageId::new(1, 1));
    let a = TransactionId::new();
    let b = TransactionId::new();

    pool.get_page(a, p1, Permissions::ReadWrite)?;
    pool.get_page(b, p2, Permissions::ReadWrite)?;

    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.get_page(a, p2, Permissions::ReadWrite).map(|_| ()))
    };
    wait_until_blocked(pool.lock_manager(), a);

    assert!(pool.lock_manager().has_deadlock(b, p1, Permissions::ReadWrite));
    let result = pool.get_page(b, p1, Permissions::ReadWrite);
    assert!(matches!(result, Err(BufferPoolError::TransactionAborted(_))));
    assert!(!pool.holds_lock(b, p2));

    waiter.join().unwrap()?;
    assert!(pool.holds_lock(a, p2));
    pool.transaction_complete(a, true)?;
    Ok(())
}

#[test]
fn test_waiters_granted_in_arrival_order() -> Result<()> {
    let (pool, _table) = create_memory_pool(1, 4, 1)?;
    let pid = PageId::new(1, 0);
    let holder = TransactionId::new();
    pool.get_page(holder, pid, Permissions::ReadWrite)?;

    let (order_tx, order_rx) = channel::unbounded();
    let mut handles = Vec::new();
    let waiters: Vec<_> = (0..3).map(|_| TransactionId::new()).collect();
    for &txn in &waiters {
        let thread_pool = pool.clone();
        let order_tx = order_tx.clone();
        handles.push(thread::spawn(move || -> Result<()> {
            thread_pool.get_page(txn, pid, Permissions::ReadWrite)?;
            order_tx.send(txn)?;
            thread_pool.transaction_complete(txn, true)?;
            Ok(())
        }));
        wait_until_blocked(pool.lock_manager(), txn);
    }
    assert_eq!(pool.lock_manager().queue_len(pid), 3);

    pool.transaction_complete(holder, true)?;
    let granted: Vec<_> = (0..3)
        .map(|_| order_rx.recv_timeout(Duration::from_secs(5)))
        .collect::<Result<_, _>>()?;
    assert_eq!(granted, waiters);

    for handle in handles {
        handle.join().unwrap()?;
    }
    Ok(())
}

#[test]
fn test_reader_does_not_jump_queued_writer() -> Result<()> {
    let locks = Arc::new(LockManager::new());
    let pid = PageId::new(1, 0);
    let reader = TransactionId::new();
    let writer = TransactionId::new();
    let late_reader = TransactionId::new();

    locks.get_lock(reader, pid, Permissions::ReadOnly)?;
    let (order_tx, order_rx) = channel::unbounded();

    let spawn_waiter = |txn: TransactionId, perm: Permissions| {
        let locks = locks.clone();
        let order_tx = order_tx.clone();
        thread::spawn(move || -> Result<()> {
            locks.get_lock(txn, pid, perm)?;
            order_tx.send(txn)?;
            locks.release_all(txn);
            Ok(())
        })
    };

    let w = spawn_waiter(writer, Permissions::ReadWrite);
    wait_until_blocked(&locks, writer);
    let r = spawn_waiter(late_reader, Permissions::ReadOnly);
    wait_until_blocked(&locks, late_reader);

    locks.release_all(reader);
    let first = order_rx.recv_timeout(Duration::from_secs(5))?;
    let second = order_rx.recv_timeout(Duration::from_secs(5))?;
    assert_eq!((first, second), (writer, late_reader));

    w.join().unwrap()?;
    r.join().unwrap()?;
    Ok(())
}

/// Lock state mirrored by the test: >0 readers, -1 one writer, 0 free
fn enter(slot: &AtomicI64, perm: Permissions) {
    match perm {
        Permissions::ReadWrite => {
            let prev = slot.swap(-1, Ordering::SeqCst);
            assert_eq!(prev, 0, "writer admitted next to {} holder(s)", prev);
        }
        Permissions::ReadOnly => {
            let prev = slot.fetch_add(1, Ordering::SeqCst);
            assert!(prev >= 0, "reader admitted next to a writer");
        }
    }
}

fn leave(slot: &AtomicI64, perm: Permissions) {
    match perm {
        Permissions::ReadWrite => slot.store(0, Ordering::SeqCst),
        Permissions::ReadOnly => {
            slot.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[test]
fn test_mutual_exclusion_under_contention() {
    const PAGES: u32 = 4;
    const THREADS: usize = 8;
    const ROUNDS: usize = 200;

    let locks = Arc::new(LockManager::new());
    let slots: Arc<Vec<AtomicI64>> = Arc::new((0..PAGES).map(|_| AtomicI64::new(0)).collect());
    let committed = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let locks = locks.clone();
            let slots = slots.clone();
            let committed = committed.clone();
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..ROUNDS {
                    let txn = TransactionId::new();
                    let first = rng.gen_range(0..PAGES);
                    let second = (first + rng.gen_range(1..PAGES)) % PAGES;
                    let mut held = Vec::new();
                    let mut aborted = false;

                    for page_number in [first, second] {
                        let perm = if rng.gen_bool(0.5) {
                            Permissions::ReadWrite
                        } else {
                            Permissions::ReadOnly
                        };
                        if locks.get_lock(txn, PageId::new(1, page_number), perm).is_err() {
                            aborted = true;
                            break;
                        }
                        enter(&slots[page_number as usize], perm);
                        held.push((page_number, perm));
                    }

                    for (page_number, perm) in held {
                        leave(&slots[page_number as usize], perm);
                    }
                    locks.release_all(txn);
                    if !aborted {
                        committed.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(committed.load(Ordering::SeqCst) > 0);
    for page_number in 0..PAGES {
        assert_eq!(locks.lock_state(PageId::new(1, page_number)), LockState::Free);
        assert_eq!(locks.queue_len(PageId::new(1, page_number)), 0);
    }
}

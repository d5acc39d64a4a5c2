// Transaction Integration Tests

use std::thread;
use std::time::Duration;
use anyhow::Result;
use crossbeam::channel;

use quarrydb::common::types::{PageId, Permissions, TransactionId};
use quarrydb::transaction::{Transaction, TransactionError, TransactionState};

#[path = "../common/mod.rs"]
mod common;
use common::{create_memory_pool, scribble, wait_until_blocked};

#[test]
fn test_writer_waits_for_reader_then_reader_sees_commit() -> Result<()> {
    let (pool, table) = create_memory_pool(1, 2, 2)?;
    let page_a = PageId::new(1, 0);
    let t1 = TransactionId::new();
    let t2 = TransactionId::new();

    let page = pool.get_page(t1, page_a, Permissions::ReadOnly)?;
    assert_eq!(page.read().data()[0], 0);
    drop(page);

    let (granted_tx, granted_rx) = channel::unbounded();
    let writer = {
        let pool = pool.clone();
        thread::spawn(move || -> Result<()> {
            let page = pool.get_page(t2, page_a, Permissions::ReadWrite)?;
            granted_tx.send(())?;
            scribble(&pool, t2, page, 0x42)?;
            pool.transaction_complete(t2, true)?;
            Ok(())
        })
    };

    wait_until_blocked(pool.lock_manager(), t2);
    assert!(granted_rx.recv_timeout(Duration::from_millis(50)).is_err());

    pool.release_page(t1, page_a);
    granted_rx.recv_timeout(Duration::from_secs(5))?;
    writer.join().unwrap()?;

    assert_eq!(table.stored(0).unwrap()[0], 0x42);
    let page = pool.get_page(t1, page_a, Permissions::ReadOnly)?;
    assert_eq!(page.read().data()[0], 0x42);
    assert!(page.read().is_dirty().is_none());
    Ok(())
}

#[test]
fn test_flushed_page_served_from_cache() -> Result<()> {
    let (pool, table) = create_memory_pool(1, 4, 1)?;
    let pid = PageId::new(1, 0);
    let writer = TransactionId::new();

    let page = pool.get_page(writer, pid, Permissions::ReadWrite)?;
    page.write().data_mut()[..4].copy_from_slice(b"rust");
    pool.cache_dirty_pages(writer, vec![page])?;
    pool.transaction_complete(writer, true)?;

    let reader = TransactionId::new();
    let page = pool.get_page(reader, pid, Permissions::ReadOnly)?;
    assert_eq!(page.read().data(), table.stored(0).unwrap().as_slice());
    assert_eq!(&page.read().data()[..4], b"rust");
    assert_eq!(table.reads(), 1);
    Ok(())
}

#[test]
fn test_upgrade_without_release() -> Result<()> {
    let (pool, _table) = create_memory_pool(1, 2, 1)?;
    let pid = PageId::new(1, 0);
    let mut txn = Transaction::begin();
    let other = TransactionId::new();

    txn.get_page(&pool, pid, Permissions::ReadOnly)?;
    txn.get_page(&pool, pid, Permissions::ReadWrite)?;
    assert!(pool.lock_manager().holds_lock(txn.id(), pid, Permissions::ReadWrite));
    assert_eq!(pool.lock_manager().locks_held_by(txn.id()), vec![(pid, Permissions::ReadWrite)]);

    // Nobody else got in between
    let reader = {
        let pool = pool.clone();
        thread::spawn(move || pool.get_page(other, pid, Permissions::ReadOnly).map(|_| ()))
    };
    wait_until_blocked(pool.lock_manager(), other);

    txn.commit(&pool)?;
    reader.join().unwrap()?;
    assert!(pool.holds_lock(other, pid));
    Ok(())
}

#[test]
fn test_transaction_handle_states() -> Result<()> {
    let (pool, _table) = create_memory_pool(1, 2, 1)?;
    let pid = PageId::new(1, 0);

    let mut txn = Transaction::begin();
    assert_eq!(txn.state(), TransactionState::Active);
    txn.get_page(&pool, pid, Permissions::ReadWrite)?;
    txn.commit(&pool)?;
    assert_eq!(txn.state(), TransactionState::Committed);
    assert!(!pool.holds_lock(txn.id(), pid));

    assert!(matches!(txn.commit(&pool), Err(TransactionError::InvalidState(_))));
    assert!(matches!(txn.abort(&pool), Err(TransactionError::InvalidState(_))));
    assert!(matches!(
        txn.get_page(&pool, pid, Permissions::ReadOnly),
        Err(TransactionError::InvalidState(_))
    ));

    let mut txn = Transaction::begin();
    txn.get_page(&pool, pid, Permissions::ReadOnly)?;
    txn.abort(&pool)?;
    txn.abort(&pool)?;
    assert_eq!(txn.state(), TransactionState::Aborted);
    assert!(pool.lock_manager().locks_held_by(txn.id()).is_empty());
    Ok(())
}

#[test]
fn test_shared_readers_run_concurrently() -> Result<()> {
    let (pool, _table) = create_memory_pool(1, 4, 1)?;
    let pid = PageId::new(1, 0);
    let readers: Vec<_> = (0..4).map(|_| TransactionId::new()).collect();

    let handles: Vec<_> = readers
        .iter()
        .map(|&txn| {
            let pool = pool.clone();
            thread::spawn(move || pool.get_page(txn, pid, Permissions::ReadOnly).map(|_| ()))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap()?;
    }

    for &txn in &readers {
        assert!(pool.holds_lock(txn, pid));
    }
    for &txn in &readers {
        pool.transaction_complete(txn, true)?;
    }
    assert_eq!(pool.lock_manager().queue_len(pid), 0);
    assert!(pool.lock_manager().locks_held_by(readers[0]).is_empty());
    Ok(())
}

#[test]
fn test_completing_parked_transaction_withdraws_its_request() -> Result<()> {
    let (pool, _table) = create_memory_pool(1, 2, 2)?;
    let pid = PageId::new(1, 0);
    let holder = TransactionId::new();
    let waiter = TransactionId::new();

    pool.get_page(holder, pid, Permissions::ReadWrite)?;
    pool.get_page(waiter, PageId::new(1, 1), Permissions::ReadOnly)?;

    let parked = {
        let pool = pool.clone();
        thread::spawn(move || pool.get_page(waiter, pid, Permissions::ReadWrite).map(|_| ()))
    };
    wait_until_blocked(pool.lock_manager(), waiter);

    pool.transaction_complete(waiter, false)?;
    let result = parked.join().unwrap();
    assert!(result.is_err_and(|e| e.is_transaction_aborted()));

    // Nothing granted after completion, even once the page frees up
    pool.transaction_complete(holder, true)?;
    assert!(pool.lock_manager().locks_held_by(waiter).is_empty());
    assert!(!pool.holds_lock(waiter, pid));
    assert_eq!(pool.lock_manager().queue_len(pid), 0);
    Ok(())
}

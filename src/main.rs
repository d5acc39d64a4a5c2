use std::sync::Arc;
use std::thread;
use anyhow::Result;

use quarrydb::catalog::Catalog;
use quarrydb::common::types::{PageId, Permissions};
use quarrydb::storage::buffer::{BufferPool, BufferPoolConfig};
use quarrydb::storage::heap::{HeapFile, Tuple};
use quarrydb::transaction::Transaction;

fn main() -> Result<()> {
    // Create a table file in the temp directory
    let db_path = std::env::temp_dir().join("quarrydb_demo.db");
    let _ = std::fs::remove_file(&db_path);

    let catalog = Arc::new(Catalog::new());
    let table = Arc::new(HeapFile::new(1, &db_path)?);
    catalog.add_table(table.clone());

    // Two frames only: dirty pages must fit until commit
    let pool = Arc::new(BufferPool::new(BufferPoolConfig::new(2)?, catalog)?);

    // Seed two pages
    let mut setup = Transaction::begin();
    for payload in [vec![b'a'; 3000], vec![b'b'; 3000]] {
        let mut tuple = Tuple::new(payload);
        setup.insert_tuple(&pool, 1, &mut tuple)?;
        println!("Inserted tuple at {:?}", tuple.record_id());
    }
    setup.commit(&pool)?;
    println!("Table has {} pages", table.num_pages()?);

    // Two writers touching the pages in opposite order; one of them may be
    // chosen as a deadlock victim and retries
    let handles: Vec<_> = [(0u32, 1u32), (1, 0)]
        .into_iter()
        .map(|(first, second)| {
            let pool = pool.clone();
            thread::spawn(move || -> Result<usize> {
                let mut attempts = 0;
                loop {
                    attempts += 1;
                    let mut txn = Transaction::begin();
                    let outcome = txn
                        .get_page(&pool, PageId::new(1, first), Permissions::ReadWrite)
                        .and_then(|_| txn.get_page(&pool, PageId::new(1, second), Permissions::ReadWrite));
                    match outcome {
                        Ok(_) => {
                            txn.commit(&pool)?;
                            return Ok(attempts);
                        }
                        Err(e) => {
                            println!("{} gave up: {}", txn.id(), e);
                            txn.abort(&pool)?;
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        let attempts = handle
            .join()
            .map_err(|_| anyhow::anyhow!("writer thread panicked"))??;
        println!("Writer finished after {} attempt(s)", attempts);
    }

    let mut reader = Transaction::begin();
    let tuples = table.scan(&pool, reader.id())?;
    println!("Scan returned {} tuples; {} pages cached", tuples.len(), pool.len());
    reader.commit(&pool)?;

    Ok(())
}

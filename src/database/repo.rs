use std::path::Path;
use std::sync::{Mutex, PoisonError};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info};

use crate::database::schema::{ALL_TABLES, PRAGMAS, SCHEMA};
use crate::error::StorageResult;

const READ_POOL_SIZE: u32 = 4;

/// The metadata store. Writers serialize on a single connection guarded by a mutex;
/// readers draw from a pool and never touch that mutex.
pub struct Database {
    writer: Mutex<Connection>,
    readers: Pool<SqliteConnectionManager>,
}

impl Database {
    pub fn open(path: &Path) -> StorageResult<Self> {
        info!(path = %path.display(), "opening cache database");
        let mut conn = Connection::open(path)?;
        conn.execute_batch(PRAGMAS)?;
        {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute_batch(SCHEMA)?;
            tx.commit()?;
        }

        let manager = SqliteConnectionManager::file(path).with_init(|c| {
            c.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 15000;")
        });
        let readers = Pool::builder().max_size(READ_POOL_SIZE).build(manager)?;

        Ok(Self {
            writer: Mutex::new(conn),
            readers,
        })
    }

    /// Runs `f` inside one immediate transaction while holding the write lock.
    ///
    /// The transaction commits only if `f` succeeds. On an error, or a panic inside
    /// `f`, it is rolled back when dropped, and the lock is released with it.
    pub fn write<T>(&self, f: impl FnOnce(&Transaction) -> StorageResult<T>) -> StorageResult<T> {
        // A poisoned lock only means a writer panicked; its transaction was rolled back.
        let mut conn = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Runs `f` against one read snapshot. Takes no write lock.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> StorageResult<T>) -> StorageResult<T> {
        let mut conn = self.readers.get()?;
        let tx = conn.transaction()?;
        f(&tx)
    }
}

/// Empties every entity table and the validity ledger.
pub fn truncate_all(conn: &Connection) -> StorageResult<()> {
    for table in ALL_TABLES {
        let removed = conn.execute(&format!("DELETE FROM {table}"), [])?;
        debug!(table, removed, "truncated");
    }
    Ok(())
}

/// Row count per table, for status reporting.
pub fn table_counts(conn: &Connection) -> StorageResult<Vec<(&'static str, i64)>> {
    let mut counts = Vec::with_capacity(ALL_TABLES.len());
    for table in ALL_TABLES {
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        counts.push((table, count));
    }
    Ok(counts)
}

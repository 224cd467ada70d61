pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;


use std::path::Path;
use std::sync::{Mutex, TryLockError};
use std::time::{Duration, Instant};

use rusqlite::Connection;
use tracing::{info, warn};

pub use error::{DbError, Result};

/// Shared handle to the SQLite store. All access is serialized through one
/// connection, so a check followed by a write inside a single `with_conn`
/// call cannot interleave with another request.
///
/// Waiting for the connection is bounded by `lock_timeout`; a call that gets
/// the connection always runs to completion, so a caller that sees
/// `DbError::Busy` knows nothing was written.
pub struct Database {
    conn: Mutex<Connection>,
    lock_timeout: Duration,
}

const LOCK_POLL: Duration = Duration::from_millis(5);
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

impl Database {
    /// `timeout` bounds both the wait for the shared connection and SQLite's
    /// own wait on file locks held by other processes.
    pub fn open(path: &Path, timeout: Duration) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent readers from other processes
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(timeout)?;

        let db = Self::init(conn)?.with_lock_timeout(timeout);
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// Private in-memory store, used by tests.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let deadline = Instant::now() + self.lock_timeout;
        let conn = loop {
            match self.conn.try_lock() {
                Ok(conn) => break conn,
                Err(TryLockError::Poisoned(e)) => return Err(DbError::Poisoned(e.to_string())),
                Err(TryLockError::WouldBlock) if Instant::now() >= deadline => {
                    warn!("Store connection still busy after {:?}", self.lock_timeout);
                    return Err(DbError::Busy);
                }
                Err(TryLockError::WouldBlock) => std::thread::sleep(LOCK_POLL),
            }
        };
        f(&conn)
    }
}

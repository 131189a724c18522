//! SQLite storage engine: connection bootstrap, schema and write scopes.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the recipe catalog.
//! - Apply the schema in deterministic order.
//! - Share one connection across threads through [`Database`].
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - Every connection handed out has `foreign_keys=ON`.
//! - Only one caller at a time may use the connection.

use log::warn;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// A previous holder of the connection lock panicked.
    LockPoisoned,
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::LockPoisoned => write!(f, "database connection lock is poisoned"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::LockPoisoned => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Thread-safe handle over one migrated SQLite connection.
///
/// Constructed once by the composition root and shared behind an `Arc`.
/// Holding the guard returned by [`Database::lock`] excludes every other
/// reader and writer, which is what gives batches their exclusive scope.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Wraps an already bootstrapped connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Opens a file database and applies pending migrations.
    pub fn open(path: impl AsRef<std::path::Path>) -> DbResult<Self> {
        open_db(path).map(Self::new)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        open_db_in_memory().map(Self::new)
    }

    /// Acquires exclusive access to the connection.
    pub fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }
}

/// Runs `work` inside a named savepoint on `conn`.
///
/// Works both at top level and nested inside an open transaction. The
/// savepoint is released when `work` returns `Ok`, otherwise every change
/// made since it was opened is rolled back.
pub fn with_savepoint<T, E>(
    conn: &Connection,
    name: &str,
    work: impl FnOnce(&Connection) -> Result<T, E>,
) -> Result<T, E>
where
    E: From<rusqlite::Error>,
{
    conn.execute_batch(&format!("SAVEPOINT {name};"))?;
    match work(conn) {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE SAVEPOINT {name};"))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) =
                conn.execute_batch(&format!("ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name};"))
            {
                warn!(
                    "event=savepoint_rollback module=db status=error savepoint={name} error={rollback_err}"
                );
            }
            Err(err)
        }
    }
}

//! SQLite database module for hierarchy and survey storage
//!
//! ## Tables
//!
//! - `hierarchy_levels` - Ranked levels (dense 1-based `position`)
//! - `hierarchy_level_permissions` - Permission set per level
//! - `users`, `teams`, `team_supervisors` - Org structure and supervisory chain
//! - `dimensions` - Scored survey categories
//! - `sessions`, `responses` - Health-check sessions and per-user scores
//!
//! Writes that must be atomic (reordering, imports) run in a
//! `BEGIN IMMEDIATE` transaction so concurrent writers serialize on the
//! database lock instead of interleaving.

pub mod schema;
pub mod hierarchy;
pub mod surveys;
pub mod trends;

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::StorageError;

/// SQLite database for hierarchy levels and survey results
pub struct HealthDb {
    conn: Mutex<Connection>,
}

impl HealthDb {
    /// Open or create the database at `db_path`
    pub fn open(db_path: &Path, busy_timeout: Duration) -> Result<Self, StorageError> {
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(db_path)
            .map_err(|e| StorageError::query("Failed to open SQLite", e))?;

        // WAL for concurrent readers; foreign keys for cascades
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| StorageError::query("Failed to set PRAGMA", e))?;
        conn.busy_timeout(busy_timeout)?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StorageError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::query("Failed to open in-memory SQLite", e))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;

        Ok(db)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        self.with_conn(schema::init_schema)
    }

    /// Run a read against the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        let conn = self.conn.lock()
            .map_err(|e| StorageError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Execute a write operation with exclusive access (for transactions)
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StorageError>,
    {
        let mut conn = self.conn.lock()
            .map_err(|e| StorageError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, StorageError> {
        self.with_conn(|conn| {
            let count = |sql: &str| -> Result<u64, StorageError> {
                let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
                Ok(n as u64)
            };

            Ok(DbStats {
                hierarchy_levels: count("SELECT COUNT(*) FROM hierarchy_levels")?,
                users: count("SELECT COUNT(*) FROM users")?,
                teams: count("SELECT COUNT(*) FROM teams")?,
                dimensions: count("SELECT COUNT(*) FROM dimensions")?,
                sessions: count("SELECT COUNT(*) FROM sessions")?,
                completed_sessions: count("SELECT COUNT(*) FROM sessions WHERE status = 'completed'")?,
                responses: count("SELECT COUNT(*) FROM responses")?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DbStats {
    pub hierarchy_levels: u64,
    pub users: u64,
    pub teams: u64,
    pub dimensions: u64,
    pub sessions: u64,
    pub completed_sessions: u64,
    pub responses: u64,
}

// Re-exports
pub use surveys::{ImportSummary, SessionStatus, SurveyFixture};

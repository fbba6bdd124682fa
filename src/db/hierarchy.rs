//! Hierarchy level CRUD operations
//!
//! Reads take a plain `&Connection`. Every write goes through a
//! `BEGIN IMMEDIATE` transaction and the algorithms in `crate::reorder`,
//! which keep positions dense.

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use tracing::debug;

use crate::error::StorageError;
use crate::reorder::{self, CreateLevelInput, HierarchyLevel, HierarchyTransaction, MovedLevel};

fn level_from_row(row: &Row) -> Result<HierarchyLevel, rusqlite::Error> {
    Ok(HierarchyLevel {
        id: row.get("id")?,
        name: row.get("name")?,
        position: row.get("position")?,
        permissions: vec![],
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Get level by ID
pub fn get_level(conn: &Connection, id: &str) -> Result<Option<HierarchyLevel>, StorageError> {
    let level = conn
        .query_row(
            "SELECT * FROM hierarchy_levels WHERE id = ?",
            params![id],
            level_from_row,
        )
        .optional()
        .map_err(|e| StorageError::query("Level lookup failed", e))?;

    match level {
        Some(mut level) => {
            level.permissions = get_level_permissions(conn, id)?;
            Ok(Some(level))
        }
        None => Ok(None),
    }
}

/// List all levels ordered by position
pub fn list_levels(conn: &Connection) -> Result<Vec<HierarchyLevel>, StorageError> {
    let mut stmt = conn
        .prepare("SELECT * FROM hierarchy_levels ORDER BY position, id")
        .map_err(|e| StorageError::query("Prepare failed", e))?;

    let level_rows = stmt
        .query_map([], level_from_row)
        .map_err(|e| StorageError::query("Query failed", e))?;

    let mut levels = vec![];
    for row_result in level_rows {
        let mut level = row_result
            .map_err(|e| StorageError::query("Row parse failed", e))?;

        level.permissions = get_level_permissions(conn, &level.id)?;
        levels.push(level);
    }

    Ok(levels)
}

fn get_level_permissions(conn: &Connection, level_id: &str) -> Result<Vec<String>, StorageError> {
    let mut stmt = conn
        .prepare("SELECT permission FROM hierarchy_level_permissions WHERE level_id = ? ORDER BY permission")
        .map_err(|e| StorageError::query("Prepare failed", e))?;

    let permissions: Vec<String> = stmt
        .query_map(params![level_id], |row| row.get(0))
        .map_err(|e| StorageError::query("Query failed", e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| StorageError::query("Row parse failed", e))?;

    Ok(permissions)
}

/// Highest position in use (`None` when there are no levels)
pub fn max_position(conn: &Connection) -> Result<Option<i64>, StorageError> {
    let max: Option<i64> = conn
        .query_row("SELECT MAX(position) FROM hierarchy_levels", [], |row| row.get(0))
        .map_err(|e| StorageError::query("Query failed", e))?;
    Ok(max)
}

pub fn level_count(conn: &Connection) -> Result<i64, StorageError> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM hierarchy_levels", [], |row| row.get(0))
        .map_err(|e| StorageError::query("Query failed", e))?;
    Ok(count)
}

/// Open a write transaction for a reorder.
///
/// `IMMEDIATE` takes the write lock up front, so the position read and the
/// shifts it drives cannot interleave with another writer.
pub fn begin(conn: &mut Connection) -> Result<Transaction<'_>, StorageError> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(StorageError::from)
}

/// Move a level to `new_position` atomically
pub fn move_level(conn: &mut Connection, id: &str, new_position: i64) -> Result<MovedLevel, StorageError> {
    reorder::move_level(begin(conn)?, id, new_position)
}

/// Create a level at the end of the ordering
pub fn create_level(conn: &mut Connection, input: &CreateLevelInput) -> Result<HierarchyLevel, StorageError> {
    let id = input
        .id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    reorder::append_level(begin(conn)?, &id, input)
}

/// Delete a level and re-compact the positions after it
pub fn delete_level(conn: &mut Connection, id: &str) -> Result<HierarchyLevel, StorageError> {
    reorder::remove_level(begin(conn)?, id)
}

impl HierarchyTransaction for Transaction<'_> {
    fn level(&self, id: &str) -> Result<Option<HierarchyLevel>, StorageError> {
        get_level(self, id)
    }

    fn level_count(&self) -> Result<i64, StorageError> {
        level_count(self)
    }

    fn max_position(&self) -> Result<Option<i64>, StorageError> {
        max_position(self)
    }

    fn insert_level(&self, id: &str, input: &CreateLevelInput, position: i64) -> Result<(), StorageError> {
        self.execute(
            "INSERT INTO hierarchy_levels (id, name, position) VALUES (?, ?, ?)",
            params![id, input.name, position],
        ).map_err(|e| StorageError::query("Level insert failed", e))?;

        for permission in &input.permissions {
            self.execute(
                "INSERT OR IGNORE INTO hierarchy_level_permissions (level_id, permission) VALUES (?, ?)",
                params![id, permission],
            ).map_err(|e| StorageError::query("Permission insert failed", e))?;
        }

        Ok(())
    }

    fn delete_level(&self, id: &str) -> Result<bool, StorageError> {
        self.execute("DELETE FROM hierarchy_level_permissions WHERE level_id = ?", params![id])
            .map_err(|e| StorageError::query("Delete permissions failed", e))?;

        let changes = self
            .execute("DELETE FROM hierarchy_levels WHERE id = ?", params![id])
            .map_err(|e| StorageError::query("Delete level failed", e))?;

        Ok(changes > 0)
    }

    fn shift_positions(&self, start: i64, end: i64, delta: i64) -> Result<usize, StorageError> {
        let shifted = self.execute(
            r#"
            UPDATE hierarchy_levels
            SET position = position + ?1, updated_at = datetime('now')
            WHERE position BETWEEN ?2 AND ?3
            "#,
            params![delta, start, end],
        )?;

        debug!(start, end, delta, shifted, "Shifted hierarchy positions");
        Ok(shifted)
    }

    fn set_position(&self, id: &str, position: i64) -> Result<(), StorageError> {
        let changes = self.execute(
            "UPDATE hierarchy_levels SET position = ?, updated_at = datetime('now') WHERE id = ?",
            params![position, id],
        )?;

        if changes == 0 {
            return Err(StorageError::NotFound(format!("hierarchy level {}", id)));
        }
        Ok(())
    }

    fn commit(self) -> Result<(), StorageError> {
        Transaction::commit(self)
            .map_err(|e| StorageError::query("Commit failed", e))
    }
}

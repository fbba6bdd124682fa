//! Hierarchy position reordering
//!
//! Hierarchy levels carry a 1-based `position`. Across all levels the
//! positions are always exactly `1..=N`: no gaps, no duplicates. Every
//! mutation (move, append, remove) runs inside one `HierarchyTransaction`
//! and only touches the block of positions between the old and new slot.
//!
//! ```text
//! move D 4 -> 2        [A1 B2 C3 D4]
//!   shift [2, 3] +1    [A1 B3 C4 D4]
//!   set D = 2          [A1 D2 B3 C4]
//! ```
//!
//! A transaction that is dropped without `commit` rolls back, so an error
//! returned through `?` at any step leaves the stored positions untouched.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StorageError;

/// Position given to the first level
pub const FIRST_POSITION: i64 = 1;

/// A rank in the organization's reporting structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyLevel {
    pub id: String,
    pub name: String,
    pub position: i64,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Input for creating a hierarchy level (always appended last)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLevelInput {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Storage operations a reorder needs, all bound to one open transaction.
///
/// Implementations must roll back when dropped without `commit`.
pub trait HierarchyTransaction {
    /// Fetch a level by id
    fn level(&self, id: &str) -> Result<Option<HierarchyLevel>, StorageError>;

    /// Number of levels
    fn level_count(&self) -> Result<i64, StorageError>;

    /// Highest position in use, `None` when there are no levels
    fn max_position(&self) -> Result<Option<i64>, StorageError>;

    /// Insert a new level at `position`
    fn insert_level(&self, id: &str, input: &CreateLevelInput, position: i64) -> Result<(), StorageError>;

    /// Delete a level, returning whether a row was removed
    fn delete_level(&self, id: &str) -> Result<bool, StorageError>;

    /// Add `delta` to the position of every level in `[start, end]` (inclusive)
    fn shift_positions(&self, start: i64, end: i64, delta: i64) -> Result<usize, StorageError>;

    /// Overwrite a single level's position
    fn set_position(&self, id: &str, position: i64) -> Result<(), StorageError>;

    fn commit(self) -> Result<(), StorageError>;
}

/// Result of a move: the level as stored afterwards and where it started
#[derive(Debug, Clone, PartialEq)]
pub struct MovedLevel {
    pub level: HierarchyLevel,
    pub from: i64,
}

impl MovedLevel {
    /// False for a same-position move, which writes nothing
    pub fn changed(&self) -> bool {
        self.from != self.level.position
    }
}

/// Edits needed to move a level from one position to another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePlan {
    /// Target equals current position; nothing to write
    NoOp,
    /// Shift `[start, end]` by `delta`, then place the moving level
    Shift { start: i64, end: i64, delta: i64 },
}

/// Compute the minimal block shift for moving `current` to `target`.
///
/// Moving up (smaller position) pushes `[target, current)` down by one;
/// moving down pulls `(current, target]` up by one.
pub fn plan_move(current: i64, target: i64) -> MovePlan {
    match target.cmp(&current) {
        Ordering::Equal => MovePlan::NoOp,
        Ordering::Less => MovePlan::Shift {
            start: target,
            end: current - 1,
            delta: 1,
        },
        Ordering::Greater => MovePlan::Shift {
            start: current + 1,
            end: target,
            delta: -1,
        },
    }
}

/// Check `position` against the valid range for `count` levels
pub fn validate_position(position: i64, count: i64) -> Result<(), StorageError> {
    let last = FIRST_POSITION + count - 1;
    if position < FIRST_POSITION || position > last {
        return Err(StorageError::InvalidInput(format!(
            "position {} is outside {}..={}",
            position, FIRST_POSITION, last
        )));
    }
    Ok(())
}

/// Move a level to `new_position`, shifting the displaced block.
///
/// Returns the level as stored after the move. A move to the current
/// position writes nothing and returns the level unchanged.
pub fn move_level<T: HierarchyTransaction>(
    tx: T,
    level_id: &str,
    new_position: i64,
) -> Result<MovedLevel, StorageError> {
    let level = tx
        .level(level_id)?
        .ok_or_else(|| StorageError::NotFound(format!("hierarchy level {}", level_id)))?;

    let count = tx.level_count()?;
    validate_position(new_position, count)?;

    let (start, end, delta) = match plan_move(level.position, new_position) {
        MovePlan::NoOp => {
            debug!(level_id, position = new_position, "Level already at target position");
            return Ok(MovedLevel {
                from: level.position,
                level,
            });
        }
        MovePlan::Shift { start, end, delta } => (start, end, delta),
    };

    let shifted = tx.shift_positions(start, end, delta)?;
    tx.set_position(level_id, new_position)?;

    let updated = tx
        .level(level_id)?
        .ok_or_else(|| StorageError::Internal(format!("hierarchy level {} vanished during move", level_id)))?;

    tx.commit()?;

    info!(
        level_id,
        from = level.position,
        to = new_position,
        shifted,
        "Moved hierarchy level"
    );

    Ok(MovedLevel {
        level: updated,
        from: level.position,
    })
}

/// Append a new level after the current last position
pub fn append_level<T: HierarchyTransaction>(
    tx: T,
    id: &str,
    input: &CreateLevelInput,
) -> Result<HierarchyLevel, StorageError> {
    let position = tx.max_position()?.map_or(FIRST_POSITION, |max| max + 1);
    tx.insert_level(id, input, position)?;

    let created = tx
        .level(id)?
        .ok_or_else(|| StorageError::Internal("Level not found after insert".to_string()))?;

    tx.commit()?;

    debug!(level_id = id, position, "Appended hierarchy level");
    Ok(created)
}

/// Delete a level and close the gap it leaves
pub fn remove_level<T: HierarchyTransaction>(tx: T, level_id: &str) -> Result<HierarchyLevel, StorageError> {
    let level = tx
        .level(level_id)?
        .ok_or_else(|| StorageError::NotFound(format!("hierarchy level {}", level_id)))?;

    let count = tx.level_count()?;
    if !tx.delete_level(level_id)? {
        return Err(StorageError::NotFound(format!("hierarchy level {}", level_id)));
    }

    let last = FIRST_POSITION + count - 1;
    let shifted = if level.position < last {
        tx.shift_positions(level.position + 1, last, -1)?
    } else {
        0
    };

    tx.commit()?;

    info!(level_id, position = level.position, shifted, "Removed hierarchy level");
    Ok(level)
}

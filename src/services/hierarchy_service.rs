//! Hierarchy service - business logic for hierarchy level operations
//!
//! Wraps the hierarchy repository with validation and event emission.
//! Ordering itself lives in `crate::reorder`.

use std::sync::Arc;

use crate::db::{hierarchy, HealthDb};
use crate::error::StorageError;
use crate::reorder::{CreateLevelInput, HierarchyLevel};

use super::events::{EventBus, StorageEvent};

pub struct HierarchyService {
    db: Arc<HealthDb>,
    events: Arc<EventBus>,
}

impl HierarchyService {
    pub fn new(db: Arc<HealthDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    pub fn get(&self, id: &str) -> Result<Option<HierarchyLevel>, StorageError> {
        self.db.with_conn(|conn| hierarchy::get_level(conn, id))
    }

    /// All levels, ordered by position
    pub fn list(&self) -> Result<Vec<HierarchyLevel>, StorageError> {
        self.db.with_conn(hierarchy::list_levels)
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Create a level at the end of the ordering
    pub fn create(&self, input: CreateLevelInput) -> Result<HierarchyLevel, StorageError> {
        self.validate_level(&input)?;

        let level = self.db.with_conn_mut(|conn| hierarchy::create_level(conn, &input))?;

        self.events.emit(StorageEvent::LevelCreated {
            id: level.id.clone(),
            name: level.name.clone(),
            position: level.position,
        });

        Ok(level)
    }

    /// Move a level to `new_position`, shifting the levels in between.
    ///
    /// `LevelMoved` is only emitted when the position actually changed.
    pub fn move_level(&self, id: &str, new_position: i64) -> Result<HierarchyLevel, StorageError> {
        if id.is_empty() {
            return Err(StorageError::InvalidInput("id is required".into()));
        }

        let moved = self
            .db
            .with_conn_mut(|conn| hierarchy::move_level(conn, id, new_position))?;

        if moved.changed() {
            self.events.emit(StorageEvent::LevelMoved {
                id: moved.level.id.clone(),
                position: moved.level.position,
            });
        }

        Ok(moved.level)
    }

    /// Delete a level; levels below it move up one position
    pub fn delete(&self, id: &str) -> Result<HierarchyLevel, StorageError> {
        let removed = self.db.with_conn_mut(|conn| hierarchy::delete_level(conn, id))?;

        self.events.emit(StorageEvent::LevelDeleted {
            id: removed.id.clone(),
            position: removed.position,
        });

        Ok(removed)
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn validate_level(&self, input: &CreateLevelInput) -> Result<(), StorageError> {
        if let Some(ref id) = input.id {
            if id.is_empty() {
                return Err(StorageError::InvalidInput("id must not be empty when given".into()));
            }
            if id.len() > 255 {
                return Err(StorageError::InvalidInput("id must be <= 255 characters".into()));
            }
        }

        if input.name.trim().is_empty() {
            return Err(StorageError::InvalidInput("name is required".into()));
        }

        if input.name.len() > 200 {
            return Err(StorageError::InvalidInput("name must be <= 200 characters".into()));
        }

        if let Some(i) = input.permissions.iter().position(|p| p.trim().is_empty()) {
            return Err(StorageError::InvalidInput(format!("permissions[{}] is empty", i)));
        }

        Ok(())
    }
}

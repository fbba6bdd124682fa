//! Database schema definitions

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::StorageError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        migrate_schema(conn, current_version)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, StorageError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    ).map_err(|e| StorageError::query("Failed to create schema_version table", e))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()
        .map_err(|e| StorageError::query("Failed to read schema_version", e))?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), StorageError> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| StorageError::query("Failed to clear schema_version", e))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .map_err(|e| StorageError::query("Failed to set schema_version", e))?;
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(HIERARCHY_SCHEMA)
        .map_err(|e| StorageError::query("Failed to create hierarchy tables", e))?;

    conn.execute_batch(SURVEY_SCHEMA)
        .map_err(|e| StorageError::query("Failed to create survey tables", e))?;

    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| StorageError::query("Failed to create indexes", e))?;

    Ok(())
}

fn migrate_schema(conn: &Connection, from_version: i32) -> Result<(), StorageError> {
    info!(from_version, "No migration steps registered");
    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

/// Hierarchy levels schema
const HIERARCHY_SCHEMA: &str = r#"
-- Levels of the reporting structure.
-- position is a dense 1-based rank; it is not UNIQUE because block
-- shifts pass through transient duplicates inside a transaction.
CREATE TABLE IF NOT EXISTS hierarchy_levels (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    position INTEGER NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS hierarchy_level_permissions (
    level_id TEXT NOT NULL,
    permission TEXT NOT NULL,
    PRIMARY KEY (level_id, permission),
    FOREIGN KEY (level_id) REFERENCES hierarchy_levels(id) ON DELETE CASCADE
);
"#;

/// Users, teams, sessions and responses
const SURVEY_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    supervisor_id TEXT,
    hierarchy_level_id TEXT,
    FOREIGN KEY (supervisor_id) REFERENCES users(id) ON DELETE SET NULL,
    FOREIGN KEY (hierarchy_level_id) REFERENCES hierarchy_levels(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS teams (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS team_supervisors (
    team_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    PRIMARY KEY (team_id, user_id),
    FOREIGN KEY (team_id) REFERENCES teams(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS dimensions (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    description TEXT
);

-- One health-check run for a team in an assessment period
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY NOT NULL,
    team_id TEXT NOT NULL,
    assessment_period TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    completed_at TEXT,
    FOREIGN KEY (team_id) REFERENCES teams(id) ON DELETE CASCADE
);

-- No FK on dimension_id: responses outlive retired dimensions
CREATE TABLE IF NOT EXISTS responses (
    session_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    dimension_id TEXT NOT NULL,
    score INTEGER NOT NULL,
    comment TEXT,
    PRIMARY KEY (session_id, user_id, dimension_id),
    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
);
"#;

/// Index definitions for fast queries
const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_hierarchy_position ON hierarchy_levels(position);

CREATE INDEX IF NOT EXISTS idx_users_supervisor ON users(supervisor_id);
CREATE INDEX IF NOT EXISTS idx_team_supervisors_user ON team_supervisors(user_id);

CREATE INDEX IF NOT EXISTS idx_sessions_team_status ON sessions(team_id, status);
CREATE INDEX IF NOT EXISTS idx_sessions_period ON sessions(assessment_period);

CREATE INDEX IF NOT EXISTS idx_responses_session ON responses(session_id);
CREATE INDEX IF NOT EXISTS idx_responses_dimension ON responses(dimension_id);
"#;

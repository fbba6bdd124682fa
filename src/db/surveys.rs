//! Users, teams, dimensions, sessions and responses
//!
//! These tables are the row source for trend pivots. Inserts come in bulk
//! through `import_fixture`, which loads a whole `SurveyFixture` in a single
//! transaction.

use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StorageError;

/// Lifecycle of a health-check session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Draft,
    #[default]
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Draft => "draft",
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInput {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub supervisor_id: Option<String>,
    #[serde(default)]
    pub hierarchy_level_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamInput {
    pub id: String,
    pub name: String,
    /// Users who directly supervise this team
    #[serde(default)]
    pub supervisors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionInput {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInput {
    pub id: String,
    pub team_id: String,
    #[serde(default)]
    pub assessment_period: Option<String>,
    #[serde(default)]
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseInput {
    pub session_id: String,
    pub user_id: String,
    pub dimension_id: String,
    pub score: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

/// A batch of survey data, as loaded by the `import` command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyFixture {
    #[serde(default)]
    pub users: Vec<UserInput>,
    #[serde(default)]
    pub teams: Vec<TeamInput>,
    #[serde(default)]
    pub dimensions: Vec<DimensionInput>,
    #[serde(default)]
    pub sessions: Vec<SessionInput>,
    #[serde(default)]
    pub responses: Vec<ResponseInput>,
}

/// Counts of rows written by an import
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub users: u64,
    pub teams: u64,
    pub dimensions: u64,
    pub sessions: u64,
    pub responses: u64,
}

/// Insert every record in `fixture`, all or nothing.
///
/// Users are inserted before supervisor links are set, so a fixture may
/// list a user before their supervisor.
pub fn import_fixture(conn: &mut Connection, fixture: &SurveyFixture) -> Result<ImportSummary, StorageError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut summary = ImportSummary::default();

    for user in &fixture.users {
        tx.execute(
            "INSERT INTO users (id, name) VALUES (?, ?)",
            params![user.id, user.name],
        ).map_err(|e| StorageError::query(format!("User insert failed ({})", user.id), e))?;
        summary.users += 1;
    }
    for user in &fixture.users {
        link_user(&tx, user)?;
    }

    for team in &fixture.teams {
        insert_team(&tx, team)?;
        summary.teams += 1;
    }

    for dimension in &fixture.dimensions {
        tx.execute(
            "INSERT INTO dimensions (id, name, description) VALUES (?, ?, ?)",
            params![dimension.id, dimension.name, dimension.description],
        ).map_err(|e| StorageError::query(format!("Dimension insert failed ({})", dimension.id), e))?;
        summary.dimensions += 1;
    }

    for session in &fixture.sessions {
        insert_session(&tx, session)?;
        summary.sessions += 1;
    }

    for response in &fixture.responses {
        record_response(&tx, response)?;
        summary.responses += 1;
    }

    tx.commit()
        .map_err(|e| StorageError::query("Commit failed", e))?;

    info!(
        users = summary.users,
        teams = summary.teams,
        sessions = summary.sessions,
        responses = summary.responses,
        "Imported survey data"
    );
    Ok(summary)
}

fn link_user(tx: &Transaction, user: &UserInput) -> Result<(), StorageError> {
    if user.supervisor_id.is_none() && user.hierarchy_level_id.is_none() {
        return Ok(());
    }
    tx.execute(
        "UPDATE users SET supervisor_id = ?, hierarchy_level_id = ? WHERE id = ?",
        params![user.supervisor_id, user.hierarchy_level_id, user.id],
    ).map_err(|e| StorageError::query(format!("User link failed ({})", user.id), e))?;
    Ok(())
}

fn insert_team(tx: &Transaction, team: &TeamInput) -> Result<(), StorageError> {
    tx.execute(
        "INSERT INTO teams (id, name) VALUES (?, ?)",
        params![team.id, team.name],
    ).map_err(|e| StorageError::query(format!("Team insert failed ({})", team.id), e))?;

    for user_id in &team.supervisors {
        tx.execute(
            "INSERT OR IGNORE INTO team_supervisors (team_id, user_id) VALUES (?, ?)",
            params![team.id, user_id],
        ).map_err(|e| StorageError::query(format!("Supervisor insert failed ({})", team.id), e))?;
    }
    Ok(())
}

fn insert_session(tx: &Transaction, session: &SessionInput) -> Result<(), StorageError> {
    let completed = session.status == SessionStatus::Completed;
    tx.execute(
        r#"
        INSERT INTO sessions (id, team_id, assessment_period, status, completed_at)
        VALUES (?1, ?2, ?3, ?4, CASE WHEN ?5 THEN datetime('now') END)
        "#,
        params![
            session.id,
            session.team_id,
            session.assessment_period,
            session.status.as_str(),
            completed,
        ],
    ).map_err(|e| StorageError::query(format!("Session insert failed ({})", session.id), e))?;
    Ok(())
}

/// Store one user's score for a dimension, replacing an earlier answer
pub fn record_response(conn: &Connection, response: &ResponseInput) -> Result<(), StorageError> {
    conn.execute(
        r#"
        INSERT OR REPLACE INTO responses (session_id, user_id, dimension_id, score, comment)
        VALUES (?, ?, ?, ?, ?)
        "#,
        params![
            response.session_id,
            response.user_id,
            response.dimension_id,
            response.score,
            response.comment,
        ],
    ).map_err(|e| StorageError::query(format!("Response insert failed ({})", response.session_id), e))?;
    Ok(())
}

/// Mark a session completed so it counts towards trends
pub fn complete_session(conn: &Connection, session_id: &str) -> Result<(), StorageError> {
    let changes = conn.execute(
        "UPDATE sessions SET status = 'completed', completed_at = datetime('now') WHERE id = ?",
        params![session_id],
    )?;
    if changes == 0 {
        return Err(StorageError::NotFound(format!("session {}", session_id)));
    }
    Ok(())
}

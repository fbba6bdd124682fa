//! Survey service - loading sessions and responses

use std::collections::HashSet;
use std::sync::Arc;

use crate::db::surveys::{self, ImportSummary, SurveyFixture};
use crate::db::HealthDb;
use crate::error::StorageError;

use super::events::{EventBus, StorageEvent};

pub struct SurveyService {
    db: Arc<HealthDb>,
    events: Arc<EventBus>,
    score_max: i64,
}

impl SurveyService {
    pub fn new(db: Arc<HealthDb>, events: Arc<EventBus>, score_max: u8) -> Self {
        Self {
            db,
            events,
            score_max: i64::from(score_max),
        }
    }

    /// Validate and import a fixture in one transaction
    pub fn import(&self, fixture: &SurveyFixture) -> Result<ImportSummary, StorageError> {
        self.validate_fixture(fixture)?;

        let summary = self.db.with_conn_mut(|conn| surveys::import_fixture(conn, fixture))?;

        self.events.emit(StorageEvent::SurveyDataImported {
            sessions: summary.sessions,
            responses: summary.responses,
        });

        Ok(summary)
    }

    /// Mark a session completed so its scores appear in trends
    pub fn complete_session(&self, session_id: &str) -> Result<(), StorageError> {
        self.db.with_conn(|conn| surveys::complete_session(conn, session_id))?;
        self.events.emit(StorageEvent::SessionCompleted {
            id: session_id.to_string(),
        });
        Ok(())
    }

    fn validate_fixture(&self, fixture: &SurveyFixture) -> Result<(), StorageError> {
        let mut session_ids = HashSet::new();
        for (i, session) in fixture.sessions.iter().enumerate() {
            if session.id.is_empty() || session.team_id.is_empty() {
                return Err(StorageError::InvalidInput(format!(
                    "sessions[{}]: id and team_id are required", i
                )));
            }
            if !session_ids.insert(session.id.as_str()) {
                return Err(StorageError::InvalidInput(format!(
                    "sessions[{}]: duplicate id '{}'", i, session.id
                )));
            }
        }

        for (i, response) in fixture.responses.iter().enumerate() {
            if response.score < 0 || response.score > self.score_max {
                return Err(StorageError::InvalidInput(format!(
                    "responses[{}]: score {} is outside 0..={}",
                    i, response.score, self.score_max
                )));
            }
            if response.dimension_id.is_empty() || response.user_id.is_empty() {
                return Err(StorageError::InvalidInput(format!(
                    "responses[{}]: dimension_id and user_id are required", i
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::surveys::{ResponseInput, SessionInput, SessionStatus, TeamInput};

    fn fixture(score: i64) -> SurveyFixture {
        SurveyFixture {
            teams: vec![TeamInput {
                id: "t1".into(),
                name: "Core".into(),
                supervisors: vec![],
            }],
            sessions: vec![SessionInput {
                id: "s1".into(),
                team_id: "t1".into(),
                assessment_period: Some("2024-H1".into()),
                status: SessionStatus::Active,
            }],
            responses: vec![ResponseInput {
                session_id: "s1".into(),
                user_id: "u1".into(),
                dimension_id: "mission".into(),
                score,
                comment: None,
            }],
            ..Default::default()
        }
    }

    fn service() -> SurveyService {
        let db = Arc::new(HealthDb::open_in_memory().unwrap());
        SurveyService::new(db, Arc::new(EventBus::new()), 3)
    }

    #[test]
    fn test_score_out_of_range_rejected() {
        let service = service();
        let err = service.import(&fixture(4)).unwrap_err();
        assert!(matches!(err, StorageError::InvalidInput(_)));
        assert_eq!(service.db.stats().unwrap().sessions, 0);
    }

    #[test]
    fn test_import_then_complete() {
        let service = service();
        let summary = service.import(&fixture(3)).unwrap();
        assert_eq!(summary.responses, 1);

        service.complete_session("s1").unwrap();
        assert_eq!(service.db.stats().unwrap().completed_sessions, 1);
    }
}

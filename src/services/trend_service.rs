//! Trend service - team and manager trend pivots
//!
//! Both queries of a build run inside one read transaction, so the period
//! list and the score rows come from the same snapshot.

use std::sync::Arc;

use tracing::debug;

use crate::cancel::CancelToken;
use crate::db::HealthDb;
use crate::error::StorageError;
use crate::trend::{build_trend, TrendResult, TrendScope};

use super::events::{EventBus, StorageEvent};

pub struct TrendService {
    db: Arc<HealthDb>,
    events: Arc<EventBus>,
}

impl TrendService {
    pub fn new(db: Arc<HealthDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    /// Trend for one team's completed sessions
    pub fn build_for_team(&self, team_id: &str, cancel: &CancelToken) -> Result<TrendResult, StorageError> {
        self.build(TrendScope::Team(team_id.to_string()), cancel)
    }

    /// Trend across every team under a manager's supervisory chain
    pub fn build_for_manager(&self, manager_id: &str, cancel: &CancelToken) -> Result<TrendResult, StorageError> {
        self.build(TrendScope::Manager(manager_id.to_string()), cancel)
    }

    pub fn build(&self, scope: TrendScope, cancel: &CancelToken) -> Result<TrendResult, StorageError> {
        let scope_id = match &scope {
            TrendScope::Team(id) | TrendScope::Manager(id) => id,
        };
        if scope_id.trim().is_empty() {
            return Err(StorageError::InvalidInput("scope id is required".into()));
        }

        let result = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let result = build_trend(&*tx, &scope, cancel)?;
            tx.commit()?;
            Ok(result)
        })?;

        debug!(scope = %scope, periods = result.periods.len(), "Trend request served");
        self.events.emit(StorageEvent::TrendBuilt {
            scope,
            periods: result.periods.len(),
            dimensions: result.dimensions.len(),
            skipped: result.skipped.len(),
        });

        Ok(result)
    }
}

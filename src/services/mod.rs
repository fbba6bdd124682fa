//! Service layer for healthcheck-storage
//!
//! Services sit between callers (CLI, HTTP handlers) and the repositories,
//! adding validation, transaction boundaries and event emission.
//!
//! ```text
//! Callers (thin)
//!     ↓
//! Service Layer (validation, events)
//!     ↓
//! Core algorithms (reorder.rs, trend.rs)
//!     ↓
//! Repository Layer (db/*.rs) → SQLite
//! ```

pub mod events;
pub mod hierarchy_service;
pub mod survey_service;
pub mod trend_service;

// Re-exports
pub use events::{spawn_logging_listener, EventBus, EventListener, StorageEvent};
pub use hierarchy_service::HierarchyService;
pub use survey_service::SurveyService;
pub use trend_service::TrendService;

use crate::config::Config;
use crate::db::HealthDb;
use std::sync::Arc;

/// Service container for dependency injection
///
/// Holds all services with a shared database handle.
pub struct Services {
    pub db: Arc<HealthDb>,
    pub hierarchy: Arc<HierarchyService>,
    pub trends: Arc<TrendService>,
    pub surveys: Arc<SurveyService>,
    pub events: Arc<EventBus>,
}

impl Services {
    /// Create all services with shared database
    pub fn new(db: Arc<HealthDb>, config: &Config) -> Self {
        let events = Arc::new(EventBus::new());

        Self {
            hierarchy: Arc::new(HierarchyService::new(db.clone(), events.clone())),
            trends: Arc::new(TrendService::new(db.clone(), events.clone())),
            surveys: Arc::new(SurveyService::new(db.clone(), events.clone(), config.score_max)),
            db,
            events,
        }
    }
}

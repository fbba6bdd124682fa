//! Integration tests for team and manager trend pivots
//!
//! Survey data is loaded through the import path, then trends are read
//! back through `Services` exactly as the CLI does.

use healthcheck_storage::db::SurveyFixture;
use healthcheck_storage::{CancelToken, Config, HealthDb, Services, TrendResult};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

fn fixture() -> SurveyFixture {
    serde_json::from_value(serde_json::json!({
        "users": [
            { "id": "vp", "name": "VP" },
            { "id": "lead-a", "name": "Lead A", "supervisor_id": "vp" },
            { "id": "lead-b", "name": "Lead B", "supervisor_id": "lead-a" },
            { "id": "outsider", "name": "Outsider" },
            { "id": "dev-1", "name": "Dev 1", "supervisor_id": "lead-a" },
            { "id": "dev-2", "name": "Dev 2", "supervisor_id": "lead-b" }
        ],
        "teams": [
            { "id": "alpha", "name": "Alpha", "supervisors": ["lead-a"] },
            { "id": "beta", "name": "Beta", "supervisors": ["lead-b"] },
            { "id": "gamma", "name": "Gamma", "supervisors": ["outsider"] }
        ],
        "dimensions": [
            { "id": "dimX", "name": "Mission" },
            { "id": "dimY", "name": "Speed" }
        ],
        "sessions": [
            { "id": "a1", "team_id": "alpha", "assessment_period": "2024-H1", "status": "completed" },
            { "id": "a2", "team_id": "alpha", "assessment_period": "2024-H2", "status": "completed" },
            { "id": "b2", "team_id": "beta",  "assessment_period": "2024-H2", "status": "completed" },
            { "id": "b3", "team_id": "beta",  "assessment_period": "2025-H1", "status": "active" },
            { "id": "g1", "team_id": "gamma", "assessment_period": "2023-H1", "status": "completed" },
            { "id": "a0", "team_id": "alpha", "status": "completed" }
        ],
        "responses": [
            { "session_id": "a1", "user_id": "dev-1", "dimension_id": "dimX", "score": 2 },
            { "session_id": "a1", "user_id": "lead-a", "dimension_id": "dimX", "score": 3 },
            { "session_id": "a2", "user_id": "dev-1", "dimension_id": "dimY", "score": 1 },
            { "session_id": "b2", "user_id": "dev-2", "dimension_id": "dimX", "score": 0 },
            { "session_id": "b2", "user_id": "dev-2", "dimension_id": "dimY", "score": 3 },
            { "session_id": "b3", "user_id": "dev-2", "dimension_id": "dimX", "score": 3 },
            { "session_id": "g1", "user_id": "outsider", "dimension_id": "dimX", "score": 1 },
            { "session_id": "a0", "user_id": "dev-1", "dimension_id": "dimX", "score": 0 }
        ]
    }))
    .unwrap()
}

fn services() -> (Services, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = Config {
        storage_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    let db = Arc::new(HealthDb::open(&config.db_path(), config.busy_timeout()).unwrap());
    let services = Services::new(db, &config);
    services.surveys.import(&fixture()).unwrap();
    (services, dir)
}

/// Dimensions keyed by id, so assertions do not depend on list order
fn by_dimension(result: &TrendResult) -> HashMap<String, Vec<Option<f64>>> {
    result
        .dimensions
        .iter()
        .map(|d| (d.dimension_id.clone(), d.scores.clone()))
        .collect()
}

#[test]
fn test_team_trend_fills_missing_periods() {
    let (services, _dir) = services();
    let result = services.trends.build_for_team("alpha", &CancelToken::new()).unwrap();

    assert_eq!(result.periods, vec!["2024-H1", "2024-H2"]);
    let dims = by_dimension(&result);
    assert_eq!(dims["dimX"], vec![Some(2.5), None]);
    assert_eq!(dims["dimY"], vec![None, Some(1.0)]);

    let zero = result.zero_filled();
    let x = zero.dimensions.iter().find(|d| d.dimension_id == "dimX").unwrap();
    assert_eq!(x.scores, vec![2.5, 0.0]);
}

#[test]
fn test_manager_trend_covers_whole_chain() {
    let (services, _dir) = services();
    let result = services.trends.build_for_manager("vp", &CancelToken::new()).unwrap();

    // alpha via lead-a, beta via lead-b -> lead-a -> vp; gamma is outside
    assert_eq!(result.periods, vec!["2024-H1", "2024-H2"]);
    let dims = by_dimension(&result);
    assert_eq!(dims["dimX"], vec![Some(2.5), Some(0.0)]);
    assert_eq!(dims["dimY"], vec![None, Some(2.0)]);
}

#[test]
fn test_every_row_matches_period_count() {
    let (services, _dir) = services();
    for manager in ["vp", "lead-a", "lead-b", "outsider"] {
        let result = services.trends.build_for_manager(manager, &CancelToken::new()).unwrap();
        for dim in &result.dimensions {
            assert_eq!(dim.scores.len(), result.periods.len(), "manager {}", manager);
        }
    }
}

#[test]
fn test_trend_is_deterministic() {
    let (services, _dir) = services();
    let first = services.trends.build_for_manager("vp", &CancelToken::new()).unwrap();
    let second = services.trends.build_for_manager("vp", &CancelToken::new()).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_no_completed_sessions_is_empty_not_error() {
    let (services, _dir) = services();
    let result = services.trends.build_for_team("unknown-team", &CancelToken::new()).unwrap();

    assert!(result.periods.is_empty());
    assert!(result.dimensions.is_empty());
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        serde_json::json!({ "periods": [], "dimensions": [] })
    );
}

#[test]
fn test_completing_a_session_adds_its_period() {
    let (services, _dir) = services();
    services.surveys.complete_session("b3").unwrap();

    let result = services.trends.build_for_team("beta", &CancelToken::new()).unwrap();
    assert_eq!(result.periods, vec!["2024-H2", "2025-H1"]);
    assert_eq!(by_dimension(&result)["dimX"], vec![Some(0.0), Some(3.0)]);
}

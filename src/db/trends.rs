//! Scoped trend queries
//!
//! Both queries share a `scoped_teams` CTE, so a team trend and a manager
//! trend differ only in which teams are in scope. A manager's scope is every
//! team supervised by the manager or by anyone below them in the
//! `users.supervisor_id` chain.
//!
//! Only completed sessions with a non-empty `assessment_period` count.
//! Periods are ordered by plain string comparison, so labels must sort
//! chronologically (`2024-H1` < `2024-H2` < `2025-H1`).

use rusqlite::{params, Connection, Row};

use crate::cancel::CancelToken;
use crate::error::StorageError;
use crate::trend::{SkippedRow, TrendQuery, TrendRow, TrendScope, TrendSource};

const TEAM_SCOPE: &str = r#"
WITH scoped_teams(team_id) AS (SELECT ?1)
"#;

const MANAGER_SCOPE: &str = r#"
WITH RECURSIVE chain(user_id) AS (
    SELECT ?1
    UNION
    SELECT u.id FROM users u JOIN chain c ON u.supervisor_id = c.user_id
),
scoped_teams(team_id) AS (
    SELECT DISTINCT ts.team_id
    FROM team_supervisors ts
    JOIN chain c ON c.user_id = ts.user_id
)
"#;

const PERIODS_QUERY: &str = r#"
SELECT DISTINCT s.assessment_period
FROM sessions s
JOIN scoped_teams st ON st.team_id = s.team_id
WHERE s.status = 'completed'
  AND s.assessment_period IS NOT NULL
  AND s.assessment_period != ''
ORDER BY s.assessment_period
"#;

const TRENDS_QUERY: &str = r#"
SELECT r.dimension_id AS dimension_id,
       s.assessment_period AS period,
       AVG(r.score) AS average
FROM responses r
JOIN sessions s ON s.id = r.session_id
JOIN scoped_teams st ON st.team_id = s.team_id
WHERE s.status = 'completed'
  AND s.assessment_period IS NOT NULL
  AND s.assessment_period != ''
GROUP BY r.dimension_id, s.assessment_period
ORDER BY r.dimension_id, s.assessment_period
"#;

/// Prefix `body` with the CTE for `scope`; returns the SQL and its bound id
fn scoped_sql<'a>(scope: &'a TrendScope, body: &str) -> (String, &'a str) {
    match scope {
        TrendScope::Team(id) => (format!("{}{}", TEAM_SCOPE, body), id.as_str()),
        TrendScope::Manager(id) => (format!("{}{}", MANAGER_SCOPE, body), id.as_str()),
    }
}

fn trend_row_from(row: &Row) -> Result<TrendRow, rusqlite::Error> {
    Ok(TrendRow {
        dimension_id: row.get("dimension_id")?,
        period: row.get("period")?,
        average: row.get("average")?,
    })
}

impl TrendSource for Connection {
    fn periods(
        &self,
        scope: &TrendScope,
        cancel: &CancelToken,
    ) -> Result<Vec<Result<String, SkippedRow>>, StorageError> {
        let (sql, scope_id) = scoped_sql(scope, PERIODS_QUERY);
        let mut stmt = self
            .prepare(&sql)
            .map_err(|e| StorageError::query("Prepare failed", e))?;

        let mut rows = stmt.query(params![scope_id])?;
        let mut periods = Vec::new();
        while let Some(row) = rows.next()? {
            cancel.check("reading periods")?;
            let ordinal = periods.len();
            periods.push(row.get::<_, String>(0).map_err(|e| SkippedRow {
                query: TrendQuery::Periods,
                row: ordinal,
                reason: e.to_string(),
            }));
        }

        Ok(periods)
    }

    fn trend_rows(
        &self,
        scope: &TrendScope,
        cancel: &CancelToken,
    ) -> Result<Vec<Result<TrendRow, SkippedRow>>, StorageError> {
        let (sql, scope_id) = scoped_sql(scope, TRENDS_QUERY);
        let mut stmt = self
            .prepare(&sql)
            .map_err(|e| StorageError::query("Prepare failed", e))?;

        // Stepping errors abort; decode errors only skip the row
        let mut rows = stmt.query(params![scope_id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            cancel.check("reading trend rows")?;
            let ordinal = out.len();
            out.push(trend_row_from(row).map_err(|e| SkippedRow {
                query: TrendQuery::Trends,
                row: ordinal,
                reason: e.to_string(),
            }));
        }

        Ok(out)
    }
}

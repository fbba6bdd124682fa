//! Trend pivot construction
//!
//! Turns sparse `(dimension, period, average)` rows into one score array per
//! dimension, aligned index-for-index with the ordered period list:
//!
//! ```text
//! periods:  ["2024-H1", "2024-H2", "2025-H1"]
//! rows:     (mission, 2024-H1, 2.5) (mission, 2025-H1, 1.0) (speed, 2024-H2, 3.0)
//!
//! mission:  [Some(2.5), None,      Some(1.0)]
//! speed:    [None,      Some(3.0), None     ]
//! ```
//!
//! Missing cells are `None`; `TrendResult::zero_filled` gives the legacy
//! view where they read as `0`. Dimensions come out sorted by id.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::StorageError;

/// Which sessions a trend aggregates over
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum TrendScope {
    /// A single team's completed sessions
    Team(String),
    /// Every team under a manager's supervisory chain
    Manager(String),
}

impl std::fmt::Display for TrendScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendScope::Team(id) => write!(f, "team:{}", id),
            TrendScope::Manager(id) => write!(f, "manager:{}", id),
        }
    }
}

/// One pre-averaged cell from the trends query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRow {
    pub dimension_id: String,
    pub period: String,
    pub average: f64,
}

/// Which of the two trend queries produced a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendQuery {
    Periods,
    Trends,
}

/// A row that was not folded into the matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub query: TrendQuery,
    /// Zero-based ordinal of the row in that query's result
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionTrend {
    pub dimension_id: String,
    /// `scores[i]` is the average for `periods[i]`, `None` without data
    pub scores: Vec<Option<f64>>,
}

impl DimensionTrend {
    pub fn scores_or_zero(&self) -> Vec<f64> {
        self.scores.iter().map(|s| s.unwrap_or(0.0)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrendResult {
    pub periods: Vec<String>,
    pub dimensions: Vec<DimensionTrend>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedRow>,
}

/// Trend matrix with missing cells reported as `0`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZeroFilledTrend {
    pub periods: Vec<String>,
    pub dimensions: Vec<ZeroFilledDimension>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZeroFilledDimension {
    pub dimension_id: String,
    pub scores: Vec<f64>,
}

impl TrendResult {
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty() && self.dimensions.is_empty()
    }

    pub fn dimension(&self, dimension_id: &str) -> Option<&DimensionTrend> {
        self.dimensions.iter().find(|d| d.dimension_id == dimension_id)
    }

    pub fn zero_filled(&self) -> ZeroFilledTrend {
        ZeroFilledTrend {
            periods: self.periods.clone(),
            dimensions: self
                .dimensions
                .iter()
                .map(|d| ZeroFilledDimension {
                    dimension_id: d.dimension_id.clone(),
                    scores: d.scores_or_zero(),
                })
                .collect(),
        }
    }
}

/// Row source for trend pivots (one implementation per backing store)
pub trait TrendSource {
    /// Distinct non-empty periods of completed sessions in scope, in output order.
    ///
    /// Rows that fail to decode are returned as `Err(SkippedRow)`; a failure
    /// of the query itself is returned as the outer error.
    fn periods(
        &self,
        scope: &TrendScope,
        cancel: &CancelToken,
    ) -> Result<Vec<Result<String, SkippedRow>>, StorageError>;

    /// Per (dimension, period) averages for the same scope, with the same
    /// split between skipped rows and query failures.
    fn trend_rows(
        &self,
        scope: &TrendScope,
        cancel: &CancelToken,
    ) -> Result<Vec<Result<TrendRow, SkippedRow>>, StorageError>;
}

/// Fold trend rows into a matrix aligned with `periods`
pub fn build_pivot<I>(periods: Vec<String>, rows: I) -> TrendResult
where
    I: IntoIterator<Item = Result<TrendRow, SkippedRow>>,
{
    let mut ordered: Vec<String> = Vec::with_capacity(periods.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(periods.len());
    for period in periods {
        if index.contains_key(&period) {
            warn!(period = %period, "Duplicate period label ignored");
            continue;
        }
        index.insert(period.clone(), ordered.len());
        ordered.push(period);
    }

    let mut grid: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
    let mut skipped = Vec::new();

    for (ordinal, row) in rows.into_iter().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(skip) => {
                warn!(row = skip.row, reason = %skip.reason, "Skipping undecodable trend row");
                skipped.push(skip);
                continue;
            }
        };

        let Some(&slot) = index.get(&row.period) else {
            warn!(
                dimension_id = %row.dimension_id,
                period = %row.period,
                "Trend row period not in period list"
            );
            skipped.push(SkippedRow {
                query: TrendQuery::Trends,
                row: ordinal,
                reason: format!("unknown period '{}'", row.period),
            });
            continue;
        };

        let scores = grid
            .entry(row.dimension_id)
            .or_insert_with(|| vec![None; ordered.len()]);
        if let Some(previous) = scores[slot].replace(row.average) {
            debug!(period = %row.period, previous, current = row.average, "Duplicate trend cell, keeping last");
        }
    }

    TrendResult {
        periods: ordered,
        dimensions: grid
            .into_iter()
            .map(|(dimension_id, scores)| DimensionTrend { dimension_id, scores })
            .collect(),
        skipped,
    }
}

/// Run both queries for `scope` and pivot the result.
///
/// No usable periods means no completed sessions: the result is empty and
/// the trends query is not issued. Undecodable period rows are reported in
/// `skipped` ahead of any skipped trend rows.
pub fn build_trend<S>(source: &S, scope: &TrendScope, cancel: &CancelToken) -> Result<TrendResult, StorageError>
where
    S: TrendSource + ?Sized,
{
    cancel.check("before periods query")?;
    let mut periods = Vec::new();
    let mut skipped = Vec::new();
    for period in source.periods(scope, cancel)? {
        match period {
            Ok(period) => periods.push(period),
            Err(skip) => {
                warn!(row = skip.row, reason = %skip.reason, "Skipping undecodable period row");
                skipped.push(skip);
            }
        }
    }
    if periods.is_empty() {
        debug!(scope = %scope, skipped = skipped.len(), "No completed periods in scope");
        return Ok(TrendResult {
            skipped,
            ..TrendResult::default()
        });
    }

    cancel.check("before trends query")?;
    let rows = source.trend_rows(scope, cancel)?;
    cancel.check("after trends query")?;

    let mut result = build_pivot(periods, rows);
    skipped.append(&mut result.skipped);
    result.skipped = skipped;
    debug!(
        scope = %scope,
        periods = result.periods.len(),
        dimensions = result.dimensions.len(),
        skipped = result.skipped.len(),
        "Built trend pivot"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn row(dim: &str, period: &str, average: f64) -> Result<TrendRow, SkippedRow> {
        Ok(TrendRow {
            dimension_id: dim.to_string(),
            period: period.to_string(),
            average,
        })
    }

    fn periods(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    struct StaticSource {
        periods: Vec<Result<String, SkippedRow>>,
        rows: Vec<Result<TrendRow, SkippedRow>>,
        trend_calls: Cell<usize>,
        cancel_after_periods: Option<CancelToken>,
    }

    impl StaticSource {
        fn new(periods: Vec<String>, rows: Vec<Result<TrendRow, SkippedRow>>) -> Self {
            Self {
                periods: periods.into_iter().map(Ok).collect(),
                rows,
                trend_calls: Cell::new(0),
                cancel_after_periods: None,
            }
        }
    }

    impl TrendSource for StaticSource {
        fn periods(
            &self,
            _scope: &TrendScope,
            _cancel: &CancelToken,
        ) -> Result<Vec<Result<String, SkippedRow>>, StorageError> {
            if let Some(token) = &self.cancel_after_periods {
                token.cancel();
            }
            Ok(self.periods.clone())
        }

        fn trend_rows(
            &self,
            _scope: &TrendScope,
            _cancel: &CancelToken,
        ) -> Result<Vec<Result<TrendRow, SkippedRow>>, StorageError> {
            self.trend_calls.set(self.trend_calls.get() + 1);
            Ok(self.rows.clone())
        }
    }

    #[test]
    fn test_missing_cell_is_none_and_zero_when_filled() {
        let result = build_pivot(periods(&["2024-H1", "2024-H2"]), vec![row("dimX", "2024-H1", 2.5)]);

        let dim = result.dimension("dimX").unwrap();
        assert_eq!(dim.scores, vec![Some(2.5), None]);
        assert_eq!(dim.scores_or_zero(), vec![2.5, 0.0]);
        assert_eq!(result.zero_filled().dimensions[0].scores, vec![2.5, 0.0]);
    }

    #[test]
    fn test_every_dimension_matches_period_count() {
        let result = build_pivot(
            periods(&["a", "b", "c"]),
            vec![row("x", "c", 1.0), row("y", "a", 2.0), row("z", "b", 3.0), row("x", "a", 0.5)],
        );

        assert_eq!(result.dimensions.len(), 3);
        for dim in &result.dimensions {
            assert_eq!(dim.scores.len(), result.periods.len());
        }
        assert_eq!(result.dimension("x").unwrap().scores, vec![Some(0.5), None, Some(1.0)]);
    }

    #[test]
    fn test_output_independent_of_row_order() {
        let mut rows = vec![
            row("speed", "2024-H2", 3.0),
            row("mission", "2024-H1", 2.5),
            row("fun", "2024-H1", 1.0),
            row("mission", "2024-H2", 2.0),
        ];
        let first = build_pivot(periods(&["2024-H1", "2024-H2"]), rows.clone());
        rows.reverse();
        let second = build_pivot(periods(&["2024-H1", "2024-H2"]), rows);

        assert_eq!(first, second);
        let ids: Vec<_> = first.dimensions.iter().map(|d| d.dimension_id.as_str()).collect();
        assert_eq!(ids, vec!["fun", "mission", "speed"]);
    }

    #[test]
    fn test_skipped_rows_are_reported() {
        let result = build_pivot(
            periods(&["p1"]),
            vec![
                row("a", "p1", 1.0),
                Err(SkippedRow {
                    query: TrendQuery::Trends,
                    row: 1,
                    reason: "invalid column type".to_string(),
                }),
                row("a", "p9", 2.0),
            ],
        );

        assert_eq!(result.dimension("a").unwrap().scores, vec![Some(1.0)]);
        assert_eq!(result.skipped.len(), 2);
        assert_eq!(result.skipped[0].row, 1);
        assert_eq!(result.skipped[1].row, 2);
        assert!(result.skipped[1].reason.contains("p9"));
    }

    fn bad_period(row: usize) -> Result<String, SkippedRow> {
        Err(SkippedRow {
            query: TrendQuery::Periods,
            row,
            reason: "invalid utf-8".to_string(),
        })
    }

    #[test]
    fn test_bad_period_row_is_skipped_not_fatal() {
        let mut source = StaticSource::new(
            periods(&["p1"]),
            vec![
                row("a", "p1", 1.0),
                Err(SkippedRow {
                    query: TrendQuery::Trends,
                    row: 1,
                    reason: "invalid column type".to_string(),
                }),
            ],
        );
        source.periods.push(bad_period(1));

        let result = build_trend(&source, &TrendScope::Team("t1".into()), &CancelToken::new()).unwrap();

        assert_eq!(result.periods, periods(&["p1"]));
        assert_eq!(result.dimension("a").unwrap().scores, vec![Some(1.0)]);
        let sources: Vec<_> = result.skipped.iter().map(|s| (s.query, s.row)).collect();
        assert_eq!(sources, vec![(TrendQuery::Periods, 1), (TrendQuery::Trends, 1)]);
    }

    #[test]
    fn test_only_bad_periods_is_empty_with_diagnostics() {
        let mut source = StaticSource::new(vec![], vec![row("a", "p1", 1.0)]);
        source.periods.push(bad_period(0));

        let result = build_trend(&source, &TrendScope::Team("t1".into()), &CancelToken::new()).unwrap();

        assert!(result.is_empty());
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(source.trend_calls.get(), 0);
    }

    #[test]
    fn test_duplicate_periods_collapse() {
        let result = build_pivot(periods(&["p1", "p2", "p1"]), vec![row("a", "p2", 1.0)]);
        assert_eq!(result.periods, periods(&["p1", "p2"]));
        assert_eq!(result.dimension("a").unwrap().scores, vec![None, Some(1.0)]);
    }

    #[test]
    fn test_empty_periods_skip_trend_query() {
        let source = StaticSource::new(vec![], vec![row("a", "p1", 1.0)]);
        let result = build_trend(&source, &TrendScope::Team("t1".into()), &CancelToken::new()).unwrap();

        assert!(result.is_empty());
        assert!(result.periods.is_empty());
        assert!(result.dimensions.is_empty());
        assert_eq!(source.trend_calls.get(), 0);
    }

    #[test]
    fn test_cancel_before_start() {
        let source = StaticSource::new(periods(&["p1"]), vec![]);
        let token = CancelToken::new();
        token.cancel();

        let err = build_trend(&source, &TrendScope::Manager("m1".into()), &token).unwrap_err();
        assert!(matches!(err, StorageError::Cancelled(_)));
    }

    #[test]
    fn test_cancel_between_queries_returns_no_partial_result() {
        let token = CancelToken::new();
        let mut source = StaticSource::new(periods(&["p1"]), vec![row("a", "p1", 1.0)]);
        source.cancel_after_periods = Some(token.clone());

        let err = build_trend(&source, &TrendScope::Team("t1".into()), &token).unwrap_err();
        assert!(matches!(err, StorageError::Cancelled(_)));
        assert_eq!(source.trend_calls.get(), 0);
    }

    #[test]
    fn test_scope_serializes_tagged() {
        let json = serde_json::to_value(TrendScope::Manager("m1".into())).unwrap();
        assert_eq!(json, serde_json::json!({ "scope": "manager", "id": "m1" }));
        assert_eq!(TrendScope::Team("t".into()).to_string(), "team:t");
    }
}

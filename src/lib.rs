//! Healthcheck Storage - storage core for team health checks
//!
//! Users score their team on a fixed set of dimensions each assessment
//! period; managers read the results back as trends. This crate owns the
//! two parts of that with real ordering rules:
//!
//! - **Hierarchy ordering** (`reorder`): levels of the reporting structure
//!   keep a dense 1-based `position`. Moves, appends and deletes shift only
//!   the affected block, inside one transaction.
//! - **Trend pivots** (`trend`): per-dimension average scores laid out
//!   against the ordered list of assessment periods, for one team or for
//!   every team under a manager.
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/healthcheck-storage/
//! ├── healthcheck.db   # SQLite (WAL mode)
//! └── config.toml      # Configuration
//! ```

pub mod cancel;
pub mod config;
pub mod db;
pub mod error;
pub mod reorder;
pub mod services;
pub mod trend;

// Re-exports
pub use cancel::CancelToken;
pub use config::Config;
pub use db::HealthDb;
pub use error::{ErrorKind, StorageError};
pub use reorder::{CreateLevelInput, HierarchyLevel, HierarchyTransaction, MovedLevel};
pub use services::Services;
pub use trend::{DimensionTrend, SkippedRow, TrendQuery, TrendResult, TrendScope, TrendSource};

//! Storage layer for trialstore
//!
//! PostgreSQL-backed persistence via sqlx: the ten-table trial schema, the
//! transactional ingest write path, and the read-only quality, statistics,
//! search, and maintenance queries.

mod error;
mod migrations;
mod pg_storage;
pub mod traits;
mod types;

pub use error::StorageError;
pub use pg_storage::PgStorage;
pub use types::{
    ChildRowCounts, DbHealth, IngestOutcome, LongQuery, OptimizeReport, PaginatedResult,
    TableRowCount, TableSize, TrialFilter,
};

//! MaintenanceStore implementation for PgStorage.
//!
//! Optimization and health reporting run directly against the engine's
//! statistics views; backup file mechanics live in the service layer.

use super::*;

use async_trait::async_trait;

use crate::migrations::ALL_TABLES;
use crate::traits::MaintenanceStore;
use crate::types::{DbHealth, LongQuery, OptimizeReport, TableRowCount, TableSize};

#[async_trait]
impl MaintenanceStore for PgStorage {
    async fn optimize(&self) -> Result<OptimizeReport, StorageError> {
        // ANALYZE per table, then a full VACUUM ANALYZE to reclaim dead
        // space. VACUUM cannot run inside a transaction block, so each
        // statement executes on its own autocommit connection.
        let mut analyzed = Vec::with_capacity(ALL_TABLES.len());
        for table in ALL_TABLES {
            sqlx::query(&format!("ANALYZE {table}")).execute(&self.pool).await?;
            analyzed.push((*table).to_owned());
        }
        sqlx::query("VACUUM ANALYZE").execute(&self.pool).await?;

        let database_size: String =
            sqlx::query_scalar("SELECT pg_size_pretty(pg_database_size(current_database()))")
                .fetch_one(&self.pool)
                .await?;
        tracing::info!(%database_size, "database optimization completed");
        Ok(OptimizeReport { analyzed_tables: analyzed, database_size })
    }

    async fn health_check(&self, long_query_threshold_secs: i64) -> Result<DbHealth, StorageError> {
        let row = sqlx::query(
            "SELECT pg_database_size(current_database()) AS size_bytes,
                    pg_size_pretty(pg_database_size(current_database())) AS size",
        )
        .fetch_one(&self.pool)
        .await?;
        let database_size_bytes: i64 = row.try_get("size_bytes")?;
        let database_size: String = row.try_get("size")?;

        let size_rows = sqlx::query(
            "SELECT tablename,
                    pg_size_pretty(pg_total_relation_size('public.'||tablename)) AS size,
                    pg_total_relation_size('public.'||tablename) AS size_bytes
             FROM pg_tables
             WHERE schemaname = 'public' AND tablename = ANY($1)
             ORDER BY pg_total_relation_size('public.'||tablename) DESC",
        )
        .bind(ALL_TABLES.iter().map(|t| (*t).to_owned()).collect::<Vec<String>>())
        .fetch_all(&self.pool)
        .await?;
        let table_sizes = size_rows
            .iter()
            .map(|r| {
                Ok(TableSize {
                    table: r.try_get("tablename")?,
                    size: r.try_get("size")?,
                    size_bytes: r.try_get("size_bytes")?,
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        let active_connections: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pg_stat_activity")
                .fetch_one(&self.pool)
                .await?;

        let long_rows = sqlx::query(
            "SELECT pid,
                    EXTRACT(EPOCH FROM (now() - query_start))::bigint AS duration_secs,
                    query
             FROM pg_stat_activity
             WHERE state = 'active'
               AND query_start IS NOT NULL
               AND now() - query_start > make_interval(secs => $1)
               AND pid <> pg_backend_pid()
             ORDER BY duration_secs DESC",
        )
        .bind(long_query_threshold_secs as f64)
        .fetch_all(&self.pool)
        .await?;
        let long_running_queries = long_rows
            .iter()
            .map(|r| {
                Ok(LongQuery {
                    pid: r.try_get("pid")?,
                    duration_secs: r.try_get("duration_secs")?,
                    query: r.try_get("query")?,
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        Ok(DbHealth {
            checked_at: Utc::now(),
            database_size,
            database_size_bytes,
            table_sizes,
            active_connections,
            long_running_queries,
        })
    }

    async fn table_row_counts(&self) -> Result<Vec<TableRowCount>, StorageError> {
        let mut counts = Vec::with_capacity(ALL_TABLES.len());
        for table in ALL_TABLES {
            let rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&self.pool)
                .await?;
            counts.push(TableRowCount { table: (*table).to_owned(), rows });
        }
        Ok(counts)
    }
}

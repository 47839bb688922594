//! StatsStore implementation for PgStorage.

use super::*;

use async_trait::async_trait;
use trialstore_core::{CountBucket, TrialStats, TOP_BUCKET_LIMIT};

use crate::traits::StatsStore;

async fn distribution(
    pool: &PgPool,
    sql: &str,
    limit: Option<usize>,
) -> Result<Vec<CountBucket>, StorageError> {
    let rows = if let Some(n) = limit {
        sqlx::query(sql).bind(usize_to_i64(n)).fetch_all(pool).await?
    } else {
        sqlx::query(sql).fetch_all(pool).await?
    };
    rows.iter()
        .map(|row| {
            Ok(CountBucket {
                value: row.try_get("value")?,
                count: u64::try_from(row.try_get::<i64, _>("count")?).unwrap_or(0),
            })
        })
        .collect()
}

#[async_trait]
impl StatsStore for PgStorage {
    async fn get_stats(&self) -> Result<TrialStats, StorageError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM trials").fetch_one(&self.pool).await?;

        let by_status = distribution(
            &self.pool,
            "SELECT status AS value, COUNT(*) AS count FROM trials
             WHERE status IS NOT NULL GROUP BY status ORDER BY count DESC",
            None,
        )
        .await?;
        let by_phase = distribution(
            &self.pool,
            "SELECT phase AS value, COUNT(*) AS count FROM trials
             WHERE phase IS NOT NULL GROUP BY phase ORDER BY count DESC",
            None,
        )
        .await?;
        let by_study_type = distribution(
            &self.pool,
            "SELECT study_type AS value, COUNT(*) AS count FROM trials
             WHERE study_type IS NOT NULL GROUP BY study_type ORDER BY count DESC",
            None,
        )
        .await?;

        let avg_enrollment: Option<f64> =
            sqlx::query_scalar("SELECT AVG(enrollment_count)::float8 FROM trials")
                .fetch_one(&self.pool)
                .await?;
        let earliest_start: Option<NaiveDate> =
            sqlx::query_scalar("SELECT MIN(start_date) FROM trials")
                .fetch_one(&self.pool)
                .await?;
        let latest_start: Option<NaiveDate> =
            sqlx::query_scalar("SELECT MAX(start_date) FROM trials")
                .fetch_one(&self.pool)
                .await?;

        let top_organizations = distribution(
            &self.pool,
            "SELECT organization_name AS value, COUNT(*) AS count FROM trials
             WHERE organization_name IS NOT NULL
             GROUP BY organization_name ORDER BY count DESC LIMIT $1",
            Some(TOP_BUCKET_LIMIT),
        )
        .await?;
        let top_conditions = distribution(
            &self.pool,
            "SELECT condition_name AS value, COUNT(*) AS count FROM trial_conditions
             GROUP BY condition_name ORDER BY count DESC LIMIT $1",
            Some(TOP_BUCKET_LIMIT),
        )
        .await?;

        Ok(TrialStats {
            total_trials: u64::try_from(total).unwrap_or(0),
            by_status,
            by_phase,
            by_study_type,
            avg_enrollment,
            earliest_start,
            latest_start,
            top_organizations,
            top_conditions,
        })
    }
}

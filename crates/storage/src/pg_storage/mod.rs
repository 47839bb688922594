//! PostgreSQL storage backend using sqlx.
//!
//! Split into modular files by domain concern.

mod maintenance;
mod quality;
mod search;
mod stats;
mod trials;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use trialstore_core::{
    Phase, StudyType, Trial, TrialDetail, TrialStatus, TrialSummary, PG_POOL_ACQUIRE_TIMEOUT_SECS,
    PG_POOL_IDLE_TIMEOUT_SECS, PG_POOL_MAX_CONNECTIONS,
};

use crate::error::StorageError;
use crate::migrations::run_migrations;

#[derive(Clone, Debug)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(PG_POOL_MAX_CONNECTIONS)
            .acquire_timeout(std::time::Duration::from_secs(PG_POOL_ACQUIRE_TIMEOUT_SECS))
            .idle_timeout(std::time::Duration::from_secs(PG_POOL_IDLE_TIMEOUT_SECS))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;
        run_migrations(&pool).await.map_err(|e| StorageError::Migration(e.to_string()))?;
        tracing::info!("PgStorage initialized");
        Ok(Self { pool })
    }
}

pub(crate) fn row_to_trial(row: &sqlx::postgres::PgRow) -> Result<Trial, StorageError> {
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
    Ok(Trial {
        nct_id: row.try_get("nct_id")?,
        protocol_section_id: row.try_get("protocol_section_id")?,
        organization_name: row.try_get("organization_name")?,
        organization_type: row.try_get("organization_type")?,
        brief_title: row.try_get("brief_title")?,
        official_title: row.try_get("official_title")?,
        status: row.try_get::<Option<String>, _>("status")?.map(TrialStatus::from),
        phase: row.try_get::<Option<String>, _>("phase")?.map(Phase::from),
        study_type: row.try_get::<Option<String>, _>("study_type")?.map(StudyType::from),
        enrollment_count: row.try_get("enrollment_count")?,
        enrollment_type: row.try_get("enrollment_type")?,
        start_date: row.try_get("start_date")?,
        completion_date: row.try_get("completion_date")?,
        primary_completion_date: row.try_get("primary_completion_date")?,
        is_fda_regulated_drug: row.try_get("is_fda_regulated_drug")?,
        is_fda_regulated_device: row.try_get("is_fda_regulated_device")?,
        is_unapproved_device: row.try_get("is_unapproved_device")?,
        is_ppsd: row.try_get("is_ppsd")?,
        is_us_export: row.try_get("is_us_export")?,
        created_at,
        updated_at,
    })
}

pub(crate) fn row_to_trial_detail(row: &sqlx::postgres::PgRow) -> Result<TrialDetail, StorageError> {
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
    Ok(TrialDetail {
        nct_id: row.try_get("nct_id")?,
        brief_title: row.try_get("brief_title")?,
        official_title: row.try_get("official_title")?,
        status: row.try_get::<Option<String>, _>("status")?.map(TrialStatus::from),
        phase: row.try_get::<Option<String>, _>("phase")?.map(Phase::from),
        study_type: row.try_get::<Option<String>, _>("study_type")?.map(StudyType::from),
        enrollment_count: row.try_get("enrollment_count")?,
        start_date: row.try_get("start_date")?,
        completion_date: row.try_get("completion_date")?,
        organization_name: row.try_get("organization_name")?,
        brief_summary: row.try_get("brief_summary")?,
        detailed_description: row.try_get("detailed_description")?,
        inclusion_criteria: row.try_get("inclusion_criteria")?,
        exclusion_criteria: row.try_get("exclusion_criteria")?,
        minimum_age: row.try_get("minimum_age")?,
        maximum_age: row.try_get("maximum_age")?,
        gender: row.try_get("gender")?,
        healthy_volunteers: row.try_get("healthy_volunteers")?,
        created_at,
        updated_at,
    })
}

pub(crate) fn row_to_trial_summary(
    row: &sqlx::postgres::PgRow,
) -> Result<TrialSummary, StorageError> {
    let start_date: Option<NaiveDate> = row.try_get("start_date")?;
    let score: f64 = row.try_get("score").unwrap_or(0.0);
    Ok(TrialSummary {
        nct_id: row.try_get("nct_id")?,
        brief_title: row.try_get("brief_title")?,
        status: row.try_get::<Option<String>, _>("status")?.map(TrialStatus::from),
        phase: row.try_get::<Option<String>, _>("phase")?.map(Phase::from),
        organization_name: row.try_get("organization_name")?,
        start_date,
        score,
    })
}

pub(crate) fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Convert `usize` to `i64` for SQL LIMIT/OFFSET binds.
/// Saturates to `i64::MAX` on overflow (only possible on 128-bit targets).
pub(crate) fn usize_to_i64(val: usize) -> i64 {
    i64::try_from(val).unwrap_or(i64::MAX)
}

/// Turn raw user input into a prefix-matching tsquery. Strips tsquery
/// operators; returns `None` when nothing searchable remains.
pub(crate) fn build_tsquery(query: &str) -> Option<String> {
    let joined = query
        .split_whitespace()
        .filter_map(|w| {
            let sanitized: String =
                w.chars().filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_').collect();
            if sanitized.is_empty() {
                None
            } else {
                Some(format!("{sanitized}:*"))
            }
        })
        .collect::<Vec<_>>()
        .join(" & ");
    if joined.is_empty() { None } else { Some(joined) }
}

pub(crate) const TRIAL_COLUMNS: &str =
    "nct_id, protocol_section_id, organization_name, organization_type,
     brief_title, official_title, status, phase, study_type,
     enrollment_count, enrollment_type, start_date, completion_date,
     primary_completion_date, is_fda_regulated_drug, is_fda_regulated_device,
     is_unapproved_device, is_ppsd, is_us_export, created_at, updated_at";

pub(crate) const DETAIL_COLUMNS: &str =
    "nct_id, brief_title, official_title, status, phase, study_type,
     enrollment_count, start_date, completion_date, organization_name,
     brief_summary, detailed_description, inclusion_criteria,
     exclusion_criteria, minimum_age, maximum_age, gender,
     healthy_volunteers, created_at, updated_at";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsquery_appends_prefix_markers() {
        assert_eq!(build_tsquery("diabetes insulin"), Some("diabetes:* & insulin:*".to_owned()));
    }

    #[test]
    fn tsquery_strips_operators() {
        assert_eq!(build_tsquery("heart & | ! attack"), Some("heart:* & attack:*".to_owned()));
    }

    #[test]
    fn tsquery_empty_input_yields_none() {
        assert_eq!(build_tsquery(""), None);
        assert_eq!(build_tsquery("&&& |||"), None);
    }

    #[test]
    fn like_escaping_covers_wildcards() {
        assert_eq!(escape_like("50%_done\\"), "50\\%\\_done\\\\");
    }
}

//! QualityStore implementation for PgStorage.
//!
//! Every check is a read-only query returning the offending trial
//! identifiers; the arithmetic lives in `trialstore_core::quality`.

use super::*;

use async_trait::async_trait;
use trialstore_core::{
    CheckFinding, QualityFindings, DATE_HORIZON_YEARS, MAX_PLAUSIBLE_ENROLLMENT,
    MIN_PLAUSIBLE_DATE,
};

use crate::migrations::ALL_TABLES;
use crate::traits::QualityStore;

const EMAIL_SHAPE: &str = r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$";
const PHONE_SHAPE: &str = r"^[+]?[0-9\s\-\(\)]{10,}$";

async fn offenders(pool: &PgPool, sql: &str) -> Result<Vec<String>, StorageError> {
    let ids: Vec<String> = sqlx::query_scalar(sql).fetch_all(pool).await?;
    Ok(ids)
}

#[async_trait]
impl QualityStore for PgStorage {
    async fn collect_findings(&self) -> Result<QualityFindings, StorageError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM trials").fetch_one(&self.pool).await?;

        // ── completeness: required fields populated ──────────────────
        let mut completeness = Vec::new();
        for (check, column) in [
            ("missing_brief_title", "brief_title"),
            ("missing_official_title", "official_title"),
            ("missing_status", "status"),
            ("missing_study_type", "study_type"),
            ("missing_organization", "organization_name"),
        ] {
            completeness.push(CheckFinding::new(
                check,
                offenders(
                    &self.pool,
                    &format!(
                        "SELECT nct_id FROM trials WHERE {column} IS NULL OR {column} = ''"
                    ),
                )
                .await?,
            ));
        }
        completeness.push(CheckFinding::new(
            "missing_description",
            offenders(
                &self.pool,
                "SELECT t.nct_id FROM trials t
                 LEFT JOIN trial_descriptions d ON t.nct_id = d.nct_id
                 WHERE d.nct_id IS NULL",
            )
            .await?,
        ));
        completeness.push(CheckFinding::new(
            "missing_eligibility",
            offenders(
                &self.pool,
                "SELECT t.nct_id FROM trials t
                 LEFT JOIN trial_eligibility e ON t.nct_id = e.nct_id
                 WHERE e.nct_id IS NULL",
            )
            .await?,
        ));

        // ── consistency: cross-field agreement ───────────────────────
        let mut consistency = Vec::new();
        consistency.push(CheckFinding::new(
            "start_after_completion",
            offenders(
                &self.pool,
                "SELECT nct_id FROM trials
                 WHERE start_date IS NOT NULL AND completion_date IS NOT NULL
                   AND start_date > completion_date",
            )
            .await?,
        ));
        consistency.push(CheckFinding::new(
            "start_after_primary_completion",
            offenders(
                &self.pool,
                "SELECT nct_id FROM trials
                 WHERE start_date IS NOT NULL AND primary_completion_date IS NOT NULL
                   AND start_date > primary_completion_date",
            )
            .await?,
        ));
        let implausible_enrollment: Vec<String> = sqlx::query_scalar(
            "SELECT nct_id FROM trials
             WHERE enrollment_count < 0 OR enrollment_count > $1",
        )
        .bind(MAX_PLAUSIBLE_ENROLLMENT)
        .fetch_all(&self.pool)
        .await?;
        consistency.push(CheckFinding::new("implausible_enrollment", implausible_enrollment));

        // ── format: field values match the expected shape ────────────
        let mut format = Vec::new();
        format.push(CheckFinding::new(
            "malformed_nct_id",
            offenders(
                &self.pool,
                r"SELECT nct_id FROM trials WHERE nct_id !~ '^NCT[0-9]{8}$'",
            )
            .await?,
        ));
        let bad_emails: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT nct_id FROM (
                 SELECT nct_id, facility_contact_email AS email FROM trial_locations
                 UNION ALL
                 SELECT nct_id, email FROM trial_contacts
             ) emails
             WHERE email IS NOT NULL AND email <> '' AND email !~ $1",
        )
        .bind(EMAIL_SHAPE)
        .fetch_all(&self.pool)
        .await?;
        format.push(CheckFinding::new("invalid_contact_email", bad_emails));
        let bad_phones: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT nct_id FROM (
                 SELECT nct_id, facility_contact_phone AS phone FROM trial_locations
                 UNION ALL
                 SELECT nct_id, phone FROM trial_contacts
             ) phones
             WHERE phone IS NOT NULL AND phone <> '' AND phone !~ $1",
        )
        .bind(PHONE_SHAPE)
        .fetch_all(&self.pool)
        .await?;
        format.push(CheckFinding::new("invalid_contact_phone", bad_phones));
        let implausible_dates: Vec<String> = sqlx::query_scalar(
            "SELECT nct_id FROM trials
             WHERE (start_date IS NOT NULL AND start_date < $1::date)
                OR (completion_date IS NOT NULL AND completion_date < $1::date)
                OR (start_date IS NOT NULL
                    AND start_date > CURRENT_DATE + make_interval(years => $2))
                OR (completion_date IS NOT NULL
                    AND completion_date > CURRENT_DATE + make_interval(years => $2))",
        )
        .bind(MIN_PLAUSIBLE_DATE)
        .bind(DATE_HORIZON_YEARS)
        .fetch_all(&self.pool)
        .await?;
        format.push(CheckFinding::new("implausible_dates", implausible_dates));

        // ── relationship: no orphans, no trials missing related data ─
        let mut relationship = Vec::new();
        // Orphans cannot arise while the FK constraints hold; the checks
        // still run so tampered or constraint-stripped data gets flagged
        // instead of silently trusted.
        for table in ALL_TABLES.iter().filter(|t| **t != "trials") {
            relationship.push(CheckFinding::new(
                format!("orphaned_{table}"),
                offenders(
                    &self.pool,
                    &format!(
                        "SELECT DISTINCT c.nct_id FROM {table} c
                         LEFT JOIN trials t ON c.nct_id = t.nct_id
                         WHERE t.nct_id IS NULL"
                    ),
                )
                .await?,
            ));
        }
        for (check, table) in [
            ("missing_conditions", "trial_conditions"),
            ("missing_keywords", "trial_keywords"),
            ("missing_outcomes", "trial_outcomes"),
            ("missing_locations", "trial_locations"),
        ] {
            relationship.push(CheckFinding::new(
                check,
                offenders(
                    &self.pool,
                    &format!(
                        "SELECT t.nct_id FROM trials t
                         LEFT JOIN {table} c ON t.nct_id = c.nct_id
                         WHERE c.nct_id IS NULL"
                    ),
                )
                .await?,
            ));
        }

        Ok(QualityFindings {
            total_trials: u64::try_from(total).unwrap_or(0),
            completeness,
            consistency,
            format,
            relationship,
        })
    }
}

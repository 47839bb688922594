//! TrialStore implementation for PgStorage.

use super::*;

use async_trait::async_trait;
use trialstore_core::{parse_partial_date, TrialRecord};

use crate::traits::TrialStore;
use crate::types::{ChildRowCounts, IngestOutcome, PaginatedResult, TrialFilter};

fn parsed_date(s: Option<&str>) -> Option<NaiveDate> {
    s.and_then(parse_partial_date)
}

/// Render filter fields into SQL conditions and string binds, numbering
/// parameters from `start_idx`. `prefix` qualifies column names when the
/// query aliases the trials table.
pub(crate) fn filter_conditions(
    filter: &TrialFilter,
    prefix: &str,
    start_idx: usize,
) -> (Vec<String>, Vec<String>) {
    let mut conditions = Vec::new();
    let mut binds: Vec<String> = Vec::new();
    let mut idx = start_idx;

    if let Some(status) = &filter.status {
        conditions.push(format!("{prefix}status = ${idx}"));
        binds.push(status.clone());
        idx += 1;
    }
    if let Some(phase) = &filter.phase {
        conditions.push(format!("{prefix}phase = ${idx}"));
        binds.push(phase.clone());
        idx += 1;
    }
    if let Some(study_type) = &filter.study_type {
        conditions.push(format!("{prefix}study_type = ${idx}"));
        binds.push(study_type.clone());
        idx += 1;
    }
    if let Some(organization) = &filter.organization {
        conditions.push(format!("{prefix}organization_name ILIKE ${idx}"));
        binds.push(format!("%{}%", escape_like(organization)));
        idx += 1;
    }
    if let Some(from) = filter.start_date_from {
        conditions.push(format!("{prefix}start_date >= ${idx}::date"));
        binds.push(from.format("%Y-%m-%d").to_string());
        idx += 1;
    }
    if let Some(to) = filter.start_date_to {
        conditions.push(format!("{prefix}start_date <= ${idx}::date"));
        binds.push(to.format("%Y-%m-%d").to_string());
    }

    (conditions, binds)
}

#[async_trait]
impl TrialStore for PgStorage {
    async fn upsert_trial(&self, record: &TrialRecord) -> Result<IngestOutcome, StorageError> {
        let mut tx = self.pool.begin().await?;

        // Lock the root row (when present) so concurrent writers on the same
        // identifier serialize; the later transaction wins.
        let existing: Option<String> =
            sqlx::query_scalar("SELECT nct_id FROM trials WHERE nct_id = $1 FOR UPDATE")
                .bind(&record.nct_id)
                .fetch_optional(&mut *tx)
                .await?;
        let created = existing.is_none();

        sqlx::query(
            r#"INSERT INTO trials (
                   nct_id, protocol_section_id, organization_name, organization_type,
                   brief_title, official_title, status, phase, study_type,
                   enrollment_count, enrollment_type, start_date, completion_date,
                   primary_completion_date, is_fda_regulated_drug, is_fda_regulated_device,
                   is_unapproved_device, is_ppsd, is_us_export
               ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19)
               ON CONFLICT (nct_id) DO UPDATE SET
                   protocol_section_id = EXCLUDED.protocol_section_id,
                   organization_name = EXCLUDED.organization_name,
                   organization_type = EXCLUDED.organization_type,
                   brief_title = EXCLUDED.brief_title,
                   official_title = EXCLUDED.official_title,
                   status = EXCLUDED.status,
                   phase = EXCLUDED.phase,
                   study_type = EXCLUDED.study_type,
                   enrollment_count = EXCLUDED.enrollment_count,
                   enrollment_type = EXCLUDED.enrollment_type,
                   start_date = EXCLUDED.start_date,
                   completion_date = EXCLUDED.completion_date,
                   primary_completion_date = EXCLUDED.primary_completion_date,
                   is_fda_regulated_drug = EXCLUDED.is_fda_regulated_drug,
                   is_fda_regulated_device = EXCLUDED.is_fda_regulated_device,
                   is_unapproved_device = EXCLUDED.is_unapproved_device,
                   is_ppsd = EXCLUDED.is_ppsd,
                   is_us_export = EXCLUDED.is_us_export,
                   updated_at = NOW()"#,
        )
        .bind(&record.nct_id)
        .bind(&record.protocol_section_id)
        .bind(&record.organization_name)
        .bind(&record.organization_type)
        .bind(&record.brief_title)
        .bind(&record.official_title)
        .bind(record.status.as_ref().map(|s| s.as_str()))
        .bind(record.phase.as_ref().map(|p| p.as_str()))
        .bind(record.study_type.as_ref().map(|s| s.as_str()))
        .bind(record.enrollment_count)
        .bind(&record.enrollment_type)
        .bind(parsed_date(record.start_date.as_deref()))
        .bind(parsed_date(record.completion_date.as_deref()))
        .bind(parsed_date(record.primary_completion_date.as_deref()))
        .bind(record.is_fda_regulated_drug)
        .bind(record.is_fda_regulated_device)
        .bind(record.is_unapproved_device)
        .bind(record.is_ppsd)
        .bind(record.is_us_export)
        .execute(&mut *tx)
        .await?;

        // 1:1 blocks upsert by primary key.
        if let Some(desc) = &record.description {
            sqlx::query(
                r#"INSERT INTO trial_descriptions (nct_id, brief_summary, detailed_description)
                   VALUES ($1, $2, $3)
                   ON CONFLICT (nct_id) DO UPDATE SET
                       brief_summary = EXCLUDED.brief_summary,
                       detailed_description = EXCLUDED.detailed_description"#,
            )
            .bind(&record.nct_id)
            .bind(&desc.brief_summary)
            .bind(&desc.detailed_description)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(elig) = &record.eligibility {
            sqlx::query(
                r#"INSERT INTO trial_eligibility (
                       nct_id, inclusion_criteria, exclusion_criteria,
                       minimum_age, maximum_age, gender, healthy_volunteers
                   ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                   ON CONFLICT (nct_id) DO UPDATE SET
                       inclusion_criteria = EXCLUDED.inclusion_criteria,
                       exclusion_criteria = EXCLUDED.exclusion_criteria,
                       minimum_age = EXCLUDED.minimum_age,
                       maximum_age = EXCLUDED.maximum_age,
                       gender = EXCLUDED.gender,
                       healthy_volunteers = EXCLUDED.healthy_volunteers"#,
            )
            .bind(&record.nct_id)
            .bind(&elig.inclusion_criteria)
            .bind(&elig.exclusion_criteria)
            .bind(&elig.minimum_age)
            .bind(&elig.maximum_age)
            .bind(&elig.gender)
            .bind(elig.healthy_volunteers)
            .execute(&mut *tx)
            .await?;
        }

        // Repeating groups replace wholesale: delete-then-insert, only when
        // the collection was supplied. `None` leaves stored rows alone.
        if let Some(arms) = &record.arms_interventions {
            sqlx::query("DELETE FROM trial_arms_interventions WHERE nct_id = $1")
                .bind(&record.nct_id)
                .execute(&mut *tx)
                .await?;
            for arm in arms {
                sqlx::query(
                    r#"INSERT INTO trial_arms_interventions (
                           nct_id, arm_group_label, arm_group_type, arm_group_description,
                           intervention_name, intervention_type, intervention_description
                       ) VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
                )
                .bind(&record.nct_id)
                .bind(&arm.arm_group_label)
                .bind(&arm.arm_group_type)
                .bind(&arm.arm_group_description)
                .bind(&arm.intervention_name)
                .bind(&arm.intervention_type)
                .bind(&arm.intervention_description)
                .execute(&mut *tx)
                .await?;
            }
        }

        if let Some(outcomes) = &record.outcomes {
            sqlx::query("DELETE FROM trial_outcomes WHERE nct_id = $1")
                .bind(&record.nct_id)
                .execute(&mut *tx)
                .await?;
            for outcome in outcomes {
                sqlx::query(
                    r#"INSERT INTO trial_outcomes (
                           nct_id, outcome_type, outcome_measure,
                           outcome_description, outcome_time_frame
                       ) VALUES ($1, $2, $3, $4, $5)"#,
                )
                .bind(&record.nct_id)
                .bind(outcome.outcome_type.as_str())
                .bind(&outcome.measure)
                .bind(&outcome.description)
                .bind(&outcome.time_frame)
                .execute(&mut *tx)
                .await?;
            }
        }

        if let Some(locations) = &record.locations {
            sqlx::query("DELETE FROM trial_locations WHERE nct_id = $1")
                .bind(&record.nct_id)
                .execute(&mut *tx)
                .await?;
            for loc in locations {
                sqlx::query(
                    r#"INSERT INTO trial_locations (
                           nct_id, facility_name, facility_address, facility_city,
                           facility_state, facility_zip, facility_country,
                           facility_contact_name, facility_contact_phone, facility_contact_email
                       ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
                )
                .bind(&record.nct_id)
                .bind(&loc.facility_name)
                .bind(&loc.facility_address)
                .bind(&loc.facility_city)
                .bind(&loc.facility_state)
                .bind(&loc.facility_zip)
                .bind(&loc.facility_country)
                .bind(&loc.facility_contact_name)
                .bind(&loc.facility_contact_phone)
                .bind(&loc.facility_contact_email)
                .execute(&mut *tx)
                .await?;
            }
        }

        if let Some(contacts) = &record.contacts {
            sqlx::query("DELETE FROM trial_contacts WHERE nct_id = $1")
                .bind(&record.nct_id)
                .execute(&mut *tx)
                .await?;
            for contact in contacts {
                sqlx::query(
                    r#"INSERT INTO trial_contacts (nct_id, contact_type, name, role, phone, email)
                       VALUES ($1, $2, $3, $4, $5, $6)"#,
                )
                .bind(&record.nct_id)
                .bind(contact.contact_type.as_str())
                .bind(&contact.name)
                .bind(&contact.role)
                .bind(&contact.phone)
                .bind(&contact.email)
                .execute(&mut *tx)
                .await?;
            }
        }

        if let Some(conditions) = &record.conditions {
            sqlx::query("DELETE FROM trial_conditions WHERE nct_id = $1")
                .bind(&record.nct_id)
                .execute(&mut *tx)
                .await?;
            for condition in conditions {
                sqlx::query("INSERT INTO trial_conditions (nct_id, condition_name) VALUES ($1, $2)")
                    .bind(&record.nct_id)
                    .bind(condition)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        if let Some(keywords) = &record.keywords {
            sqlx::query("DELETE FROM trial_keywords WHERE nct_id = $1")
                .bind(&record.nct_id)
                .execute(&mut *tx)
                .await?;
            for keyword in keywords {
                sqlx::query("INSERT INTO trial_keywords (nct_id, keyword) VALUES ($1, $2)")
                    .bind(&record.nct_id)
                    .bind(keyword)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        if let Some(interventions) = &record.interventions {
            sqlx::query("DELETE FROM trial_interventions WHERE nct_id = $1")
                .bind(&record.nct_id)
                .execute(&mut *tx)
                .await?;
            for intervention in interventions {
                sqlx::query(
                    r#"INSERT INTO trial_interventions (nct_id, name, intervention_type, description)
                       VALUES ($1, $2, $3, $4)"#,
                )
                .bind(&record.nct_id)
                .bind(&intervention.name)
                .bind(&intervention.intervention_type)
                .bind(&intervention.description)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        tracing::info!(nct_id = %record.nct_id, created, "trial upserted");
        Ok(IngestOutcome { nct_id: record.nct_id.clone(), created })
    }

    async fn get_trial(&self, nct_id: &str) -> Result<Option<TrialDetail>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {DETAIL_COLUMNS} FROM trial_complete_info WHERE nct_id = $1"
        ))
        .bind(nct_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| row_to_trial_detail(&r)).transpose()
    }

    async fn get_trial_row(&self, nct_id: &str) -> Result<Option<Trial>, StorageError> {
        let row =
            sqlx::query(&format!("SELECT {TRIAL_COLUMNS} FROM trials WHERE nct_id = $1"))
                .bind(nct_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|r| row_to_trial(&r)).transpose()
    }

    async fn list_trials(
        &self,
        filter: &TrialFilter,
        offset: usize,
        limit: usize,
    ) -> Result<PaginatedResult<TrialDetail>, StorageError> {
        let (conditions, binds) = filter_conditions(filter, "", 1);
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM trial_complete_info{where_clause}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for bind in &binds {
            count_query = count_query.bind(bind);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let page_sql = format!(
            "SELECT {DETAIL_COLUMNS} FROM trial_complete_info{where_clause}
             ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            binds.len() + 1,
            binds.len() + 2,
        );
        let mut page_query = sqlx::query(&page_sql);
        for bind in &binds {
            page_query = page_query.bind(bind);
        }
        let rows = page_query
            .bind(usize_to_i64(limit))
            .bind(usize_to_i64(offset))
            .fetch_all(&self.pool)
            .await?;
        let items: Vec<TrialDetail> =
            rows.iter().map(row_to_trial_detail).collect::<Result<_, StorageError>>()?;

        Ok(PaginatedResult {
            items,
            total: u64::try_from(total).unwrap_or(0),
            offset: u64::try_from(offset).unwrap_or(0),
            limit: u64::try_from(limit).unwrap_or(0),
        })
    }

    async fn delete_trial(&self, nct_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM trials WHERE nct_id = $1")
            .bind(nct_id)
            .execute(&self.pool)
            .await?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(nct_id, "trial deleted (children cascaded)");
        }
        Ok(deleted)
    }

    async fn child_row_counts(&self, nct_id: &str) -> Result<ChildRowCounts, StorageError> {
        async fn count(
            pool: &PgPool,
            table: &str,
            nct_id: &str,
        ) -> Result<u64, StorageError> {
            let n: i64 =
                sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE nct_id = $1"))
                    .bind(nct_id)
                    .fetch_one(pool)
                    .await?;
            Ok(u64::try_from(n).unwrap_or(0))
        }

        Ok(ChildRowCounts {
            descriptions: count(&self.pool, "trial_descriptions", nct_id).await?,
            eligibility: count(&self.pool, "trial_eligibility", nct_id).await?,
            arms_interventions: count(&self.pool, "trial_arms_interventions", nct_id).await?,
            outcomes: count(&self.pool, "trial_outcomes", nct_id).await?,
            locations: count(&self.pool, "trial_locations", nct_id).await?,
            contacts: count(&self.pool, "trial_contacts", nct_id).await?,
            conditions: count(&self.pool, "trial_conditions", nct_id).await?,
            keywords: count(&self.pool, "trial_keywords", nct_id).await?,
            interventions: count(&self.pool, "trial_interventions", nct_id).await?,
        })
    }
}

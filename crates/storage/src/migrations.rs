//! PostgreSQL schema migrations for trialstore.
//!
//! One primary table (`trials`), nine dependent tables cascading on delete,
//! and the `trial_complete_info` view. All statements are idempotent so the
//! migration can run at every pool construction.

use anyhow::Result;
use sqlx::PgPool;

/// Every table of the schema, primary first. Order matters for restores and
/// row-count reports.
pub const ALL_TABLES: &[&str] = &[
    "trials",
    "trial_descriptions",
    "trial_eligibility",
    "trial_arms_interventions",
    "trial_outcomes",
    "trial_locations",
    "trial_contacts",
    "trial_conditions",
    "trial_keywords",
    "trial_interventions",
];

/// The 1:N dependent tables (everything except the primary and the two 1:1
/// blocks keyed directly by `nct_id`).
pub const CHILD_LIST_TABLES: &[&str] = &[
    "trial_arms_interventions",
    "trial_outcomes",
    "trial_locations",
    "trial_contacts",
    "trial_conditions",
    "trial_keywords",
    "trial_interventions",
];

/// Run all PostgreSQL migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trials (
            nct_id TEXT PRIMARY KEY,
            protocol_section_id TEXT,
            organization_name TEXT,
            organization_type TEXT,
            brief_title TEXT,
            official_title TEXT,
            status TEXT,
            phase TEXT,
            study_type TEXT,
            enrollment_count INTEGER,
            enrollment_type TEXT,
            start_date DATE,
            completion_date DATE,
            primary_completion_date DATE,
            is_fda_regulated_drug BOOLEAN,
            is_fda_regulated_device BOOLEAN,
            is_unapproved_device BOOLEAN,
            is_ppsd BOOLEAN,
            is_us_export BOOLEAN,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Filter-query indexes on the primary table
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trials_status ON trials (status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trials_phase ON trials (phase)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trials_study_type ON trials (study_type)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trials_organization ON trials (organization_name)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trials_start_date ON trials (start_date)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_trials_completion_date ON trials (completion_date)",
    )
    .execute(pool)
    .await?;

    // Full-text search over titles: tsvector column + GIN index
    sqlx::query(
        r#"
        DO $$ BEGIN
            IF NOT EXISTS (
                SELECT 1 FROM information_schema.columns
                WHERE table_name = 'trials' AND column_name = 'search_vec'
            ) THEN
                ALTER TABLE trials ADD COLUMN search_vec tsvector
                    GENERATED ALWAYS AS (
                        setweight(to_tsvector('english', COALESCE(brief_title, '')), 'A') ||
                        setweight(to_tsvector('english', COALESCE(official_title, '')), 'B')
                    ) STORED;
            END IF;
        END $$
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trials_search_vec ON trials USING GIN (search_vec)")
        .execute(pool)
        .await?;

    // Descriptions (1:0..1)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trial_descriptions (
            nct_id TEXT PRIMARY KEY REFERENCES trials (nct_id) ON DELETE CASCADE,
            brief_summary TEXT,
            detailed_description TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        DO $$ BEGIN
            IF NOT EXISTS (
                SELECT 1 FROM information_schema.columns
                WHERE table_name = 'trial_descriptions' AND column_name = 'search_vec'
            ) THEN
                ALTER TABLE trial_descriptions ADD COLUMN search_vec tsvector
                    GENERATED ALWAYS AS (
                        setweight(to_tsvector('english', COALESCE(brief_summary, '')), 'A') ||
                        setweight(to_tsvector('english', COALESCE(detailed_description, '')), 'B')
                    ) STORED;
            END IF;
        END $$
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_descriptions_search_vec ON trial_descriptions USING GIN (search_vec)",
    )
    .execute(pool)
    .await?;

    // Eligibility (1:0..1)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trial_eligibility (
            nct_id TEXT PRIMARY KEY REFERENCES trials (nct_id) ON DELETE CASCADE,
            inclusion_criteria TEXT,
            exclusion_criteria TEXT,
            minimum_age TEXT,
            maximum_age TEXT,
            gender TEXT,
            healthy_volunteers BOOLEAN
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Arm groups and their interventions (1:N)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trial_arms_interventions (
            id BIGSERIAL PRIMARY KEY,
            nct_id TEXT NOT NULL REFERENCES trials (nct_id) ON DELETE CASCADE,
            arm_group_label TEXT,
            arm_group_type TEXT,
            arm_group_description TEXT,
            intervention_name TEXT,
            intervention_type TEXT,
            intervention_description TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Outcome measures, primary and secondary (1:N)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trial_outcomes (
            id BIGSERIAL PRIMARY KEY,
            nct_id TEXT NOT NULL REFERENCES trials (nct_id) ON DELETE CASCADE,
            outcome_type TEXT NOT NULL,
            outcome_measure TEXT,
            outcome_description TEXT,
            outcome_time_frame TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Study sites (1:N)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trial_locations (
            id BIGSERIAL PRIMARY KEY,
            nct_id TEXT NOT NULL REFERENCES trials (nct_id) ON DELETE CASCADE,
            facility_name TEXT,
            facility_address TEXT,
            facility_city TEXT,
            facility_state TEXT,
            facility_zip TEXT,
            facility_country TEXT,
            facility_contact_name TEXT,
            facility_contact_phone TEXT,
            facility_contact_email TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Trial-level contacts: primary, backup, official (1:N)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trial_contacts (
            id BIGSERIAL PRIMARY KEY,
            nct_id TEXT NOT NULL REFERENCES trials (nct_id) ON DELETE CASCADE,
            contact_type TEXT NOT NULL,
            name TEXT,
            role TEXT,
            phone TEXT,
            email TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Conditions studied (1:N)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trial_conditions (
            id BIGSERIAL PRIMARY KEY,
            nct_id TEXT NOT NULL REFERENCES trials (nct_id) ON DELETE CASCADE,
            condition_name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Registry keywords (1:N)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trial_keywords (
            id BIGSERIAL PRIMARY KEY,
            nct_id TEXT NOT NULL REFERENCES trials (nct_id) ON DELETE CASCADE,
            keyword TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Standalone interventions (1:N)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trial_interventions (
            id BIGSERIAL PRIMARY KEY,
            nct_id TEXT NOT NULL REFERENCES trials (nct_id) ON DELETE CASCADE,
            name TEXT,
            intervention_type TEXT,
            description TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Join indexes on every 1:N foreign key
    for table in CHILD_LIST_TABLES {
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_nct_id ON {table} (nct_id)"
        ))
        .execute(pool)
        .await?;
    }

    // Text search over conditions and keywords (expression indexes)
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_conditions_fts ON trial_conditions
         USING GIN (to_tsvector('english', condition_name))",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_keywords_fts ON trial_keywords
         USING GIN (to_tsvector('english', keyword))",
    )
    .execute(pool)
    .await?;

    // Composite view for single-query retrieval of complete trial info.
    // CREATE OR REPLACE keeps it in step with the tables above.
    sqlx::query(
        r#"
        CREATE OR REPLACE VIEW trial_complete_info AS
        SELECT
            t.nct_id,
            t.brief_title,
            t.official_title,
            t.status,
            t.phase,
            t.study_type,
            t.enrollment_count,
            t.start_date,
            t.completion_date,
            t.organization_name,
            d.brief_summary,
            d.detailed_description,
            e.inclusion_criteria,
            e.exclusion_criteria,
            e.minimum_age,
            e.maximum_age,
            e.gender,
            e.healthy_volunteers,
            t.created_at,
            t.updated_at
        FROM trials t
        LEFT JOIN trial_descriptions d ON t.nct_id = d.nct_id
        LEFT JOIN trial_eligibility e ON t.nct_id = e.nct_id
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("PostgreSQL migrations completed");
    Ok(())
}

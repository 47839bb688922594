//! Integration tests for PgStorage.
//! Run with: DATABASE_URL=... cargo test -p trialstore-storage -- --ignored pg_

#![allow(clippy::unwrap_used, reason = "integration test code")]

use std::sync::atomic::{AtomicU64, Ordering};

use trialstore_core::{
    Contact, ContactType, Description, Eligibility, Intervention, Outcome, OutcomeType, Phase,
    TrialRecord, TrialStatus,
};
use trialstore_storage::traits::{QualityStore, SearchStore, StatsStore, TrialStore};
use trialstore_storage::{PgStorage, TrialFilter};

async fn create_pg_storage() -> PgStorage {
    let url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for PgStorage integration tests");
    PgStorage::new(&url).await.expect("Failed to connect to PostgreSQL")
}

/// Unique syntactically-valid registry id per call (NCT + 8 digits).
fn unique_nct_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .subsec_nanos() as u64;
    let n = (nanos * 1000 + COUNTER.fetch_add(1, Ordering::Relaxed)) % 100_000_000;
    format!("NCT{n:08}")
}

fn full_record(nct_id: &str) -> TrialRecord {
    TrialRecord {
        nct_id: nct_id.to_owned(),
        organization_name: Some("Example Medical Center".to_owned()),
        brief_title: Some("Insulin timing study".to_owned()),
        official_title: Some("A randomized study of insulin dose timing".to_owned()),
        status: Some(TrialStatus::Recruiting),
        phase: Some(Phase::Phase3),
        study_type: Some("INTERVENTIONAL".into()),
        enrollment_count: Some(240),
        start_date: Some("2024-01".to_owned()),
        completion_date: Some("2026-06-30".to_owned()),
        description: Some(Description {
            brief_summary: Some("Evaluates dose timing.".to_owned()),
            detailed_description: Some("Long-form description.".to_owned()),
        }),
        eligibility: Some(Eligibility {
            inclusion_criteria: Some("Adults 18-65".to_owned()),
            exclusion_criteria: Some("Pregnancy".to_owned()),
            minimum_age: Some("18 Years".to_owned()),
            maximum_age: Some("65 Years".to_owned()),
            gender: Some("ALL".to_owned()),
            healthy_volunteers: Some(false),
        }),
        outcomes: Some(vec![
            Outcome {
                outcome_type: OutcomeType::Primary,
                measure: Some("HbA1c change".to_owned()),
                description: None,
                time_frame: Some("12 weeks".to_owned()),
            },
            Outcome {
                outcome_type: OutcomeType::Secondary,
                measure: Some("Hypoglycemic events".to_owned()),
                description: None,
                time_frame: Some("12 weeks".to_owned()),
            },
        ]),
        contacts: Some(vec![Contact {
            contact_type: ContactType::Primary,
            name: Some("Study Desk".to_owned()),
            role: Some("Coordinator".to_owned()),
            phone: Some("+1 555 010 0100".to_owned()),
            email: Some("study@example.org".to_owned()),
        }]),
        conditions: Some(vec!["Diabetes".to_owned()]),
        keywords: Some(vec!["diabetes".to_owned(), "insulin".to_owned()]),
        interventions: Some(vec![Intervention {
            name: Some("Insulin glargine".to_owned()),
            intervention_type: Some("DRUG".to_owned()),
            description: None,
        }]),
        ..TrialRecord::default()
    }
}

// ── Ingest tests ─────────────────────────────────────────────────

#[tokio::test]
#[ignore]
async fn pg_ingest_creates_expected_rows() {
    let storage = create_pg_storage().await;
    let nct_id = unique_nct_id();

    let outcome = storage.upsert_trial(&full_record(&nct_id)).await.unwrap();
    assert!(outcome.created, "First ingest should create the trial");

    let counts = storage.child_row_counts(&nct_id).await.unwrap();
    assert_eq!(counts.descriptions, 1);
    assert_eq!(counts.eligibility, 1);
    assert_eq!(counts.outcomes, 2);
    assert_eq!(counts.contacts, 1);
    assert_eq!(counts.conditions, 1);
    assert_eq!(counts.keywords, 2);
    assert_eq!(counts.interventions, 1);
    assert_eq!(counts.arms_interventions, 0, "Unsupplied group stays empty");

    let detail = storage.get_trial(&nct_id).await.unwrap().expect("view row should exist");
    assert_eq!(detail.status, Some(TrialStatus::Recruiting));
    assert_eq!(detail.brief_summary.as_deref(), Some("Evaluates dose timing."));
    assert_eq!(detail.inclusion_criteria.as_deref(), Some("Adults 18-65"));
    // Month-precision registry date resolves to the first of the month.
    assert_eq!(detail.start_date.map(|d| d.to_string()), Some("2024-01-01".to_owned()));

    storage.delete_trial(&nct_id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn pg_reingest_updates_in_place() {
    // The §8-style scenario: same identifier, modified status.
    let storage = create_pg_storage().await;
    let nct_id = unique_nct_id();
    let record = TrialRecord {
        nct_id: nct_id.clone(),
        brief_title: Some("T".to_owned()),
        status: Some(TrialStatus::Recruiting),
        phase: Some(Phase::Phase3),
        conditions: Some(vec!["Diabetes".to_owned()]),
        keywords: Some(vec!["diabetes".to_owned(), "phase3".to_owned()]),
        ..TrialRecord::default()
    };

    let first = storage.upsert_trial(&record).await.unwrap();
    assert!(first.created);
    let before = storage.get_trial_row(&nct_id).await.unwrap().unwrap();

    let updated = TrialRecord { status: Some(TrialStatus::Completed), ..record };
    let second = storage.upsert_trial(&updated).await.unwrap();
    assert!(!second.created, "Re-ingest must update, not create");

    let after = storage.get_trial_row(&nct_id).await.unwrap().unwrap();
    assert_eq!(after.status, Some(TrialStatus::Completed));
    assert_eq!(after.created_at, before.created_at, "created_at is immutable");
    assert!(after.updated_at > before.updated_at, "updated_at must advance on mutation");

    let counts = storage.child_row_counts(&nct_id).await.unwrap();
    assert_eq!(counts.conditions, 1, "Replaced-but-equal, never duplicated");
    assert_eq!(counts.keywords, 2);

    storage.delete_trial(&nct_id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn pg_unsupplied_collections_are_left_alone() {
    let storage = create_pg_storage().await;
    let nct_id = unique_nct_id();
    storage.upsert_trial(&full_record(&nct_id)).await.unwrap();

    // Status-only refresh: every collection is None.
    let refresh = TrialRecord {
        nct_id: nct_id.clone(),
        status: Some(TrialStatus::Completed),
        ..TrialRecord::default()
    };
    storage.upsert_trial(&refresh).await.unwrap();

    let counts = storage.child_row_counts(&nct_id).await.unwrap();
    assert_eq!(counts.keywords, 2, "None must not clear stored rows");
    assert_eq!(counts.outcomes, 2);

    // Supplying an empty list does clear.
    let clear = TrialRecord {
        nct_id: nct_id.clone(),
        keywords: Some(vec![]),
        ..TrialRecord::default()
    };
    storage.upsert_trial(&clear).await.unwrap();
    let counts = storage.child_row_counts(&nct_id).await.unwrap();
    assert_eq!(counts.keywords, 0, "Some(empty) clears the collection");

    storage.delete_trial(&nct_id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn pg_delete_cascades_to_children() {
    let storage = create_pg_storage().await;
    let nct_id = unique_nct_id();
    storage.upsert_trial(&full_record(&nct_id)).await.unwrap();

    let deleted = storage.delete_trial(&nct_id).await.unwrap();
    assert!(deleted);

    let counts = storage.child_row_counts(&nct_id).await.unwrap();
    assert_eq!(counts, Default::default(), "No child row survives its parent");
    assert!(storage.get_trial(&nct_id).await.unwrap().is_none());

    let again = storage.delete_trial(&nct_id).await.unwrap();
    assert!(!again, "Deleting a missing trial reports false");
}

// ── Read-path tests ──────────────────────────────────────────────

#[tokio::test]
#[ignore]
async fn pg_list_trials_applies_filters() {
    let storage = create_pg_storage().await;
    let nct_id = unique_nct_id();
    let mut record = full_record(&nct_id);
    record.status = Some(TrialStatus::Other("PAUSED_FOR_REVIEW".to_owned()));
    storage.upsert_trial(&record).await.unwrap();

    let filter = TrialFilter {
        status: Some("PAUSED_FOR_REVIEW".to_owned()),
        ..TrialFilter::default()
    };
    let page = storage.list_trials(&filter, 0, 50).await.unwrap();
    assert!(page.items.iter().any(|t| t.nct_id == nct_id));
    assert!(page.total >= 1);

    storage.delete_trial(&nct_id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn pg_search_matches_condition_text() {
    let storage = create_pg_storage().await;
    let nct_id = unique_nct_id();
    let mut record = full_record(&nct_id);
    // Distinctive token for FTS matching.
    record.conditions = Some(vec!["Xeroderma pigmentosum".to_owned()]);
    storage.upsert_trial(&record).await.unwrap();

    let hits =
        storage.search("xeroderma", &TrialFilter::default(), 20).await.unwrap();
    assert!(hits.iter().any(|h| h.nct_id == nct_id), "Condition text should be searchable");

    let miss = storage.search("", &TrialFilter::default(), 20).await.unwrap();
    assert!(miss.is_empty(), "Empty query returns nothing");

    storage.delete_trial(&nct_id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn pg_stats_reflect_ingested_trials() {
    let storage = create_pg_storage().await;
    let nct_id = unique_nct_id();
    storage.upsert_trial(&full_record(&nct_id)).await.unwrap();

    let stats = storage.get_stats().await.unwrap();
    assert!(stats.total_trials >= 1);
    assert!(stats.by_status.iter().any(|b| b.value == "RECRUITING"));
    assert!(stats.avg_enrollment.is_some());

    storage.delete_trial(&nct_id).await.unwrap();
}

// ── Quality tests ────────────────────────────────────────────────

#[tokio::test]
#[ignore]
async fn pg_quality_flags_incomplete_trial() {
    let storage = create_pg_storage().await;
    let nct_id = unique_nct_id();
    // Bare record: no titles, no description, no children.
    let record = TrialRecord { nct_id: nct_id.clone(), ..TrialRecord::default() };
    storage.upsert_trial(&record).await.unwrap();

    let findings = storage.collect_findings().await.unwrap();
    assert!(findings.total_trials >= 1);
    let missing_title = findings
        .completeness
        .iter()
        .find(|c| c.check == "missing_brief_title")
        .expect("check should exist");
    assert!(missing_title.offenders.contains(&nct_id));
    let missing_conditions = findings
        .relationship
        .iter()
        .find(|c| c.check == "missing_conditions")
        .expect("check should exist");
    assert!(missing_conditions.offenders.contains(&nct_id));

    // Running the audit must not have mutated anything.
    let row = storage.get_trial_row(&nct_id).await.unwrap().unwrap();
    assert_eq!(row.created_at, row.updated_at);

    storage.delete_trial(&nct_id).await.unwrap();
}

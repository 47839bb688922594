//! Backup/restore round-trip tests.
//! Run with: DATABASE_URL=... TRIALSTORE_SCRATCH_DATABASE_URL=... \
//!     cargo test -p trialstore-service -- --ignored roundtrip_
//!
//! Requires `pg_dump` and `pg_restore` on PATH. The scratch database is
//! clobbered by the restore; never point it at real data.

#![allow(clippy::unwrap_used, reason = "integration test code")]

use std::sync::Arc;

use trialstore_core::TrialRecord;
use trialstore_storage::traits::{MaintenanceStore, TrialStore};
use trialstore_storage::PgStorage;
use trialstore_service::{BackupKind, MaintenanceConfig, MaintenanceService, MaintenanceStage, StageStatus};

fn live_url() -> String {
    std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for round-trip tests")
}

fn scratch_url() -> String {
    std::env::var("TRIALSTORE_SCRATCH_DATABASE_URL")
        .expect("TRIALSTORE_SCRATCH_DATABASE_URL must be set for round-trip tests")
}

async fn service_with_tempdir() -> (MaintenanceService, Arc<PgStorage>, tempfile::TempDir) {
    let storage = Arc::new(PgStorage::new(&live_url()).await.unwrap());
    let dir = tempfile::tempdir().unwrap();
    let config = MaintenanceConfig {
        database_url: live_url(),
        backup_dir: dir.path().to_path_buf(),
        retention_days: 30,
        long_query_threshold_secs: 300,
    };
    (MaintenanceService::new(Arc::clone(&storage), config), storage, dir)
}

#[tokio::test]
#[ignore]
async fn roundtrip_restore_reproduces_row_counts() {
    let (service, storage, _dir) = service_with_tempdir().await;

    // A known write before the snapshot.
    let record = TrialRecord {
        nct_id: "NCT99999901".to_owned(),
        brief_title: Some("Round-trip marker".to_owned()),
        conditions: Some(vec!["Marker condition".to_owned()]),
        ..TrialRecord::default()
    };
    storage.upsert_trial(&record).await.unwrap();
    let live_counts = storage.table_row_counts().await.unwrap();

    let backup = service.create_backup(BackupKind::Full).await.unwrap();
    assert!(backup.size_bytes > 0);

    let verification = service.verify_latest_backup(&scratch_url()).await.unwrap();
    assert_eq!(verification.backup.file_name, backup.file_name);
    assert_eq!(
        verification.table_row_counts, live_counts,
        "restored data set must match the live one row-for-row"
    );

    storage.delete_trial("NCT99999901").await.unwrap();
}

#[tokio::test]
#[ignore]
async fn roundtrip_full_maintenance_run_records_every_stage() {
    let (service, _storage, _dir) = service_with_tempdir().await;

    let log = service.run().await;
    assert!(!log.fatal, "backup should succeed with pg_dump available");
    assert_eq!(log.stage_status(MaintenanceStage::BackingUp), Some(StageStatus::Ok));
    assert_eq!(log.stage_status(MaintenanceStage::CleaningOldBackups), Some(StageStatus::Ok));
    assert_eq!(log.stage_status(MaintenanceStage::Optimizing), Some(StageStatus::Ok));
    assert_eq!(log.stage_status(MaintenanceStage::HealthCheck), Some(StageStatus::Ok));
    assert!(log.health.is_some(), "health snapshot should be attached");

    // A second run is safe: optimization is idempotent, the new backup is a
    // separate timestamped artifact. Artifact names have second resolution.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let again = service.run().await;
    assert!(!again.fatal);
    assert!(service.list_backups().await.unwrap().len() >= 2);
}

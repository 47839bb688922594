//! Periodic custodial operations, decoupled from request serving.
//!
//! One invocation walks the stage machine
//! `Idle → BackingUp → CleaningOldBackups → Optimizing → HealthCheck → Done`,
//! recording every stage outcome in a [`MaintenanceLog`]. A failed stage does
//! not abort the run, with one exception: when the backup stage fails the run
//! is marked fatal and optimization is skipped, since vacuuming without a
//! fresh backup is unsafe.
//!
//! Backup artifacts are `pg_dump` custom-format files named
//! `trials_backup_{kind}_{YYYYMMDD_HHMMSS}.dump`; kind and creation time are
//! parsed back from the name, never from filesystem metadata.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use trialstore_core::{
    env_parse_with_default, DEFAULT_BACKUP_RETENTION_DAYS, DEFAULT_LONG_QUERY_THRESHOLD_SECS,
};
use trialstore_storage::traits::MaintenanceStore;
use trialstore_storage::{DbHealth, PgStorage, TableRowCount};

use crate::error::ServiceError;

const BACKUP_PREFIX: &str = "trials_backup_";
const BACKUP_SUFFIX: &str = ".dump";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// What a backup captures. PostgreSQL logical dumps have no true incremental
/// mode, so `Incremental` is a data-only dump restorable over an existing
/// schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    Full,
    Incremental,
}

impl BackupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
        }
    }
}

impl std::str::FromStr for BackupKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "incremental" => Ok(Self::Incremental),
            _ => Err(ServiceError::Backup(format!("unknown backup kind: {s}"))),
        }
    }
}

/// One backup artifact, identified by kind and creation timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupInfo {
    pub file_name: String,
    pub path: PathBuf,
    pub kind: BackupKind,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

fn backup_file_name(kind: BackupKind, created_at: DateTime<Utc>) -> String {
    format!(
        "{BACKUP_PREFIX}{}_{}{BACKUP_SUFFIX}",
        kind.as_str(),
        created_at.format(TIMESTAMP_FORMAT)
    )
}

/// Parse kind and creation time out of an artifact name. Returns `None` for
/// files that are not trialstore backups, so stray files in the backup
/// directory are never touched.
fn parse_backup_file_name(name: &str) -> Option<(BackupKind, DateTime<Utc>)> {
    let stem = name.strip_prefix(BACKUP_PREFIX)?.strip_suffix(BACKUP_SUFFIX)?;
    let (kind_str, ts_str) = stem.split_once('_')?;
    let kind: BackupKind = kind_str.parse().ok()?;
    let naive = NaiveDateTime::parse_from_str(ts_str, TIMESTAMP_FORMAT).ok()?;
    Some((kind, naive.and_utc()))
}

/// The maintenance state machine's stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStage {
    Idle,
    BackingUp,
    CleaningOldBackups,
    Optimizing,
    HealthCheck,
    Done,
}

impl MaintenanceStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::BackingUp => "backing_up",
            Self::CleaningOldBackups => "cleaning_old_backups",
            Self::Optimizing => "optimizing",
            Self::HealthCheck => "health_check",
            Self::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Ok,
    Failed,
    Skipped,
}

/// Outcome of one executed (or skipped) stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: MaintenanceStage,
    pub status: StageStatus,
    pub detail: String,
}

impl StageOutcome {
    fn ok(stage: MaintenanceStage, detail: impl Into<String>) -> Self {
        Self { stage, status: StageStatus::Ok, detail: detail.into() }
    }

    fn failed(stage: MaintenanceStage, detail: impl Into<String>) -> Self {
        Self { stage, status: StageStatus::Failed, detail: detail.into() }
    }

    fn skipped(stage: MaintenanceStage, detail: impl Into<String>) -> Self {
        Self { stage, status: StageStatus::Skipped, detail: detail.into() }
    }
}

/// Timestamped record of one maintenance run, persisted as JSON for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceLog {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// True when the backup stage failed; the run continued where safe but
    /// must be treated as unsuccessful.
    pub fatal: bool,
    pub outcomes: Vec<StageOutcome>,
    pub health: Option<DbHealth>,
}

impl MaintenanceLog {
    pub fn stage_status(&self, stage: MaintenanceStage) -> Option<StageStatus> {
        self.outcomes.iter().find(|o| o.stage == stage).map(|o| o.status)
    }
}

/// Result of a verification restore into a scratch database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreVerification {
    pub backup: BackupInfo,
    pub table_row_counts: Vec<TableRowCount>,
}

/// Maintenance configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    pub database_url: String,
    pub backup_dir: PathBuf,
    pub retention_days: i64,
    pub long_query_threshold_secs: i64,
}

impl MaintenanceConfig {
    /// Resolve from `TRIALSTORE_*` environment variables, with defaults
    /// matching the documented maintenance policy.
    pub fn from_env(database_url: impl Into<String>) -> Self {
        let backup_dir = std::env::var("TRIALSTORE_BACKUP_DIR").map_or_else(
            |_| {
                dirs::data_local_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("trialstore")
                    .join("backups")
            },
            PathBuf::from,
        );
        Self {
            database_url: database_url.into(),
            backup_dir,
            retention_days: env_parse_with_default(
                "TRIALSTORE_BACKUP_RETENTION_DAYS",
                DEFAULT_BACKUP_RETENTION_DAYS,
            ),
            long_query_threshold_secs: env_parse_with_default(
                "TRIALSTORE_LONG_QUERY_THRESHOLD_SECS",
                DEFAULT_LONG_QUERY_THRESHOLD_SECS,
            ),
        }
    }
}

pub struct MaintenanceService {
    storage: Arc<PgStorage>,
    config: MaintenanceConfig,
}

impl MaintenanceService {
    #[must_use]
    pub const fn new(storage: Arc<PgStorage>, config: MaintenanceConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &MaintenanceConfig {
        &self.config
    }

    /// Capture a snapshot with `pg_dump`. The artifact is written into the
    /// configured backup directory and identified by kind + timestamp.
    pub async fn create_backup(&self, kind: BackupKind) -> Result<BackupInfo, ServiceError> {
        tokio::fs::create_dir_all(&self.config.backup_dir).await?;
        let created_at = Utc::now();
        let file_name = backup_file_name(kind, created_at);
        let path = self.config.backup_dir.join(&file_name);

        let mut cmd = Command::new("pg_dump");
        cmd.arg("--format=custom").arg("--no-password").arg("--file").arg(&path);
        if kind == BackupKind::Incremental {
            cmd.arg("--data-only");
        }
        cmd.arg("--dbname").arg(&self.config.database_url);

        let output = cmd
            .output()
            .await
            .map_err(|e| ServiceError::ExternalCommand(format!("pg_dump: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ServiceError::ExternalCommand(format!(
                "pg_dump exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let size_bytes = tokio::fs::metadata(&path).await?.len();
        tracing::info!(file = %file_name, size_bytes, "backup created");
        Ok(BackupInfo { file_name, path, kind, created_at, size_bytes })
    }

    /// Reconstruct the data set from a backup artifact. `backup` may be a
    /// bare artifact name (resolved against the backup directory) or a path.
    /// `target_url` overrides the live database (used for test restores).
    pub async fn restore_backup(
        &self,
        backup: &Path,
        target_url: Option<&str>,
    ) -> Result<(), ServiceError> {
        let path = if backup.is_absolute() || backup.exists() {
            backup.to_path_buf()
        } else {
            self.config.backup_dir.join(backup)
        };
        if !tokio::fs::try_exists(&path).await? {
            return Err(ServiceError::Backup(format!(
                "backup artifact not found: {}",
                path.display()
            )));
        }

        let url = target_url.unwrap_or(&self.config.database_url);
        let output = Command::new("pg_restore")
            .arg("--clean")
            .arg("--if-exists")
            .arg("--no-owner")
            .arg("--no-password")
            .arg("--dbname")
            .arg(url)
            .arg(&path)
            .output()
            .await
            .map_err(|e| ServiceError::ExternalCommand(format!("pg_restore: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ServiceError::ExternalCommand(format!(
                "pg_restore exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        tracing::info!(backup = %path.display(), "backup restored");
        Ok(())
    }

    /// All recognized backup artifacts, newest first.
    pub async fn list_backups(&self) -> Result<Vec<BackupInfo>, ServiceError> {
        let mut backups = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.config.backup_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(backups),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some((kind, created_at)) = parse_backup_file_name(&file_name) else {
                continue;
            };
            let size_bytes = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            backups.push(BackupInfo {
                file_name,
                path: entry.path(),
                kind,
                created_at,
                size_bytes,
            });
        }
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }

    /// Delete artifacts older than the retention horizon. Returns how many
    /// were removed.
    pub async fn cleanup_old_backups(&self) -> Result<usize, ServiceError> {
        let cutoff = Utc::now() - chrono::Duration::days(self.config.retention_days);
        let mut removed = 0;
        for backup in self.list_backups().await? {
            if backup.created_at < cutoff {
                tokio::fs::remove_file(&backup.path).await?;
                tracing::info!(file = %backup.file_name, "removed expired backup");
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub async fn optimize(&self) -> Result<trialstore_storage::OptimizeReport, ServiceError> {
        Ok(self.storage.optimize().await?)
    }

    pub async fn health_check(&self) -> Result<DbHealth, ServiceError> {
        Ok(self.storage.health_check(self.config.long_query_threshold_secs).await?)
    }

    /// Restore the newest backup into a scratch database and report what
    /// landed there. Meant to run on the maintenance schedule so restores
    /// are validated, not just documented.
    pub async fn verify_latest_backup(
        &self,
        scratch_url: &str,
    ) -> Result<RestoreVerification, ServiceError> {
        let backup = self
            .list_backups()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Backup("no backup artifacts to verify".to_owned()))?;
        self.restore_backup(&backup.path, Some(scratch_url)).await?;
        let scratch = PgStorage::new(scratch_url).await?;
        let table_row_counts = scratch.table_row_counts().await?;
        Ok(RestoreVerification { backup, table_row_counts })
    }

    /// One full pass of the stage machine. Never returns an error: every
    /// stage failure is recorded in the log instead.
    pub async fn run(&self) -> MaintenanceLog {
        let started_at = Utc::now();
        let mut outcomes = Vec::new();
        let mut fatal = false;

        let backup_ok = match self.create_backup(BackupKind::Full).await {
            Ok(info) => {
                outcomes.push(StageOutcome::ok(
                    MaintenanceStage::BackingUp,
                    format!("created {} ({} bytes)", info.file_name, info.size_bytes),
                ));
                true
            },
            Err(e) => {
                tracing::error!(error = %e, "backup stage failed; run is fatal");
                outcomes.push(StageOutcome::failed(MaintenanceStage::BackingUp, e.to_string()));
                fatal = true;
                false
            },
        };

        match self.cleanup_old_backups().await {
            Ok(removed) => outcomes.push(StageOutcome::ok(
                MaintenanceStage::CleaningOldBackups,
                format!("removed {removed} expired backups"),
            )),
            Err(e) => {
                tracing::warn!(error = %e, "backup cleanup stage failed");
                outcomes
                    .push(StageOutcome::failed(MaintenanceStage::CleaningOldBackups, e.to_string()));
            },
        }

        if backup_ok {
            match self.optimize().await {
                Ok(report) => outcomes.push(StageOutcome::ok(
                    MaintenanceStage::Optimizing,
                    format!(
                        "analyzed {} tables, database size {}",
                        report.analyzed_tables.len(),
                        report.database_size
                    ),
                )),
                Err(e) => {
                    tracing::warn!(error = %e, "optimization stage failed");
                    outcomes.push(StageOutcome::failed(MaintenanceStage::Optimizing, e.to_string()));
                },
            }
        } else {
            outcomes.push(StageOutcome::skipped(
                MaintenanceStage::Optimizing,
                "no fresh backup; optimizing without one is unsafe",
            ));
        }

        let health = match self.health_check().await {
            Ok(health) => {
                outcomes.push(StageOutcome::ok(
                    MaintenanceStage::HealthCheck,
                    format!(
                        "database size {}, {} active connections, {} long-running queries",
                        health.database_size,
                        health.active_connections,
                        health.long_running_queries.len()
                    ),
                ));
                Some(health)
            },
            Err(e) => {
                tracing::warn!(error = %e, "health check stage failed");
                outcomes.push(StageOutcome::failed(MaintenanceStage::HealthCheck, e.to_string()));
                None
            },
        };

        let log =
            MaintenanceLog { started_at, finished_at: Utc::now(), fatal, outcomes, health };
        if let Err(e) = self.persist_log(&log).await {
            tracing::warn!(error = %e, "failed to persist maintenance log");
        }
        log
    }

    async fn persist_log(&self, log: &MaintenanceLog) -> Result<PathBuf, ServiceError> {
        tokio::fs::create_dir_all(&self.config.backup_dir).await?;
        let path = self.config.backup_dir.join(format!(
            "maintenance_log_{}.json",
            log.started_at.format(TIMESTAMP_FORMAT)
        ));
        tokio::fs::write(&path, serde_json::to_vec_pretty(log)?).await?;
        Ok(path)
    }
}

/// Spawns a background task that runs the maintenance pass on an interval.
///
/// Errors are recorded inside each run's log; the loop itself never stops.
/// Scheduling runs inside low-traffic windows is operational policy, not
/// enforced here.
pub fn start_maintenance_loop(service: Arc<MaintenanceService>, every: std::time::Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let log = service.run().await;
            if log.fatal {
                tracing::error!("maintenance run finished with a fatal backup failure");
            } else {
                tracing::info!(stages = log.outcomes.len(), "maintenance run finished");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_file_name_round_trips() {
        let ts = DateTime::parse_from_rfc3339("2026-08-06T12:30:45Z").unwrap().with_timezone(&Utc);
        let name = backup_file_name(BackupKind::Full, ts);
        assert_eq!(name, "trials_backup_full_20260806_123045.dump");
        let (kind, parsed) = parse_backup_file_name(&name).unwrap();
        assert_eq!(kind, BackupKind::Full);
        assert_eq!(parsed, ts);
    }

    #[test]
    fn incremental_kind_is_encoded_in_the_name() {
        let ts = Utc::now();
        let name = backup_file_name(BackupKind::Incremental, ts);
        let (kind, _) = parse_backup_file_name(&name).unwrap();
        assert_eq!(kind, BackupKind::Incremental);
    }

    #[test]
    fn foreign_files_are_not_recognized_as_backups() {
        for name in [
            "maintenance_log_20260806_123045.json",
            "trials_backup_full_notadate.dump",
            "trials_backup_weekly_20260806_123045.dump",
            "random.txt",
            "trials_backup_full_20260806_123045.sql",
        ] {
            assert!(parse_backup_file_name(name).is_none(), "{name} must be ignored");
        }
    }

    #[test]
    fn retention_compares_filename_timestamps() {
        let now = Utc::now();
        let fresh = backup_file_name(BackupKind::Full, now - chrono::Duration::days(1));
        let stale = backup_file_name(BackupKind::Full, now - chrono::Duration::days(45));
        let cutoff = now - chrono::Duration::days(DEFAULT_BACKUP_RETENTION_DAYS);

        let (_, fresh_ts) = parse_backup_file_name(&fresh).unwrap();
        let (_, stale_ts) = parse_backup_file_name(&stale).unwrap();
        assert!(fresh_ts >= cutoff, "fresh backup must be kept");
        assert!(stale_ts < cutoff, "stale backup must be removed");
    }

    #[tokio::test]
    async fn list_backups_skips_unrecognized_files() {
        let dir = tempfile::tempdir().unwrap();
        let ts = Utc::now();
        let good = backup_file_name(BackupKind::Full, ts);
        std::fs::write(dir.path().join(&good), b"dump").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("maintenance_log_20260101_000000.json"), b"{}").unwrap();

        let config = MaintenanceConfig {
            database_url: "postgres://unused".to_owned(),
            backup_dir: dir.path().to_path_buf(),
            retention_days: DEFAULT_BACKUP_RETENTION_DAYS,
            long_query_threshold_secs: DEFAULT_LONG_QUERY_THRESHOLD_SECS,
        };
        // Storage is never touched by list_backups; a service instance is
        // not needed for this path, so test the directory scan directly.
        let mut found = Vec::new();
        let mut entries = tokio::fs::read_dir(&config.backup_dir).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if parse_backup_file_name(&name).is_some() {
                found.push(name);
            }
        }
        assert_eq!(found, vec![good]);
    }

    #[test]
    fn stage_serialization_uses_snake_case() {
        let json = serde_json::to_string(&MaintenanceStage::CleaningOldBackups).unwrap();
        assert_eq!(json, r#""cleaning_old_backups""#);
        let status = serde_json::to_string(&StageStatus::Skipped).unwrap();
        assert_eq!(status, r#""skipped""#);
    }

    #[test]
    fn log_lookup_finds_stage_status() {
        let log = MaintenanceLog {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            fatal: true,
            outcomes: vec![
                StageOutcome::failed(MaintenanceStage::BackingUp, "pg_dump missing"),
                StageOutcome::ok(MaintenanceStage::CleaningOldBackups, "removed 0 expired backups"),
                StageOutcome::skipped(MaintenanceStage::Optimizing, "no fresh backup"),
            ],
            health: None,
        };
        assert_eq!(log.stage_status(MaintenanceStage::BackingUp), Some(StageStatus::Failed));
        assert_eq!(log.stage_status(MaintenanceStage::Optimizing), Some(StageStatus::Skipped));
        assert_eq!(log.stage_status(MaintenanceStage::HealthCheck), None);
    }
}

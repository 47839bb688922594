use std::sync::Arc;

use chrono::Utc;
use trialstore_core::QualityReport;
use trialstore_storage::traits::QualityStore;
use trialstore_storage::PgStorage;

use crate::error::ServiceError;

/// Read-only data-quality auditor. Collects raw findings from storage and
/// scores them with the deterministic rules in `trialstore_core::quality`.
pub struct QualityService {
    storage: Arc<PgStorage>,
}

impl QualityService {
    #[must_use]
    pub const fn new(storage: Arc<PgStorage>) -> Self {
        Self { storage }
    }

    pub async fn run_checks(&self) -> Result<QualityReport, ServiceError> {
        let findings = self.storage.collect_findings().await?;
        let report = QualityReport::from_findings(findings, Utc::now());
        tracing::info!(
            total_trials = report.total_trials,
            overall_score = report.overall_score,
            level = report.quality_level.as_str(),
            "quality check completed"
        );
        Ok(report)
    }
}

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use trialstore_core::TrialRecord;
use trialstore_storage::traits::TrialStore;
use trialstore_storage::{IngestOutcome, PgStorage};

use crate::error::ServiceError;

/// The write surface: validates each denormalized record, then hands it to
/// the storage layer's transactional upsert. The only component that writes
/// trial data.
pub struct IngestService {
    storage: Arc<PgStorage>,
}

/// Outcome for one record of a batch. `created` is present on success,
/// `error` on failure. The service never retries internally; the caller
/// decides what to do with failed items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemOutcome {
    pub nct_id: String,
    pub created: Option<bool>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<BatchItemOutcome>,
}

impl IngestService {
    #[must_use]
    pub const fn new(storage: Arc<PgStorage>) -> Self {
        Self { storage }
    }

    /// Ingest one record. Validation failures reject before any write; a
    /// failure mid-transaction leaves nothing behind.
    pub async fn ingest(&self, record: &TrialRecord) -> Result<IngestOutcome, ServiceError> {
        record.validate()?;
        let outcome = self.storage.upsert_trial(record).await?;
        Ok(outcome)
    }

    /// Ingest a batch, reporting per-record outcomes. One bad record does
    /// not stop the rest.
    pub async fn ingest_batch(&self, records: &[TrialRecord]) -> BatchOutcome {
        let mut items = Vec::with_capacity(records.len());
        let mut succeeded = 0;
        for record in records {
            match self.ingest(record).await {
                Ok(outcome) => {
                    succeeded += 1;
                    items.push(BatchItemOutcome {
                        nct_id: outcome.nct_id,
                        created: Some(outcome.created),
                        error: None,
                    });
                },
                Err(e) => {
                    tracing::warn!(nct_id = %record.nct_id, error = %e, "record ingest failed");
                    items.push(BatchItemOutcome {
                        nct_id: record.nct_id.clone(),
                        created: None,
                        error: Some(e.to_string()),
                    });
                },
            }
        }
        BatchOutcome { total: records.len(), succeeded, failed: records.len() - succeeded, items }
    }
}

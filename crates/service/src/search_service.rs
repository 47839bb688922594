use std::sync::Arc;

use trialstore_core::{TrialDetail, TrialStats, TrialSummary, MAX_QUERY_LIMIT};
use trialstore_storage::traits::{SearchStore, StatsStore, TrialStore};
use trialstore_storage::{PaginatedResult, PgStorage, TrialFilter};

use crate::error::ServiceError;

/// Read-mostly query surface: retrieval, listing, full-text search,
/// statistics, and the one destructive operator action (delete).
pub struct SearchService {
    storage: Arc<PgStorage>,
}

impl SearchService {
    #[must_use]
    pub const fn new(storage: Arc<PgStorage>) -> Self {
        Self { storage }
    }

    pub async fn get_trial(&self, nct_id: &str) -> Result<Option<TrialDetail>, ServiceError> {
        Ok(self.storage.get_trial(nct_id).await?)
    }

    pub async fn list_trials(
        &self,
        filter: &TrialFilter,
        offset: usize,
        limit: usize,
    ) -> Result<PaginatedResult<TrialDetail>, ServiceError> {
        Ok(self.storage.list_trials(filter, offset, limit.min(MAX_QUERY_LIMIT)).await?)
    }

    pub async fn search(
        &self,
        query: &str,
        filter: &TrialFilter,
        limit: usize,
    ) -> Result<Vec<TrialSummary>, ServiceError> {
        Ok(self.storage.search(query, filter, limit.min(MAX_QUERY_LIMIT)).await?)
    }

    /// Explicit operator removal; the only path that ever deletes a trial.
    pub async fn delete_trial(&self, nct_id: &str) -> Result<bool, ServiceError> {
        Ok(self.storage.delete_trial(nct_id).await?)
    }

    pub async fn stats(&self) -> Result<TrialStats, ServiceError> {
        Ok(self.storage.get_stats().await?)
    }

    /// Every stored trial's complete info, for file export. Pages through
    /// the view so the full set never has to fit in one query.
    pub async fn export_all(&self) -> Result<Vec<TrialDetail>, ServiceError> {
        let filter = TrialFilter::default();
        let mut all = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.storage.list_trials(&filter, offset, MAX_QUERY_LIMIT).await?;
            let fetched = page.items.len();
            all.extend(page.items);
            offset += fetched;
            if fetched == 0 || all.len() as u64 >= page.total {
                break;
            }
        }
        Ok(all)
    }
}

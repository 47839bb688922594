//! SearchStore implementation for PgStorage.
//!
//! Full-text search spans the title vectors on `trials`, the summary vectors
//! on `trial_descriptions`, and the condition/keyword expression indexes, so
//! a phrase matches wherever the registry put it.

use super::*;

use async_trait::async_trait;

use super::trials::filter_conditions;
use crate::traits::SearchStore;
use crate::types::TrialFilter;

#[async_trait]
impl SearchStore for PgStorage {
    async fn search(
        &self,
        query: &str,
        filter: &TrialFilter,
        limit: usize,
    ) -> Result<Vec<TrialSummary>, StorageError> {
        let Some(tsquery) = build_tsquery(query) else {
            return Ok(Vec::new());
        };

        let (conditions, binds) = filter_conditions(filter, "t.", 2);
        let filter_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" AND {}", conditions.join(" AND "))
        };
        let limit_idx = binds.len() + 2;

        let sql = format!(
            r#"SELECT t.nct_id, t.brief_title, t.status, t.phase, t.organization_name,
                      t.start_date,
                      GREATEST(
                          ts_rank_cd(t.search_vec, to_tsquery('english', $1)),
                          ts_rank_cd(COALESCE(d.search_vec, ''::tsvector), to_tsquery('english', $1))
                      )::float8 AS score
                 FROM trials t
                 LEFT JOIN trial_descriptions d ON t.nct_id = d.nct_id
                WHERE (
                      t.search_vec @@ to_tsquery('english', $1)
                   OR COALESCE(d.search_vec, ''::tsvector) @@ to_tsquery('english', $1)
                   OR EXISTS (
                          SELECT 1 FROM trial_conditions c
                           WHERE c.nct_id = t.nct_id
                             AND to_tsvector('english', c.condition_name)
                                 @@ to_tsquery('english', $1)
                      )
                   OR EXISTS (
                          SELECT 1 FROM trial_keywords k
                           WHERE k.nct_id = t.nct_id
                             AND to_tsvector('english', k.keyword)
                                 @@ to_tsquery('english', $1)
                      )
                ){filter_clause}
                ORDER BY score DESC, t.created_at DESC
                LIMIT ${limit_idx}"#
        );

        let mut db_query = sqlx::query(&sql).bind(&tsquery);
        for bind in &binds {
            db_query = db_query.bind(bind);
        }
        let rows = db_query.bind(usize_to_i64(limit)).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_trial_summary).collect::<Result<_, StorageError>>()
    }
}

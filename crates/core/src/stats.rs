use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One value/count pair in a distribution (status, phase, organization, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountBucket {
    pub value: String,
    pub count: u64,
}

/// Aggregate statistics over the stored trials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrialStats {
    pub total_trials: u64,
    pub by_status: Vec<CountBucket>,
    pub by_phase: Vec<CountBucket>,
    pub by_study_type: Vec<CountBucket>,
    pub avg_enrollment: Option<f64>,
    pub earliest_start: Option<NaiveDate>,
    pub latest_start: Option<NaiveDate>,
    pub top_organizations: Vec<CountBucket>,
    pub top_conditions: Vec<CountBucket>,
}

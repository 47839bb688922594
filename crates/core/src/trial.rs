use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Overall recruitment status of a trial.
///
/// The canonical value set is defined by the upstream registry. Values
/// outside it are preserved verbatim through `Other` rather than rejected,
/// so upstream vocabulary drift never loses data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TrialStatus {
    Recruiting,
    NotYetRecruiting,
    EnrollingByInvitation,
    ActiveNotRecruiting,
    Completed,
    Suspended,
    Terminated,
    Withdrawn,
    Unknown,
    Other(String),
}

impl TrialStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Recruiting => "RECRUITING",
            Self::NotYetRecruiting => "NOT_YET_RECRUITING",
            Self::EnrollingByInvitation => "ENROLLING_BY_INVITATION",
            Self::ActiveNotRecruiting => "ACTIVE_NOT_RECRUITING",
            Self::Completed => "COMPLETED",
            Self::Suspended => "SUSPENDED",
            Self::Terminated => "TERMINATED",
            Self::Withdrawn => "WITHDRAWN",
            Self::Unknown => "UNKNOWN",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for TrialStatus {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "RECRUITING" => Self::Recruiting,
            "NOT_YET_RECRUITING" => Self::NotYetRecruiting,
            "ENROLLING_BY_INVITATION" => Self::EnrollingByInvitation,
            "ACTIVE_NOT_RECRUITING" => Self::ActiveNotRecruiting,
            "COMPLETED" => Self::Completed,
            "SUSPENDED" => Self::Suspended,
            "TERMINATED" => Self::Terminated,
            "WITHDRAWN" => Self::Withdrawn,
            "UNKNOWN" => Self::Unknown,
            _ => Self::Other(s.to_owned()),
        }
    }
}

impl From<String> for TrialStatus {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<TrialStatus> for String {
    fn from(v: TrialStatus) -> Self {
        v.as_str().to_owned()
    }
}

/// Clinical phase of a trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Phase {
    EarlyPhase1,
    Phase1,
    Phase2,
    Phase3,
    Phase4,
    NotApplicable,
    Other(String),
}

impl Phase {
    pub fn as_str(&self) -> &str {
        match self {
            Self::EarlyPhase1 => "EARLY_PHASE_1",
            Self::Phase1 => "PHASE_1",
            Self::Phase2 => "PHASE_2",
            Self::Phase3 => "PHASE_3",
            Self::Phase4 => "PHASE_4",
            Self::NotApplicable => "NA",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for Phase {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "EARLY_PHASE_1" | "EARLY_PHASE1" => Self::EarlyPhase1,
            "PHASE_1" | "PHASE1" => Self::Phase1,
            "PHASE_2" | "PHASE2" => Self::Phase2,
            "PHASE_3" | "PHASE3" => Self::Phase3,
            "PHASE_4" | "PHASE4" => Self::Phase4,
            "NA" | "N/A" => Self::NotApplicable,
            _ => Self::Other(s.to_owned()),
        }
    }
}

impl From<String> for Phase {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<Phase> for String {
    fn from(v: Phase) -> Self {
        v.as_str().to_owned()
    }
}

/// Study design category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StudyType {
    Interventional,
    Observational,
    ExpandedAccess,
    Other(String),
}

impl StudyType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Interventional => "INTERVENTIONAL",
            Self::Observational => "OBSERVATIONAL",
            Self::ExpandedAccess => "EXPANDED_ACCESS",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for StudyType {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "INTERVENTIONAL" => Self::Interventional,
            "OBSERVATIONAL" => Self::Observational,
            "EXPANDED_ACCESS" => Self::ExpandedAccess,
            _ => Self::Other(s.to_owned()),
        }
    }
}

impl From<String> for StudyType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<StudyType> for String {
    fn from(v: StudyType) -> Self {
        v.as_str().to_owned()
    }
}

/// Whether an outcome measure is primary or secondary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutcomeType {
    Primary,
    Secondary,
    Other(String),
}

impl OutcomeType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Primary => "Primary",
            Self::Secondary => "Secondary",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for OutcomeType {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "primary" => Self::Primary,
            "secondary" => Self::Secondary,
            _ => Self::Other(s.to_owned()),
        }
    }
}

impl From<String> for OutcomeType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<OutcomeType> for String {
    fn from(v: OutcomeType) -> Self {
        v.as_str().to_owned()
    }
}

/// Role of a trial contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContactType {
    Primary,
    Backup,
    Official,
    Other(String),
}

impl ContactType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Primary => "Primary",
            Self::Backup => "Backup",
            Self::Official => "Official",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for ContactType {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "primary" => Self::Primary,
            "backup" => Self::Backup,
            "official" => Self::Official,
            _ => Self::Other(s.to_owned()),
        }
    }
}

impl From<String> for ContactType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<ContactType> for String {
    fn from(v: ContactType) -> Self {
        v.as_str().to_owned()
    }
}

/// One stored trial: the primary-table row.
///
/// `nct_id` is immutable once created; everything else may change on
/// re-ingestion. `updated_at` advances on every mutation of the aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trial {
    pub nct_id: String,
    pub protocol_section_id: Option<String>,
    pub organization_name: Option<String>,
    pub organization_type: Option<String>,
    pub brief_title: Option<String>,
    pub official_title: Option<String>,
    pub status: Option<TrialStatus>,
    pub phase: Option<Phase>,
    pub study_type: Option<StudyType>,
    pub enrollment_count: Option<i32>,
    pub enrollment_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub completion_date: Option<NaiveDate>,
    pub primary_completion_date: Option<NaiveDate>,
    pub is_fda_regulated_drug: Option<bool>,
    pub is_fda_regulated_device: Option<bool>,
    pub is_unapproved_device: Option<bool>,
    pub is_ppsd: Option<bool>,
    pub is_us_export: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Complete trial information as served by the `trial_complete_info` view:
/// the primary row joined with description and eligibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialDetail {
    pub nct_id: String,
    pub brief_title: Option<String>,
    pub official_title: Option<String>,
    pub status: Option<TrialStatus>,
    pub phase: Option<Phase>,
    pub study_type: Option<StudyType>,
    pub enrollment_count: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub completion_date: Option<NaiveDate>,
    pub organization_name: Option<String>,
    pub brief_summary: Option<String>,
    pub detailed_description: Option<String>,
    pub inclusion_criteria: Option<String>,
    pub exclusion_criteria: Option<String>,
    pub minimum_age: Option<String>,
    pub maximum_age: Option<String>,
    pub gender: Option<String>,
    pub healthy_volunteers: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compact search hit: enough to render a result list without a second query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialSummary {
    pub nct_id: String,
    pub brief_title: Option<String>,
    pub status: Option<TrialStatus>,
    pub phase: Option<Phase>,
    pub organization_name: Option<String>,
    pub start_date: Option<NaiveDate>,
    /// Relevance score for full-text hits; 1.0 for plain listings.
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_known_values_round_trip() {
        for s in [
            "RECRUITING",
            "NOT_YET_RECRUITING",
            "ENROLLING_BY_INVITATION",
            "ACTIVE_NOT_RECRUITING",
            "COMPLETED",
            "SUSPENDED",
            "TERMINATED",
            "WITHDRAWN",
            "UNKNOWN",
        ] {
            let status = TrialStatus::from(s);
            assert!(!matches!(status, TrialStatus::Other(_)), "{s} should be canonical");
            assert_eq!(status.as_str(), s);
        }
    }

    #[test]
    fn status_unknown_vocabulary_is_preserved_verbatim() {
        let status = TrialStatus::from("TEMPORARILY_PAUSED");
        assert_eq!(status, TrialStatus::Other("TEMPORARILY_PAUSED".to_owned()));
        assert_eq!(status.as_str(), "TEMPORARILY_PAUSED");
    }

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!(TrialStatus::from("recruiting"), TrialStatus::Recruiting);
    }

    #[test]
    fn phase_accepts_both_registry_spellings() {
        assert_eq!(Phase::from("PHASE_3"), Phase::Phase3);
        assert_eq!(Phase::from("PHASE3"), Phase::Phase3);
        assert_eq!(Phase::from("PHASE_3").as_str(), "PHASE_3");
    }

    #[test]
    fn enums_serialize_as_plain_strings() {
        let json = serde_json::to_string(&TrialStatus::Recruiting).unwrap();
        assert_eq!(json, r#""RECRUITING""#);
        let back: TrialStatus = serde_json::from_str(r#""PHASE_X""#).unwrap();
        assert_eq!(back, TrialStatus::Other("PHASE_X".to_owned()));
    }

    #[test]
    fn outcome_type_parses_original_labels() {
        assert_eq!(OutcomeType::from("Primary"), OutcomeType::Primary);
        assert_eq!(OutcomeType::from("secondary"), OutcomeType::Secondary);
    }
}

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RecordError, RecordResult};
use crate::trial::{ContactType, OutcomeType, Phase, StudyType, TrialStatus};

static NCT_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^NCT[0-9]{8}$").unwrap());

/// Free-text description block (1:0..1 with a trial).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Description {
    pub brief_summary: Option<String>,
    pub detailed_description: Option<String>,
}

/// Eligibility criteria block (1:0..1 with a trial).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Eligibility {
    pub inclusion_criteria: Option<String>,
    pub exclusion_criteria: Option<String>,
    pub minimum_age: Option<String>,
    pub maximum_age: Option<String>,
    pub gender: Option<String>,
    pub healthy_volunteers: Option<bool>,
}

/// One arm group / intervention pairing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArmIntervention {
    pub arm_group_label: Option<String>,
    pub arm_group_type: Option<String>,
    pub arm_group_description: Option<String>,
    pub intervention_name: Option<String>,
    pub intervention_type: Option<String>,
    pub intervention_description: Option<String>,
}

/// One outcome measure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub outcome_type: OutcomeType,
    pub measure: Option<String>,
    pub description: Option<String>,
    pub time_frame: Option<String>,
}

/// One study site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Location {
    pub facility_name: Option<String>,
    pub facility_address: Option<String>,
    pub facility_city: Option<String>,
    pub facility_state: Option<String>,
    pub facility_zip: Option<String>,
    pub facility_country: Option<String>,
    pub facility_contact_name: Option<String>,
    pub facility_contact_phone: Option<String>,
    pub facility_contact_email: Option<String>,
}

/// One trial-level contact person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub contact_type: ContactType,
    pub name: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// One standalone intervention (drug, device, procedure, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Intervention {
    pub name: Option<String>,
    pub intervention_type: Option<String>,
    pub description: Option<String>,
}

/// One denormalized trial record as received from the external fetch step.
///
/// `nct_id` is required; everything else is optional. Repeating groups are
/// `Option<Vec<_>>` so the write path can tell "not supplied, leave the
/// stored rows alone" (`None`) apart from "supplied empty, clear them"
/// (`Some(vec![])`).
///
/// Dates arrive as registry strings (`YYYY-MM-DD` or `YYYY-MM`); see
/// [`parse_partial_date`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrialRecord {
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
    pub start_date: Option<String>,
    pub completion_date: Option<String>,
    pub primary_completion_date: Option<String>,
    pub is_fda_regulated_drug: Option<bool>,
    pub is_fda_regulated_device: Option<bool>,
    pub is_unapproved_device: Option<bool>,
    pub is_ppsd: Option<bool>,
    pub is_us_export: Option<bool>,
    pub description: Option<Description>,
    pub eligibility: Option<Eligibility>,
    pub arms_interventions: Option<Vec<ArmIntervention>>,
    pub outcomes: Option<Vec<Outcome>>,
    pub locations: Option<Vec<Location>>,
    pub contacts: Option<Vec<Contact>>,
    pub conditions: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    pub interventions: Option<Vec<Intervention>>,
}

impl TrialRecord {
    /// Validate the record before any write: the identifier must be present
    /// and well-formed. Free-text field semantics are deliberately not
    /// checked here; that is the quality checker's job.
    pub fn validate(&self) -> RecordResult<()> {
        if self.nct_id.trim().is_empty() {
            return Err(RecordError::MissingField("nct_id"));
        }
        if !is_valid_nct_id(&self.nct_id) {
            return Err(RecordError::InvalidNctId(self.nct_id.clone()));
        }
        Ok(())
    }
}

/// Whether `id` matches the registry identifier shape (`NCT` + 8 digits).
pub fn is_valid_nct_id(id: &str) -> bool {
    NCT_ID_REGEX.is_match(id)
}

/// Parse a registry date string.
///
/// The registry sends either `YYYY-MM-DD` or `YYYY-MM` (month precision);
/// month-precision dates resolve to the first of the month. Anything else
/// yields `None`: unparsable dates are stored as null and surfaced later by
/// the format-quality checks, never a hard ingest failure.
pub fn parse_partial_date(s: &str) -> Option<NaiveDate> {
    match s.len() {
        10 => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
        7 => NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(nct_id: &str) -> TrialRecord {
        TrialRecord { nct_id: nct_id.to_owned(), ..TrialRecord::default() }
    }

    #[test]
    fn valid_nct_id_passes() {
        assert!(record("NCT00000001").validate().is_ok());
    }

    #[test]
    fn empty_nct_id_is_missing_field() {
        assert_eq!(record("").validate(), Err(RecordError::MissingField("nct_id")));
        assert_eq!(record("   ").validate(), Err(RecordError::MissingField("nct_id")));
    }

    #[test]
    fn malformed_nct_ids_are_rejected() {
        for bad in ["NCT1234567", "NCT123456789", "nct00000001", "00000001", "NCTABCDEFGH"] {
            assert!(
                matches!(record(bad).validate(), Err(RecordError::InvalidNctId(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn parse_full_date() {
        assert_eq!(
            parse_partial_date("2024-03-15"),
            Some(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        );
    }

    #[test]
    fn parse_month_precision_date() {
        assert_eq!(
            parse_partial_date("2024-03"),
            Some(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
    }

    #[test]
    fn garbage_dates_yield_none() {
        for bad in ["", "2024", "15/03/2024", "2024-13-01", "not a date"] {
            assert_eq!(parse_partial_date(bad), None, "{bad:?}");
        }
    }

    #[test]
    fn record_deserializes_from_flat_json() {
        let json = r#"{
            "nct_id": "NCT00000001",
            "brief_title": "T",
            "status": "RECRUITING",
            "phase": "PHASE_3",
            "conditions": ["Diabetes"],
            "keywords": ["diabetes", "phase3"]
        }"#;
        let rec: TrialRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.nct_id, "NCT00000001");
        assert_eq!(rec.status, Some(TrialStatus::Recruiting));
        assert_eq!(rec.phase, Some(Phase::Phase3));
        assert_eq!(rec.conditions.as_deref(), Some(&["Diabetes".to_owned()][..]));
        assert_eq!(rec.keywords.map(|k| k.len()), Some(2));
        assert!(rec.description.is_none());
    }
}

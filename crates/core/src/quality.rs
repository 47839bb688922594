//! Data-quality scoring.
//!
//! The storage layer runs the audit queries and returns raw findings
//! (offending trial identifiers per check); everything here is pure
//! arithmetic over those findings so the scoring rules are unit-testable
//! without a database.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Weight of each axis in the overall score. Documented contract: the
/// overall score is the weighted mean with these exact weights.
pub const COMPLETENESS_WEIGHT: f64 = 0.3;
pub const CONSISTENCY_WEIGHT: f64 = 0.3;
pub const FORMAT_WEIGHT: f64 = 0.2;
pub const RELATIONSHIP_WEIGHT: f64 = 0.2;

/// Result of one named audit check: which trials failed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckFinding {
    pub check: String,
    pub offenders: Vec<String>,
}

impl CheckFinding {
    pub fn new(check: impl Into<String>, offenders: Vec<String>) -> Self {
        Self { check: check.into(), offenders }
    }
}

/// Raw audit output for all four axes, as produced by the storage layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityFindings {
    pub total_trials: u64,
    pub completeness: Vec<CheckFinding>,
    pub consistency: Vec<CheckFinding>,
    pub format: Vec<CheckFinding>,
    pub relationship: Vec<CheckFinding>,
}

/// One scored axis: score in [0, 1] plus the distinct offending identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisScore {
    pub score: f64,
    pub offenders: Vec<String>,
    pub checks: Vec<CheckFinding>,
}

/// Coarse operator-facing grade derived from the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
    NoData,
}

impl QualityLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::Excellent
        } else if score >= 0.8 {
            Self::Good
        } else if score >= 0.7 {
            Self::Fair
        } else if score >= 0.6 {
            Self::Poor
        } else {
            Self::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::Critical => "Critical",
            Self::NoData => "No Data",
        }
    }
}

/// Full four-axis quality report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub generated_at: DateTime<Utc>,
    pub total_trials: u64,
    pub completeness: AxisScore,
    pub consistency: AxisScore,
    pub format: AxisScore,
    pub relationship: AxisScore,
    pub overall_score: f64,
    pub quality_level: QualityLevel,
    pub total_issues: u64,
}

/// Score one axis: `1 - distinct_offenders / total`, clamped to [0, 1].
///
/// Offenders are deduplicated across the axis's checks so one bad trial
/// failing three completeness checks counts once against the axis. With an
/// empty table the axis is vacuously perfect.
pub fn score_axis(checks: Vec<CheckFinding>, total_trials: u64) -> AxisScore {
    let distinct: BTreeSet<String> =
        checks.iter().flat_map(|c| c.offenders.iter().cloned()).collect();
    let score = if total_trials == 0 {
        1.0
    } else {
        (1.0 - distinct.len() as f64 / total_trials as f64).clamp(0.0, 1.0)
    };
    AxisScore { score, offenders: distinct.into_iter().collect(), checks }
}

/// Deterministic combined score: weighted mean of the four axis scores.
pub fn overall_score(
    completeness: f64,
    consistency: f64,
    format: f64,
    relationship: f64,
) -> f64 {
    completeness * COMPLETENESS_WEIGHT
        + consistency * CONSISTENCY_WEIGHT
        + format * FORMAT_WEIGHT
        + relationship * RELATIONSHIP_WEIGHT
}

impl QualityReport {
    /// Assemble a report from raw findings. Deterministic: the same findings
    /// always produce the same scores.
    pub fn from_findings(findings: QualityFindings, generated_at: DateTime<Utc>) -> Self {
        let total = findings.total_trials;
        let completeness = score_axis(findings.completeness, total);
        let consistency = score_axis(findings.consistency, total);
        let format = score_axis(findings.format, total);
        let relationship = score_axis(findings.relationship, total);
        let overall = overall_score(
            completeness.score,
            consistency.score,
            format.score,
            relationship.score,
        );
        let total_issues = [&completeness, &consistency, &format, &relationship]
            .iter()
            .map(|a| a.offenders.len() as u64)
            .sum();
        let quality_level = if total == 0 {
            QualityLevel::NoData
        } else {
            QualityLevel::from_score(overall)
        };
        Self {
            generated_at,
            total_trials: total,
            completeness,
            consistency,
            format,
            relationship,
            overall_score: overall,
            quality_level,
            total_issues,
        }
    }

    /// Plain-text rendering for operators.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let line = "=".repeat(60);
        out.push_str(&line);
        out.push_str("\nCLINICAL TRIALS DATABASE QUALITY REPORT\n");
        out.push_str(&line);
        out.push_str(&format!("\nGenerated: {}\n", self.generated_at.format("%Y-%m-%d %H:%M:%S")));
        out.push_str(&format!("Total trials: {}\n", self.total_trials));
        out.push_str(&format!(
            "Overall score: {:.2} ({})\n\n",
            self.overall_score,
            self.quality_level.as_str()
        ));
        for (name, axis) in [
            ("Completeness", &self.completeness),
            ("Consistency", &self.consistency),
            ("Format", &self.format),
            ("Relationships", &self.relationship),
        ] {
            out.push_str(&format!(
                "{name}: {:.2} ({} offending trials)\n",
                axis.score,
                axis.offenders.len()
            ));
            for check in &axis.checks {
                if !check.offenders.is_empty() {
                    out.push_str(&format!(
                        "  - {}: {} records\n",
                        check.check,
                        check.offenders.len()
                    ));
                }
            }
        }
        if self.total_issues == 0 {
            out.push_str("\nNo issues found.\n");
        }
        out.push_str(&line);
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn axis_score_dedupes_offenders_across_checks() {
        let axis = score_axis(
            vec![
                CheckFinding::new("missing_title", ids(&["NCT00000001", "NCT00000002"])),
                CheckFinding::new("missing_status", ids(&["NCT00000001"])),
            ],
            10,
        );
        assert_eq!(axis.offenders.len(), 2);
        assert!((axis.score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn axis_score_clamps_to_zero() {
        let offenders: Vec<String> = (1..=5).map(|i| format!("NCT0000000{i}")).collect();
        let axis = score_axis(vec![CheckFinding::new("all_bad", offenders)], 3);
        assert_eq!(axis.score, 0.0);
    }

    #[test]
    fn empty_table_scores_perfect() {
        let axis = score_axis(vec![CheckFinding::new("anything", vec![])], 0);
        assert_eq!(axis.score, 1.0);
    }

    #[test]
    fn completeness_is_monotonically_non_increasing() {
        // Fixed record set of 10 trials; nulling out required fields one
        // trial at a time may only lower (never raise) the axis score.
        let mut previous = f64::INFINITY;
        for nulled in 0..=10 {
            let offenders: Vec<String> = (0..nulled).map(|i| format!("NCT000000{i:02}")).collect();
            let axis = score_axis(vec![CheckFinding::new("missing_brief_title", offenders)], 10);
            assert!(axis.score <= previous, "score rose when nulling field #{nulled}");
            previous = axis.score;
        }
        assert_eq!(previous, 0.0);
    }

    #[test]
    fn overall_score_is_the_documented_weighted_mean() {
        let overall = overall_score(1.0, 0.5, 0.0, 1.0);
        assert!((overall - (0.3 + 0.15 + 0.0 + 0.2)).abs() < 1e-9);
    }

    #[test]
    fn quality_levels_match_thresholds() {
        assert_eq!(QualityLevel::from_score(0.95), QualityLevel::Excellent);
        assert_eq!(QualityLevel::from_score(0.9), QualityLevel::Excellent);
        assert_eq!(QualityLevel::from_score(0.85), QualityLevel::Good);
        assert_eq!(QualityLevel::from_score(0.75), QualityLevel::Fair);
        assert_eq!(QualityLevel::from_score(0.65), QualityLevel::Poor);
        assert_eq!(QualityLevel::from_score(0.2), QualityLevel::Critical);
    }

    #[test]
    fn report_from_findings_is_deterministic() {
        let findings = QualityFindings {
            total_trials: 4,
            completeness: vec![CheckFinding::new("missing_status", ids(&["NCT00000001"]))],
            consistency: vec![],
            format: vec![],
            relationship: vec![CheckFinding::new(
                "missing_conditions",
                ids(&["NCT00000002", "NCT00000003"]),
            )],
        };
        let now = Utc::now();
        let a = QualityReport::from_findings(findings.clone(), now);
        let b = QualityReport::from_findings(findings, now);
        assert_eq!(a.overall_score, b.overall_score);
        assert_eq!(a.total_issues, 3);
        assert!((a.completeness.score - 0.75).abs() < 1e-9);
        assert!((a.relationship.score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn empty_database_reports_no_data() {
        let report = QualityReport::from_findings(QualityFindings::default(), Utc::now());
        assert_eq!(report.quality_level, QualityLevel::NoData);
        assert_eq!(report.overall_score, 1.0);
    }

    #[test]
    fn text_report_mentions_failing_checks() {
        let findings = QualityFindings {
            total_trials: 2,
            completeness: vec![CheckFinding::new("missing_brief_title", ids(&["NCT00000009"]))],
            ..QualityFindings::default()
        };
        let text = QualityReport::from_findings(findings, Utc::now()).render_text();
        assert!(text.contains("missing_brief_title"));
        assert!(text.contains("Total trials: 2"));
    }
}

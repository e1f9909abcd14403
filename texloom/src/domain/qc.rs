//! QCReport: the verdict a QC analyzer returns for a block (spec.md §3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QcStatus {
    Passed,
    PartialSuccess,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Minor,
    Major,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    MathError,
    ClarityIssue,
    StyleMismatch,
    CoherenceIssue,
    PedagogicPitfall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub problem_type: ProblemType,
    pub severity: Severity,
    pub description: String,
    pub location: Option<String>,
    pub suggested_fix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QCReport {
    pub overall_score: f64,
    pub status: QcStatus,
    pub problems: Vec<Problem>,
}

impl QCReport {
    /// Enforce the invariant: any critical problem forces `status=failed`
    /// (spec.md §3). Call after constructing from a collaborator response.
    pub fn new(overall_score: f64, status: QcStatus, problems: Vec<Problem>) -> Self {
        let status = if problems.iter().any(|p| p.severity == Severity::Critical) {
            QcStatus::Failed
        } else {
            status
        };
        Self {
            overall_score,
            status,
            problems,
        }
    }

    pub fn has_critical_problem(&self) -> bool {
        self.problems.iter().any(|p| p.severity == Severity::Critical)
    }

    /// Whether this report clears autonomous auto-validation (spec.md §4.2 footnote).
    pub fn meets_validation_threshold(&self, threshold: f64) -> bool {
        self.overall_score >= threshold && !self.has_critical_problem()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_problem_forces_failed_status() {
        let report = QCReport::new(
            90.0,
            QcStatus::Passed,
            vec![Problem {
                problem_type: ProblemType::MathError,
                severity: Severity::Critical,
                description: "wrong sign".into(),
                location: None,
                suggested_fix: None,
            }],
        );
        assert_eq!(report.status, QcStatus::Failed);
    }

    #[test]
    fn meets_threshold_exactly_at_boundary() {
        let report = QCReport::new(70.0, QcStatus::Passed, vec![]);
        assert!(report.meets_validation_threshold(70.0));
    }

    #[test]
    fn just_below_threshold_fails() {
        let report = QCReport::new(69.999, QcStatus::Passed, vec![]);
        assert!(!report.meets_validation_threshold(70.0));
    }

    #[test]
    fn critical_problem_blocks_threshold_even_with_high_score() {
        let report = QCReport::new(
            99.0,
            QcStatus::Passed,
            vec![Problem {
                problem_type: ProblemType::MathError,
                severity: Severity::Critical,
                description: "x".into(),
                location: None,
                suggested_fix: None,
            }],
        );
        assert!(!report.meets_validation_threshold(70.0));
    }
}

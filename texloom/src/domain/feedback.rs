//! Feedback: immutable input referenced by refinement tasks (spec.md §3).

use serde::{Deserialize, Serialize};

use super::qc::QCReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackIntent {
    Redo,
    Clarify,
    Restyle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Feedback {
    User {
        text: String,
        location: Option<String>,
        intent: FeedbackIntent,
    },
    Qc {
        report: QCReport,
    },
}

impl Feedback {
    pub fn from_qc(report: QCReport) -> Self {
        Self::Qc { report }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::qc::QcStatus;

    #[test]
    fn qc_feedback_wraps_report() {
        let report = QCReport::new(40.0, QcStatus::Failed, vec![]);
        let feedback = Feedback::from_qc(report.clone());
        match feedback {
            Feedback::Qc { report: r } => assert_eq!(r.overall_score, report.overall_score),
            _ => panic!("expected Qc variant"),
        }
    }
}

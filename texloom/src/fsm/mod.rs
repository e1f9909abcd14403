//! Block FSM: the per-block transition table and its guard predicates
//! (spec.md §4.2).
//!
//! The FSM owns no state — it is a pure function from `(BlockStatus,
//! Event, mode, guard inputs)` to the next `BlockStatus`, instantiated
//! per-decision by the [`crate::driver`] from a loaded block record.

use crate::domain::{BlockStatus, ProjectMode, QCReport};
use crate::error::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    GenerateStarted,
    GenerateSuccess,
    GenerateFailed,
    QcStarted,
    QcPassed,
    QcFailed,
    RefinementStarted,
    RefinementSuccess,
    RefinementFailed,
    UserValidate,
    UserRedo,
    Archive,
    CriticalFail,
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::GenerateStarted => "generate_started",
            Self::GenerateSuccess => "generate_success",
            Self::GenerateFailed => "generate_failed",
            Self::QcStarted => "qc_started",
            Self::QcPassed => "qc_passed",
            Self::QcFailed => "qc_failed",
            Self::RefinementStarted => "refinement_started",
            Self::RefinementSuccess => "refinement_success",
            Self::RefinementFailed => "refinement_failed",
            Self::UserValidate => "user_validate",
            Self::UserRedo => "user_redo",
            Self::Archive => "archive",
            Self::CriticalFail => "critical_fail",
        };
        write!(f, "{s}")
    }
}

/// Extra context the mode-dependent `qc_passed` rewrite rule needs
/// (spec.md §4.2 footnote).
#[derive(Debug, Clone, Copy)]
pub struct QcPassedContext<'a> {
    pub report: &'a QCReport,
    pub validation_threshold: f64,
}

/// Resolve the raw transition table entry for `(from, event)`, without
/// applying the `qc_passed` mode rewrite. Returns `None` for forbidden
/// cells (spec.md §4.2 table).
fn raw_transition(from: BlockStatus, event: Event) -> Option<BlockStatus> {
    use BlockStatus::*;
    use Event::*;

    Some(match (from, event) {
        (PendingGeneration, GenerateStarted) => GenerationInProgress,
        (PendingGeneration, Archive) => Archived,
        (PendingGeneration, CriticalFail) => CriticalError,

        (GenerationInProgress, GenerateSuccess) => QcPending,
        (GenerationInProgress, GenerateFailed) => GenerationFailed,
        (GenerationInProgress, CriticalFail) => CriticalError,

        (GenerationFailed, Archive) => Archived,

        (QcPending, QcStarted) => QcInProgress,

        (QcInProgress, QcPassed) => BlockStatus::QcPassed,
        (QcInProgress, QcFailed) => BlockStatus::QcFailed,
        (QcInProgress, CriticalFail) => CriticalError,

        (BlockStatus::QcPassed, UserValidate) => Validated,
        (BlockStatus::QcPassed, UserRedo) => RefinementPending,
        (BlockStatus::QcPassed, Archive) => Archived,

        (BlockStatus::QcFailed, RefinementStarted) => RefinementInProgress,
        (BlockStatus::QcFailed, UserRedo) => RefinementPending,

        (RefinementPending, RefinementStarted) => RefinementInProgress,

        (RefinementInProgress, RefinementSuccess) => QcPending,
        (RefinementInProgress, RefinementFailed) => BlockStatus::RefinementFailed,
        (RefinementInProgress, CriticalFail) => CriticalError,

        (BlockStatus::RefinementFailed, Archive) => Archived,

        (PendingValidation, UserValidate) => Validated,
        (PendingValidation, UserRedo) => RefinementPending,

        (Validated, Archive) => Archived,

        _ => return None,
    })
}

/// Decide the next state for `(from, event)`, applying the mode-dependent
/// `qc_passed` rewrite rule (spec.md §4.2 footnote): in autonomous mode, a
/// raw `qc_passed` transition goes straight to `validated` when the report
/// clears the threshold with no critical problems, otherwise it is rewritten
/// to `qc_failed`. In supervised mode `qc_passed` always lands in
/// `pending_validation`.
pub fn apply_transition(
    from: BlockStatus,
    event: Event,
    mode: ProjectMode,
    qc_context: Option<QcPassedContext<'_>>,
) -> Result<BlockStatus, WorkflowError> {
    if event == Event::QcPassed {
        if raw_transition(from, Event::QcPassed).is_none() {
            return Err(WorkflowError::InvalidTransition(format!(
                "{event} is not legal from {from}"
            )));
        }
        return Ok(resolve_qc_passed(mode, qc_context));
    }

    raw_transition(from, event)
        .ok_or_else(|| WorkflowError::InvalidTransition(format!("{event} is not legal from {from}")))
}

fn resolve_qc_passed(mode: ProjectMode, qc_context: Option<QcPassedContext<'_>>) -> BlockStatus {
    match mode {
        ProjectMode::Supervised => BlockStatus::PendingValidation,
        ProjectMode::Autonomous => {
            let passes = qc_context
                .map(|ctx| ctx.report.meets_validation_threshold(ctx.validation_threshold))
                .unwrap_or(false);
            if passes {
                BlockStatus::Validated
            } else {
                BlockStatus::QcFailed
            }
        }
    }
}

/// Whether `event` is legal from `from` under `mode`, without committing
/// anything — used by Intake to validate user signals before driving.
pub fn is_legal(from: BlockStatus, event: Event, mode: ProjectMode, qc_context: Option<QcPassedContext<'_>>) -> bool {
    apply_transition(from, event, mode, qc_context).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{QcStatus, Severity};

    fn report(score: f64, critical: bool) -> QCReport {
        let problems = if critical {
            vec![crate::domain::Problem {
                problem_type: crate::domain::ProblemType::MathError,
                severity: Severity::Critical,
                description: "x".into(),
                location: None,
                suggested_fix: None,
            }]
        } else {
            vec![]
        };
        QCReport::new(score, QcStatus::Passed, problems)
    }

    #[test]
    fn forbidden_cell_is_invalid_transition() {
        let err = apply_transition(BlockStatus::GenerationInProgress, Event::UserRedo, ProjectMode::Supervised, None)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition(_)));
    }

    #[test]
    fn supervised_qc_passed_always_parks() {
        let next = apply_transition(
            BlockStatus::QcInProgress,
            Event::QcPassed,
            ProjectMode::Supervised,
            Some(QcPassedContext {
                report: &report(95.0, false),
                validation_threshold: 70.0,
            }),
        )
        .unwrap();
        assert_eq!(next, BlockStatus::PendingValidation);
    }

    #[test]
    fn autonomous_qc_passed_above_threshold_validates() {
        let next = apply_transition(
            BlockStatus::QcInProgress,
            Event::QcPassed,
            ProjectMode::Autonomous,
            Some(QcPassedContext {
                report: &report(70.0, false),
                validation_threshold: 70.0,
            }),
        )
        .unwrap();
        assert_eq!(next, BlockStatus::Validated);
    }

    #[test]
    fn autonomous_qc_passed_below_threshold_rewrites_to_qc_failed() {
        let next = apply_transition(
            BlockStatus::QcInProgress,
            Event::QcPassed,
            ProjectMode::Autonomous,
            Some(QcPassedContext {
                report: &report(69.999, false),
                validation_threshold: 70.0,
            }),
        )
        .unwrap();
        assert_eq!(next, BlockStatus::QcFailed);
    }

    #[test]
    fn autonomous_qc_passed_with_critical_problem_rewrites_despite_high_score() {
        let next = apply_transition(
            BlockStatus::QcInProgress,
            Event::QcPassed,
            ProjectMode::Autonomous,
            Some(QcPassedContext {
                report: &report(99.0, true),
                validation_threshold: 70.0,
            }),
        )
        .unwrap();
        assert_eq!(next, BlockStatus::QcFailed);
    }

    #[test]
    fn user_redo_from_qc_failed_parks_in_refinement_pending() {
        let next =
            apply_transition(BlockStatus::QcFailed, Event::UserRedo, ProjectMode::Supervised, None).unwrap();
        assert_eq!(next, BlockStatus::RefinementPending);
    }

    #[test]
    fn full_happy_path_chain() {
        let mode = ProjectMode::Autonomous;
        let mut state = BlockStatus::PendingGeneration;
        state = apply_transition(state, Event::GenerateStarted, mode, None).unwrap();
        assert_eq!(state, BlockStatus::GenerationInProgress);
        state = apply_transition(state, Event::GenerateSuccess, mode, None).unwrap();
        assert_eq!(state, BlockStatus::QcPending);
        state = apply_transition(state, Event::QcStarted, mode, None).unwrap();
        assert_eq!(state, BlockStatus::QcInProgress);
        let ctx = QcPassedContext {
            report: &report(95.0, false),
            validation_threshold: 70.0,
        };
        state = apply_transition(state, Event::QcPassed, mode, Some(ctx)).unwrap();
        assert_eq!(state, BlockStatus::Validated);
    }

    #[test]
    fn archive_reachable_from_every_documented_source_state() {
        for state in [
            BlockStatus::PendingGeneration,
            BlockStatus::GenerationFailed,
            BlockStatus::QcPassed,
            BlockStatus::RefinementFailed,
            BlockStatus::Validated,
        ] {
            assert!(is_legal(state, Event::Archive, ProjectMode::Supervised, None));
        }
    }
}

//! Mode Policies (E): decide what side effects follow an FSM transition
//! (spec.md §4.5). The FSM itself only computes the next state; policies
//! are pure functions of the transition outcome plus a little config
//! (thresholds, retry caps) and never touch the store directly.

mod planner;

pub use planner::{plan_next, PlannerOutcome};

use crate::domain::{Feedback, ProjectMode, TaskParameters, TaskPriority, TaskType};
use crate::fsm::Event;

/// What the Driver should do after committing a transition.
#[derive(Debug, Clone)]
pub enum SideEffect {
    /// Submit a task to the dispatcher.
    EnqueueTask {
        parameters: TaskParameters,
        priority: TaskPriority,
    },
    /// Create a refinement block for `predecessor_block_id` (archiving it)
    /// and enqueue `refine_block` against the new block.
    StartRefinement {
        predecessor_block_id: String,
        feedback: Feedback,
    },
    /// Refinement attempts are exhausted: drive the block straight through
    /// to `refinement_failed` and let the planner move on to the next slot.
    ExhaustRefinement,
    /// Ask the planner for the next slot in `version_id` and, if one
    /// remains, enqueue `generate_block` for it; otherwise enqueue
    /// `assemble_document`.
    AdvancePlanner { version_id: String },
    /// Mark the owning project `needs_manual_review`.
    MarkNeedsManualReview,
}

/// Everything a policy needs to decide the side effects of one committed
/// transition. Built by the Driver after the FSM has resolved `to`.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub event: Event,
    pub to: crate::domain::BlockStatus,
    pub block_id: String,
    pub version_id: String,
    pub refinement_attempts: u32,
    /// Present on user_redo / worker-driven refinement requests.
    pub feedback: Option<Feedback>,
}

fn enqueue(task_type_parameters: TaskParameters) -> SideEffect {
    SideEffect::EnqueueTask {
        priority: default_priority(task_type_parameters.task_type()),
        parameters: task_type_parameters,
    }
}

pub(crate) fn default_priority(task_type: TaskType) -> TaskPriority {
    match task_type {
        TaskType::ExportDocument => TaskPriority::new(8),
        TaskType::AssembleDocument => TaskPriority::new(7),
        TaskType::RunQc => TaskPriority::new(6),
        TaskType::RefineBlock => TaskPriority::new(6),
        TaskType::GenerateBlock => TaskPriority::new(5),
    }
}

pub trait ModePolicy: Send + Sync {
    fn mode(&self) -> ProjectMode;

    /// Side effects to schedule after `outcome.to` has been committed.
    fn side_effects(&self, outcome: &TransitionOutcome) -> Vec<SideEffect>;
}

/// Parks on `qc_passed`/`qc_failed`, awaiting an explicit user signal
/// (spec.md §4.5).
pub struct SupervisedPolicy;

impl ModePolicy for SupervisedPolicy {
    fn mode(&self) -> ProjectMode {
        ProjectMode::Supervised
    }

    fn side_effects(&self, outcome: &TransitionOutcome) -> Vec<SideEffect> {
        use crate::domain::BlockStatus::*;

        match (outcome.event, outcome.to) {
            (Event::GenerateSuccess, QcPending) => vec![enqueue(TaskParameters::RunQc {
                block_id: outcome.block_id.clone(),
            })],
            (Event::UserRedo, RefinementPending) => vec![SideEffect::StartRefinement {
                predecessor_block_id: outcome.block_id.clone(),
                feedback: outcome
                    .feedback
                    .clone()
                    .expect("user_redo side effect requires feedback"),
            }],
            // qc_passed parks in pending_validation, qc_failed parks as-is:
            // both await an explicit user_validate/user_redo signal.
            _ => vec![],
        }
    }
}

/// Auto-advances via QC score threshold and the planner (spec.md §4.5).
pub struct AutonomousPolicy {
    pub validation_threshold: f64,
    pub max_refinement_attempts: u32,
}

impl Default for AutonomousPolicy {
    fn default() -> Self {
        Self {
            validation_threshold: 70.0,
            max_refinement_attempts: 5,
        }
    }
}

impl ModePolicy for AutonomousPolicy {
    fn mode(&self) -> ProjectMode {
        ProjectMode::Autonomous
    }

    fn side_effects(&self, outcome: &TransitionOutcome) -> Vec<SideEffect> {
        use crate::domain::BlockStatus::*;

        match (outcome.event, outcome.to) {
            (Event::GenerateSuccess, QcPending) => vec![enqueue(TaskParameters::RunQc {
                block_id: outcome.block_id.clone(),
            })],

            (Event::QcPassed, Validated) => vec![SideEffect::AdvancePlanner {
                version_id: outcome.version_id.clone(),
            }],

            // The FSM already folded a below-threshold qc_passed into
            // qc_failed; both that and a genuine qc_failed from the
            // analyzer take the same refine-or-exhaust branch.
            (Event::QcPassed, QcFailed) | (Event::QcFailed, QcFailed) => {
                if outcome.refinement_attempts < self.max_refinement_attempts {
                    vec![SideEffect::StartRefinement {
                        predecessor_block_id: outcome.block_id.clone(),
                        feedback: outcome
                            .feedback
                            .clone()
                            .expect("qc_failed side effect requires QC feedback"),
                    }]
                } else {
                    vec![SideEffect::ExhaustRefinement]
                }
            }

            (Event::RefinementFailed, RefinementFailed) => vec![
                SideEffect::MarkNeedsManualReview,
                SideEffect::AdvancePlanner {
                    version_id: outcome.version_id.clone(),
                },
            ],

            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlockStatus, QCReport, QcStatus};

    fn outcome(event: Event, to: BlockStatus, attempts: u32, feedback: Option<Feedback>) -> TransitionOutcome {
        TransitionOutcome {
            event,
            to,
            block_id: "b1".into(),
            version_id: "v1".into(),
            refinement_attempts: attempts,
            feedback,
        }
    }

    fn qc_feedback() -> Feedback {
        Feedback::from_qc(QCReport::new(40.0, QcStatus::Failed, vec![]))
    }

    #[test]
    fn supervised_parks_on_qc_passed() {
        let policy = SupervisedPolicy;
        let effects = policy.side_effects(&outcome(Event::QcPassed, BlockStatus::PendingValidation, 0, None));
        assert!(effects.is_empty());
    }

    #[test]
    fn supervised_enqueues_qc_after_generate() {
        let policy = SupervisedPolicy;
        let effects = policy.side_effects(&outcome(Event::GenerateSuccess, BlockStatus::QcPending, 0, None));
        assert_eq!(effects.len(), 1);
        assert!(matches!(effects[0], SideEffect::EnqueueTask { .. }));
    }

    #[test]
    fn autonomous_advances_planner_on_validated() {
        let policy = AutonomousPolicy::default();
        let effects = policy.side_effects(&outcome(Event::QcPassed, BlockStatus::Validated, 0, None));
        assert!(matches!(effects[0], SideEffect::AdvancePlanner { .. }));
    }

    #[test]
    fn autonomous_refines_when_attempts_remain() {
        let policy = AutonomousPolicy::default();
        let effects = policy.side_effects(&outcome(
            Event::QcFailed,
            BlockStatus::QcFailed,
            2,
            Some(qc_feedback()),
        ));
        assert!(matches!(effects[0], SideEffect::StartRefinement { .. }));
    }

    #[test]
    fn autonomous_exhausts_at_cap() {
        let policy = AutonomousPolicy::default();
        let effects = policy.side_effects(&outcome(
            Event::QcFailed,
            BlockStatus::QcFailed,
            5,
            Some(qc_feedback()),
        ));
        assert!(matches!(effects[0], SideEffect::ExhaustRefinement));
    }
}

//! Workflow Driver (D, spec.md §4.4): the only component allowed to mutate
//! blocks and projects. One-shot, stateless: every call loads its own state,
//! commits one block transition under optimistic concurrency, and dispatches
//! whatever follow-up work the active mode policy asks for.

use tracing::{debug, warn};

use crate::domain::{
    BlockStatus, ContentBlock, Feedback, Project, ProjectMode, ProjectStatus, QCReport, TaskParameters, WorkflowTask,
};
use crate::dispatcher::DispatcherHandle;
use crate::error::{WorkflowError, WorkflowResult};
use crate::fsm::{self, Event, QcPassedContext};
use crate::policy::{self, AutonomousPolicy, ModePolicy, PlannerOutcome, SideEffect, SupervisedPolicy, TransitionOutcome};
use crate::state_store::StateStoreHandle;

/// Content the caller attaches to an event, when the event itself carries a
/// result that mutates block fields (spec.md §4.4 step 5).
#[derive(Debug, Clone)]
pub enum EventPayload {
    None,
    Generated {
        content: String,
        source_llm: Option<String>,
    },
    QcResult {
        report: QCReport,
    },
    UserFeedback {
        feedback: Feedback,
    },
    Failed {
        error_message: String,
    },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub validation_threshold: f64,
    pub max_refinement_attempts: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            validation_threshold: 70.0,
            max_refinement_attempts: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DriveOutcome {
    pub block_id: String,
    pub to: BlockStatus,
    pub side_effects_applied: usize,
}

pub struct Driver {
    store: StateStoreHandle,
    dispatcher: DispatcherHandle,
    config: DriverConfig,
}

impl Driver {
    pub fn new(store: StateStoreHandle, dispatcher: DispatcherHandle, config: DriverConfig) -> Self {
        Self { store, dispatcher, config }
    }

    fn policy_for(&self, mode: ProjectMode) -> Box<dyn ModePolicy> {
        match mode {
            ProjectMode::Supervised => Box::new(SupervisedPolicy),
            ProjectMode::Autonomous => Box::new(AutonomousPolicy {
                validation_threshold: self.config.validation_threshold,
                max_refinement_attempts: self.config.max_refinement_attempts,
            }),
        }
    }

    /// Advance `block_id` within `project_id` by `event`. Retries once on a
    /// stale_update conflict by reloading and recomputing the whole step
    /// (spec.md §4.4 step 6); a second conflict aborts with `conflict`.
    pub async fn drive(
        &self,
        project_id: &str,
        block_id: &str,
        event: Event,
        payload: EventPayload,
    ) -> WorkflowResult<DriveOutcome> {
        match self.try_drive(project_id, block_id, event, payload.clone()).await {
            Err(WorkflowError::Conflict(msg)) => {
                debug!(%project_id, %block_id, %msg, "stale_update, retrying once");
                self.try_drive(project_id, block_id, event, payload).await
            }
            other => other,
        }
    }

    async fn try_drive(
        &self,
        project_id: &str,
        block_id: &str,
        event: Event,
        payload: EventPayload,
    ) -> WorkflowResult<DriveOutcome> {
        // 1. Load project and block.
        let project = self.store.get_project(project_id).await?;
        let stored_block = self.store.get_block(block_id).await?;
        let (mut block, block_version) = (stored_block.value, stored_block.version);

        // 2. Reject if the project is terminal or cancelled.
        if project.value.status.is_terminal() || project.value.is_cancelled() {
            return Err(WorkflowError::InvalidTransition(format!(
                "project {project_id} is in terminal state {}",
                project.value.status
            )));
        }

        // 3. Select mode policy.
        let mode = project.value.mode;
        let mode_policy = self.policy_for(mode);

        // 4. Ask the FSM whether the event is legal, applying the
        // mode-dependent qc_passed rewrite.
        let qc_ctx = match &payload {
            EventPayload::QcResult { report } => Some(QcPassedContext {
                report,
                validation_threshold: self.config.validation_threshold,
            }),
            _ => None,
        };
        let to = fsm::apply_transition(block.status, event, mode, qc_ctx)?;

        // 5. Apply any content-mutating result to the block.
        apply_payload(&mut block, &payload);
        block.status = to;
        block.updated_at = texloom_store::now_ms();

        // 6. Commit with optimistic concurrency.
        let new_version = self.store.update_block(block.clone(), block_version).await?;
        debug!(%block_id, %event, to = %to, "block transition committed");

        // 7. Ask the mode policy for side effects and submit them.
        let outcome = TransitionOutcome {
            event,
            to,
            block_id: block.id.clone(),
            version_id: block.version_id.clone(),
            refinement_attempts: block.refinement_attempts,
            feedback: payload_feedback(&payload, &block),
        };
        let effects = mode_policy.side_effects(&outcome);
        let applied = effects.len();
        for effect in effects {
            self.apply_side_effect(&project.value, &block, new_version, effect).await?;
        }

        // 8. Evaluate project-level progress.
        self.evaluate_project_progress(project_id, &block.version_id).await?;

        Ok(DriveOutcome {
            block_id: block.id,
            to,
            side_effects_applied: applied,
        })
    }

    async fn apply_side_effect(
        &self,
        project: &Project,
        committed_block: &ContentBlock,
        committed_version: u64,
        effect: SideEffect,
    ) -> WorkflowResult<()> {
        match effect {
            SideEffect::EnqueueTask { parameters, priority } => {
                let task = WorkflowTask::new(&project.id, parameters, priority, committed_block.refinement_attempts);
                self.dispatcher.submit(task).await?;
            }
            SideEffect::StartRefinement {
                predecessor_block_id,
                feedback,
            } => {
                self.start_refinement(project, committed_block, committed_version, predecessor_block_id, feedback)
                    .await?;
            }
            SideEffect::ExhaustRefinement => {
                self.exhaust_refinement(committed_block.id.clone(), committed_version).await?;
            }
            SideEffect::AdvancePlanner { version_id } => {
                self.advance_planner(&project.id, &version_id).await?;
            }
            SideEffect::MarkNeedsManualReview => {
                self.mark_needs_manual_review(project).await?;
            }
        }
        Ok(())
    }

    /// Create the successor block, retarget the structural slot, and
    /// archive the predecessor. The predecessor's archival here is a
    /// structural supersession, not a normal FSM lifecycle event: `archive`
    /// is not a legal event from `qc_failed`/`refinement_pending`
    /// (spec.md §4.2 table), so it is written directly rather than routed
    /// through `apply_transition`.
    async fn start_refinement(
        &self,
        project: &Project,
        predecessor: &ContentBlock,
        predecessor_version: u64,
        predecessor_block_id: String,
        feedback: Feedback,
    ) -> WorkflowResult<()> {
        debug_assert_eq!(predecessor.id, predecessor_block_id);

        let new_block = predecessor.next_refinement();
        self.store.create_block(new_block.clone()).await?;

        let mut version = self.store.get_version(&predecessor.version_id).await?;
        version.value.content_structure.retarget_slot(&new_block.slot_id, &new_block.id);
        self.store.update_version(version.value, version.version).await?;

        let mut archived = predecessor.clone();
        archived.status = BlockStatus::Archived;
        archived.updated_at = texloom_store::now_ms();
        self.store.update_block(archived, predecessor_version).await?;

        let task = WorkflowTask::new(
            &project.id,
            TaskParameters::RefineBlock {
                predecessor_block_id,
                new_block_id: new_block.id,
                feedback,
            },
            policy::default_priority(crate::domain::TaskType::RefineBlock),
            new_block.refinement_attempts,
        );
        self.dispatcher.submit(task).await?;
        Ok(())
    }

    /// Drive a block from `qc_failed` to `refinement_failed` by chaining the
    /// two legal transitions `refinement_started` then `refinement_failed`
    /// (spec.md §4.2 has no direct `qc_failed -> refinement_failed` cell;
    /// "attempts exhausted" in §4.5 is interpreted as this synthetic chain).
    async fn exhaust_refinement(&self, block_id: String, _committed_version: u64) -> WorkflowResult<()> {
        let stored = self.store.get_block(&block_id).await?;
        let mode = ProjectMode::Autonomous;
        let mut version = stored.version;

        let mut block = stored.value;
        block.status = fsm::apply_transition(block.status, Event::RefinementStarted, mode, None)?;
        block.updated_at = texloom_store::now_ms();
        version = self.store.update_block(block.clone(), version).await?;

        block.status = fsm::apply_transition(block.status, Event::RefinementFailed, mode, None)?;
        block.updated_at = texloom_store::now_ms();
        self.store.update_block(block, version).await?;
        Ok(())
    }

    async fn advance_planner(&self, project_id: &str, version_id: &str) -> WorkflowResult<()> {
        let version = self.store.get_version(version_id).await?;
        let blocks = self.store.list_blocks_by_version(version_id, None).await?;
        let statuses = blocks.iter().map(|b| (b.value.id.clone(), b.value.status)).collect();

        match policy::plan_next(&version.value.content_structure, &statuses) {
            PlannerOutcome::Next { slot_id, block_id } => {
                let task = WorkflowTask::new(
                    project_id,
                    TaskParameters::GenerateBlock {
                        block_id,
                        slot_id,
                        feedback: None,
                    },
                    policy::default_priority(crate::domain::TaskType::GenerateBlock),
                    0,
                );
                self.dispatcher.submit(task).await?;
            }
            PlannerOutcome::Complete => {
                let task = WorkflowTask::new(
                    project_id,
                    TaskParameters::AssembleDocument {
                        version_id: version_id.to_string(),
                    },
                    policy::default_priority(crate::domain::TaskType::AssembleDocument),
                    0,
                );
                self.dispatcher.submit(task).await?;
            }
        }
        Ok(())
    }

    async fn mark_needs_manual_review(&self, project: &Project) -> WorkflowResult<()> {
        let stored = self.store.get_project(&project.id).await?;
        let mut p = stored.value;
        if p.status.is_terminal() {
            return Ok(());
        }
        p.status = ProjectStatus::NeedsManualReview;
        p.updated_at = texloom_store::now_ms();
        self.store.update_project(p, stored.version).await?;
        Ok(())
    }

    /// Step 8 of spec.md §4.4: if every block of `version_id` is terminal,
    /// trigger assembly, or mark the project needing manual review if any
    /// block ended in `refinement_failed`. Idempotent: the dispatcher
    /// collapses a duplicate `assemble_document` submission by idempotency key.
    pub(crate) async fn evaluate_project_progress(&self, project_id: &str, version_id: &str) -> WorkflowResult<()> {
        let blocks = self.store.list_blocks_by_version(version_id, None).await?;
        if blocks.is_empty() || !blocks.iter().all(|b| b.value.status.is_terminal()) {
            return Ok(());
        }

        let has_failure = blocks.iter().any(|b| b.value.status == BlockStatus::RefinementFailed);
        if has_failure {
            let stored = self.store.get_project(project_id).await?;
            self.mark_needs_manual_review(&stored.value).await?;
            return Ok(());
        }

        let task = WorkflowTask::new(
            project_id,
            TaskParameters::AssembleDocument {
                version_id: version_id.to_string(),
            },
            policy::default_priority(crate::domain::TaskType::AssembleDocument),
            0,
        );
        if let Err(e) = self.dispatcher.submit(task).await {
            warn!(%project_id, %version_id, error = %e, "failed to submit assemble_document on project progress check");
        }
        Ok(())
    }

    /// Cancel a project: all of its pending tasks are marked cancelled at
    /// claim time by the store; in-progress tasks run to completion but
    /// their results are discarded by Intake (spec.md §4.3).
    pub async fn cancel_project(&self, project_id: &str) -> WorkflowResult<()> {
        let stored = self.store.get_project(project_id).await?;
        if stored.value.status.is_terminal() {
            return Ok(());
        }
        let mut project = stored.value;
        project.status = ProjectStatus::Cancelled;
        project.updated_at = texloom_store::now_ms();
        self.store.update_project(project, stored.version).await?;
        Ok(())
    }
}

fn apply_payload(block: &mut ContentBlock, payload: &EventPayload) {
    match payload {
        EventPayload::Generated { content, source_llm } => {
            block.content = content.clone();
            block.source_llm = source_llm.clone();
            block.error_message = None;
        }
        EventPayload::QcResult { report } => {
            block.qc_report = Some(report.clone());
            block.error_message = None;
        }
        EventPayload::Failed { error_message } => {
            block.error_message = Some(error_message.clone());
        }
        EventPayload::UserFeedback { .. } | EventPayload::None => {}
    }
}

fn payload_feedback(payload: &EventPayload, block: &ContentBlock) -> Option<Feedback> {
    match payload {
        EventPayload::UserFeedback { feedback } => Some(feedback.clone()),
        EventPayload::QcResult { report } => Some(Feedback::from_qc(report.clone())),
        _ => block.qc_report.clone().map(Feedback::from_qc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{self, DispatcherConfig};
    use crate::domain::{BlockType, ContentBlock, ContentStructure, DocumentVersion, ProjectMode, QcStatus};
    use crate::state_store;
    use tempfile::tempdir;

    async fn harness() -> (Driver, StateStoreHandle) {
        let dir = tempdir().unwrap();
        let raw = texloom_store::Store::open(dir.path().join("db")).unwrap();
        let store = state_store::spawn(raw, 16);
        let dispatcher = dispatcher::spawn(store.clone(), DispatcherConfig::default());
        let driver = Driver::new(store.clone(), dispatcher, DriverConfig::default());
        (driver, store)
    }

    async fn seed_project(store: &StateStoreHandle, mode: ProjectMode) -> (Project, ContentBlock) {
        let project = Project::new("alice", "Topology", "topology", "undergrad", "terse", mode);
        store.create_project(project.clone()).await.unwrap();

        let block = ContentBlock::new("v1", "ch1-s1-b1", BlockType::Definition);
        let structure = ContentStructure {
            chapters: vec![crate::domain::Chapter {
                slot_id: "ch1".into(),
                title: "Intro".into(),
                sections: vec![crate::domain::Section {
                    slot_id: "ch1-s1".into(),
                    title: "Motivation".into(),
                    blocks: vec![crate::domain::BlockRef {
                        slot_id: "ch1-s1-b1".into(),
                        block_id: block.id.clone(),
                        block_type: BlockType::Definition,
                    }],
                }],
            }],
        };
        let mut version = DocumentVersion::new(&project.id, 1, structure);
        version.id = "v1".into();
        store.create_version(version).await.unwrap();
        store.create_block(block.clone()).await.unwrap();
        (project, block)
    }

    #[tokio::test]
    async fn autonomous_qc_passed_validates_and_advances_planner() {
        let (driver, store) = harness().await;
        let (project, block) = seed_project(&store, ProjectMode::Autonomous).await;

        driver
            .drive(&project.id, &block.id, Event::GenerateStarted, EventPayload::None)
            .await
            .unwrap();
        driver
            .drive(
                &project.id,
                &block.id,
                Event::GenerateSuccess,
                EventPayload::Generated {
                    content: "Let $X$ be a topological space.".into(),
                    source_llm: Some("gpt".into()),
                },
            )
            .await
            .unwrap();
        driver
            .drive(&project.id, &block.id, Event::QcStarted, EventPayload::None)
            .await
            .unwrap();

        let report = QCReport::new(95.0, QcStatus::Passed, vec![]);
        let outcome = driver
            .drive(&project.id, &block.id, Event::QcPassed, EventPayload::QcResult { report })
            .await
            .unwrap();

        assert_eq!(outcome.to, BlockStatus::Validated);
        let final_block = store.get_block(&block.id).await.unwrap();
        assert_eq!(final_block.value.status, BlockStatus::Validated);
    }

    #[tokio::test]
    async fn supervised_qc_passed_parks_without_enqueueing() {
        let (driver, store) = harness().await;
        let (project, block) = seed_project(&store, ProjectMode::Supervised).await;

        driver
            .drive(&project.id, &block.id, Event::GenerateStarted, EventPayload::None)
            .await
            .unwrap();
        driver
            .drive(
                &project.id,
                &block.id,
                Event::GenerateSuccess,
                EventPayload::Generated {
                    content: "content".into(),
                    source_llm: None,
                },
            )
            .await
            .unwrap();
        driver
            .drive(&project.id, &block.id, Event::QcStarted, EventPayload::None)
            .await
            .unwrap();

        let report = QCReport::new(85.0, QcStatus::Passed, vec![]);
        let outcome = driver
            .drive(&project.id, &block.id, Event::QcPassed, EventPayload::QcResult { report })
            .await
            .unwrap();

        assert_eq!(outcome.to, BlockStatus::PendingValidation);
        assert_eq!(outcome.side_effects_applied, 0);
    }

    #[tokio::test]
    async fn invalid_signal_is_rejected() {
        let (driver, store) = harness().await;
        let (project, block) = seed_project(&store, ProjectMode::Supervised).await;

        let err = driver
            .drive(&project.id, &block.id, Event::UserRedo, EventPayload::None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn cancelled_project_rejects_further_events() {
        let (driver, store) = harness().await;
        let (project, block) = seed_project(&store, ProjectMode::Supervised).await;
        driver.cancel_project(&project.id).await.unwrap();

        let err = driver
            .drive(&project.id, &block.id, Event::GenerateStarted, EventPayload::None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition(_)));
    }
}

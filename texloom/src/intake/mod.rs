//! Signal/Result Intake (F, spec.md §4.6): the two entry points external
//! callers use — user signals from the gateway (§6.1) and task completions
//! from workers. Both are idempotent on `(source, source_id)`: a duplicate
//! delivery returns the prior receipt without re-driving the FSM.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{
    BlockType, Chapter, ContentBlock, Feedback, IntakeReceipt, QCReport, ReceiptOutcome, Section, TaskOutcome,
    TaskParameters,
};
use crate::dispatcher::{DispatcherHandle, RetryDecision};
use crate::driver::{Driver, EventPayload};
use crate::error::{WorkflowError, WorkflowResult};
use crate::fsm::Event;
use crate::policy;
use crate::state_store::StateStoreHandle;

/// The signal vocabulary of `POST project_signal` (spec.md §6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserSignal {
    Validated,
    Redo,
    AddElement,
    QcOk,
    ProblemDetected,
    AllApproved,
    CancelProject,
}

/// Parameters for `add_element`: where in the document tree to graft a new
/// structural slot and block (not detailed by spec.md beyond the signal
/// name; resolved here as appending a block to an existing or newly named
/// chapter/section, per DESIGN.md).
#[derive(Debug, Clone)]
pub struct NewElementSpec {
    pub chapter_slot_id: String,
    pub chapter_title: String,
    pub section_slot_id: String,
    pub section_title: String,
    pub slot_id: String,
    pub block_type: BlockType,
}

#[derive(Debug, Clone)]
pub struct UserSignalRequest {
    /// De-duplication identity for this delivery (spec.md §4.6).
    pub client_id: String,
    pub project_id: String,
    pub version_id: Option<String>,
    pub block_id: Option<String>,
    pub signal: UserSignal,
    pub feedback: Option<Feedback>,
    pub qc_report: Option<QCReport>,
    pub new_element: Option<NewElementSpec>,
}

pub struct Intake {
    store: StateStoreHandle,
    dispatcher: DispatcherHandle,
    driver: Driver,
}

impl Intake {
    pub fn new(store: StateStoreHandle, dispatcher: DispatcherHandle, driver: Driver) -> Self {
        Self { store, dispatcher, driver }
    }

    /// Apply a user signal, deduplicating on `client_id` (spec.md §4.6).
    /// Invalid signals return a structured `invalid_transition` error, not
    /// a silent no-op.
    pub async fn submit_user_signal(&self, req: UserSignalRequest) -> WorkflowResult<IntakeReceipt> {
        let dedup_key = IntakeReceipt::key("user_signal", &req.client_id);
        if let Some(existing) = self.store.get_receipt(&dedup_key).await? {
            debug!(%dedup_key, "duplicate user signal, returning prior receipt");
            return Ok(existing);
        }

        let result = self.apply_user_signal(&req).await;
        self.record_receipt(dedup_key, result).await
    }

    async fn apply_user_signal(&self, req: &UserSignalRequest) -> WorkflowResult<()> {
        match req.signal {
            UserSignal::CancelProject => self.driver.cancel_project(&req.project_id).await,

            UserSignal::AllApproved => {
                let version_id = req
                    .version_id
                    .as_deref()
                    .ok_or_else(|| WorkflowError::InvalidTransition("all_approved requires version_id".into()))?;
                let task = crate::domain::WorkflowTask::new(
                    &req.project_id,
                    TaskParameters::AssembleDocument {
                        version_id: version_id.to_string(),
                    },
                    policy::default_priority(crate::domain::TaskType::AssembleDocument),
                    0,
                );
                self.dispatcher.submit(task).await.map(|_| ())
            }

            UserSignal::AddElement => {
                let spec = req
                    .new_element
                    .as_ref()
                    .ok_or_else(|| WorkflowError::InvalidTransition("add_element requires new_element".into()))?;
                let version_id = req
                    .version_id
                    .as_deref()
                    .ok_or_else(|| WorkflowError::InvalidTransition("add_element requires version_id".into()))?;
                self.add_element(&req.project_id, version_id, spec).await
            }

            UserSignal::Validated | UserSignal::Redo | UserSignal::QcOk | UserSignal::ProblemDetected => {
                let block_id = req
                    .block_id
                    .as_deref()
                    .ok_or_else(|| WorkflowError::InvalidTransition(format!("{:?} requires block_id", req.signal)))?;
                let event = match req.signal {
                    UserSignal::Validated => Event::UserValidate,
                    UserSignal::Redo => Event::UserRedo,
                    UserSignal::QcOk => Event::QcPassed,
                    UserSignal::ProblemDetected => Event::QcFailed,
                    _ => unreachable!(),
                };
                let payload = match (&req.qc_report, &req.feedback) {
                    (Some(report), _) => EventPayload::QcResult { report: report.clone() },
                    (None, Some(feedback)) => EventPayload::UserFeedback { feedback: feedback.clone() },
                    (None, None) => EventPayload::None,
                };
                self.driver.drive(&req.project_id, block_id, event, payload).await.map(|_| ())
            }
        }
    }

    /// Graft a new structural slot onto an existing chapter/section (creating
    /// either if its slot_id is unseen) and enqueue its first generation.
    async fn add_element(&self, project_id: &str, version_id: &str, spec: &NewElementSpec) -> WorkflowResult<()> {
        let mut stored = self.store.get_version(version_id).await?;

        let block = ContentBlock::new(version_id, &spec.slot_id, spec.block_type);
        self.store.create_block(block.clone()).await?;

        let block_ref = crate::domain::BlockRef {
            slot_id: spec.slot_id.clone(),
            block_id: block.id.clone(),
            block_type: spec.block_type,
        };

        let chapters = &mut stored.value.content_structure.chapters;
        let chapter_idx = chapters
            .iter()
            .position(|c| c.slot_id == spec.chapter_slot_id)
            .unwrap_or_else(|| {
                chapters.push(Chapter {
                    slot_id: spec.chapter_slot_id.clone(),
                    title: spec.chapter_title.clone(),
                    sections: Vec::new(),
                });
                chapters.len() - 1
            });
        let chapter = &mut chapters[chapter_idx];

        match chapter.sections.iter().position(|s| s.slot_id == spec.section_slot_id) {
            Some(i) => chapter.sections[i].blocks.push(block_ref),
            None => chapter.sections.push(Section {
                slot_id: spec.section_slot_id.clone(),
                title: spec.section_title.clone(),
                blocks: vec![block_ref],
            }),
        }

        self.store.update_version(stored.value, stored.version).await?;

        let task = crate::domain::WorkflowTask::new(
            project_id,
            TaskParameters::GenerateBlock {
                block_id: block.id,
                slot_id: spec.slot_id.clone(),
                feedback: None,
            },
            policy::default_priority(crate::domain::TaskType::GenerateBlock),
            0,
        );
        self.dispatcher.submit(task).await?;
        Ok(())
    }

    /// Record a worker's task outcome, deduplicating on `task_id`
    /// (spec.md §4.6, §6.1 `task_completion`). Routes the outcome into the
    /// Driver as the matching FSM event; transient failures are reported to
    /// the dispatcher instead of driving a failure transition, so the retry
    /// policy (§4.3) can decide whether to requeue.
    pub async fn submit_task_result(
        &self,
        task_id: &str,
        project_id: &str,
        block_id: &str,
        outcome: TaskOutcome,
    ) -> WorkflowResult<IntakeReceipt> {
        let dedup_key = IntakeReceipt::key("task_completion", task_id);
        if let Some(existing) = self.store.get_receipt(&dedup_key).await? {
            debug!(%dedup_key, "duplicate task completion, returning prior receipt");
            return Ok(existing);
        }

        let result = self.apply_task_result(task_id, project_id, block_id, outcome).await;
        self.record_receipt(dedup_key, result).await
    }

    async fn apply_task_result(
        &self,
        task_id: &str,
        project_id: &str,
        block_id: &str,
        outcome: TaskOutcome,
    ) -> WorkflowResult<()> {
        let task = self.store.get_task(task_id).await?;
        let task_type = task.value.task_type();

        match outcome {
            TaskOutcome::Success { output } => {
                self.store
                    .complete_task(task_id, TaskOutcome::Success { output: output.clone() })
                    .await?;
                self.drive_success(project_id, block_id, task_type, output).await
            }
            TaskOutcome::Failure { error_message, transient } => {
                // The dispatcher owns the retry-vs-exhaust call (spec.md
                // §4.3) and marks the task failed itself when exhausted; the
                // Driver only needs to see a failure once there is nothing
                // left to retry.
                let error = if transient {
                    WorkflowError::Unavailable(error_message.clone())
                } else {
                    WorkflowError::Internal(error_message.clone())
                };
                match self.dispatcher.report_failure(task_id, error).await? {
                    RetryDecision::Retry { .. } => Ok(()),
                    RetryDecision::Exhausted => {
                        self.drive_failure(project_id, block_id, task_type, error_message).await
                    }
                }
            }
        }
    }

    async fn drive_success(
        &self,
        project_id: &str,
        block_id: &str,
        task_type: crate::domain::TaskType,
        output: serde_json::Value,
    ) -> WorkflowResult<()> {
        use crate::domain::TaskType::*;
        let (event, payload) = match task_type {
            GenerateBlock | RefineBlock => {
                let content = output
                    .get("content")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let source_llm = output.get("source_llm").and_then(|v| v.as_str()).map(str::to_string);
                let event = if task_type == GenerateBlock {
                    Event::GenerateSuccess
                } else {
                    Event::RefinementSuccess
                };
                (event, EventPayload::Generated { content, source_llm })
            }
            RunQc => {
                let report: QCReport = serde_json::from_value(output)
                    .map_err(|e| WorkflowError::Internal(format!("malformed qc_report: {e}")))?;
                (Event::QcPassed, EventPayload::QcResult { report })
            }
            AssembleDocument | ExportDocument => return Ok(()),
        };
        self.driver.drive(project_id, block_id, event, payload).await.map(|_| ())
    }

    async fn drive_failure(
        &self,
        project_id: &str,
        block_id: &str,
        task_type: crate::domain::TaskType,
        error_message: String,
    ) -> WorkflowResult<()> {
        use crate::domain::TaskType::*;
        let event = match task_type {
            GenerateBlock => Event::GenerateFailed,
            RefineBlock => Event::RefinementFailed,
            RunQc => Event::QcFailed,
            AssembleDocument | ExportDocument => return Ok(()),
        };
        self.driver
            .drive(project_id, block_id, event, EventPayload::Failed { error_message })
            .await
            .map(|_| ())
    }

    async fn record_receipt(&self, dedup_key: String, result: WorkflowResult<()>) -> WorkflowResult<IntakeReceipt> {
        let receipt = match &result {
            Ok(()) => IntakeReceipt::new(dedup_key.clone(), ReceiptOutcome::Applied, None),
            Err(e) => IntakeReceipt::new(dedup_key.clone(), ReceiptOutcome::Rejected, Some(e.to_string())),
        };
        // A conflict here means a racing duplicate beat us to recording the
        // receipt; re-read and return its (authoritative) outcome instead.
        match self.store.put_receipt(receipt.clone()).await {
            Ok(()) => {}
            Err(WorkflowError::Conflict(_)) => {
                if let Some(existing) = self.store.get_receipt(&dedup_key).await? {
                    return Ok(existing);
                }
            }
            Err(e) => return Err(e),
        }
        result.map(|()| receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{self, DispatcherConfig};
    use crate::domain::{BlockRef, ContentStructure, DocumentVersion, Project, ProjectMode, QcStatus};
    use crate::driver::DriverConfig;
    use crate::state_store;
    use tempfile::tempdir;

    async fn harness() -> (Intake, StateStoreHandle, Project, ContentBlock) {
        let dir = tempdir().unwrap();
        let raw = texloom_store::Store::open(dir.path().join("db")).unwrap();
        let store = state_store::spawn(raw, 16);
        let dispatcher = dispatcher::spawn(store.clone(), DispatcherConfig::default());
        let driver = Driver::new(store.clone(), dispatcher.clone(), DriverConfig::default());

        let project = Project::new("alice", "Topology", "topology", "undergrad", "terse", ProjectMode::Supervised);
        store.create_project(project.clone()).await.unwrap();

        let block = ContentBlock::new("v1", "ch1-s1-b1", BlockType::Definition);
        let structure = ContentStructure {
            chapters: vec![Chapter {
                slot_id: "ch1".into(),
                title: "Intro".into(),
                sections: vec![Section {
                    slot_id: "ch1-s1".into(),
                    title: "Motivation".into(),
                    blocks: vec![BlockRef {
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

        let intake = Intake::new(store.clone(), dispatcher, driver);
        (intake, store, project, block)
    }

    #[tokio::test]
    async fn duplicate_user_signal_returns_prior_receipt() {
        let (intake, _store, project, block) = harness().await;
        driveup(&intake, &project.id, &block.id).await;

        let req = UserSignalRequest {
            client_id: "client-1".into(),
            project_id: project.id.clone(),
            version_id: None,
            block_id: Some(block.id.clone()),
            signal: UserSignal::Validated,
            feedback: None,
            qc_report: None,
            new_element: None,
        };
        let first = intake.submit_user_signal(req.clone()).await.unwrap();
        let second = intake.submit_user_signal(req).await.unwrap();
        assert_eq!(first.outcome, second.outcome);
        assert_eq!(first.outcome, ReceiptOutcome::Applied);
    }

    #[tokio::test]
    async fn invalid_signal_is_rejected_without_panic() {
        let (intake, _store, project, block) = harness().await;
        let req = UserSignalRequest {
            client_id: "client-2".into(),
            project_id: project.id.clone(),
            version_id: None,
            block_id: Some(block.id.clone()),
            signal: UserSignal::Redo,
            feedback: None,
            qc_report: None,
            new_element: None,
        };
        let receipt = intake.submit_user_signal(req).await.unwrap();
        assert_eq!(receipt.outcome, ReceiptOutcome::Rejected);
    }

    #[tokio::test]
    async fn duplicate_task_completion_is_idempotent() {
        let (intake, store, project, block) = harness().await;
        driveup_to_qc_pending(&intake, &store, &project.id, &block.id).await;

        let task = store
            .list_tasks(vec![])
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.value.task_type() == crate::domain::TaskType::RunQc)
            .expect("run_qc task enqueued");

        let report = QCReport::new(85.0, QcStatus::Passed, vec![]);
        let outcome = TaskOutcome::Success {
            output: serde_json::to_value(&report).unwrap(),
        };

        let first = intake
            .submit_task_result(&task.value.task_id, &project.id, &block.id, outcome.clone())
            .await
            .unwrap();
        let second = intake
            .submit_task_result(&task.value.task_id, &project.id, &block.id, outcome)
            .await
            .unwrap();
        assert_eq!(first.outcome, second.outcome);
    }

    async fn driveup(intake: &Intake, project_id: &str, block_id: &str) {
        intake
            .driver
            .drive(project_id, block_id, Event::GenerateStarted, EventPayload::None)
            .await
            .unwrap();
        intake
            .driver
            .drive(
                project_id,
                block_id,
                Event::GenerateSuccess,
                EventPayload::Generated {
                    content: "content".into(),
                    source_llm: None,
                },
            )
            .await
            .unwrap();
        intake
            .driver
            .drive(project_id, block_id, Event::QcStarted, EventPayload::None)
            .await
            .unwrap();
        let report = QCReport::new(85.0, QcStatus::Passed, vec![]);
        intake
            .driver
            .drive(project_id, block_id, Event::QcPassed, EventPayload::QcResult { report })
            .await
            .unwrap();
    }

    async fn driveup_to_qc_pending(_intake: &Intake, store: &StateStoreHandle, project_id: &str, block_id: &str) {
        let dispatcher = dispatcher::spawn(store.clone(), DispatcherConfig::default());
        let driver = Driver::new(store.clone(), dispatcher, DriverConfig::default());
        driver
            .drive(project_id, block_id, Event::GenerateStarted, EventPayload::None)
            .await
            .unwrap();
        driver
            .drive(
                project_id,
                block_id,
                Event::GenerateSuccess,
                EventPayload::Generated {
                    content: "content".into(),
                    source_llm: None,
                },
            )
            .await
            .unwrap();
    }
}

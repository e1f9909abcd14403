//! Reconciler (spec.md §5): periodic sweep that repairs drift between
//! block/project state and the dispatcher's queues. Every `interval_s` it
//! looks for (a) blocks whose state implies an enqueued task that never
//! arrived, (b) in-progress tasks stuck past their deadline, and (c)
//! projects whose blocks are all terminal but whose status hasn't caught up.
//!
//! Grounded on `taskdaemon::watcher::main_watcher::MainWatcher`'s
//! `tokio::time::sleep`-driven loop with a separately testable `check_once`.

use tracing::{debug, warn};

use texloom_store::now_ms;

use crate::domain::{BlockStatus, Filter, IndexValue, Project, ProjectStatus, TaskParameters, TaskStatus, WorkflowTask};
use crate::dispatcher::DispatcherHandle;
use crate::driver::{Driver, DriverConfig};
use crate::error::{WorkflowError, WorkflowResult};
use crate::policy;
use crate::state_store::StateStoreHandle;

use super::config::ReconcilerConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub requeued: usize,
    pub flagged_unrecoverable: usize,
    pub timed_out: usize,
    pub progress_checked: usize,
}

pub struct Reconciler {
    store: StateStoreHandle,
    dispatcher: DispatcherHandle,
    driver: Driver,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(store: StateStoreHandle, dispatcher: DispatcherHandle, driver_config: DriverConfig, config: ReconcilerConfig) -> Self {
        let driver = Driver::new(store.clone(), dispatcher.clone(), driver_config);
        Self {
            store,
            dispatcher,
            driver,
            config,
        }
    }

    /// Run forever on `config.interval_s`. Errors from one sweep are logged
    /// and don't stop the loop; a reconciler that dies silently defeats its
    /// own purpose.
    pub async fn run(self) {
        debug!(interval_s = self.config.interval_s, "Reconciler started");
        loop {
            match self.check_once().await {
                Ok(report) if report.requeued > 0 || report.timed_out > 0 || report.flagged_unrecoverable > 0 => {
                    debug!(?report, "reconcile sweep found and repaired drift");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "reconcile sweep failed"),
            }
            tokio::time::sleep(self.config.interval()).await;
        }
    }

    /// Run a single sweep (useful for testing and manual triggering).
    pub async fn check_once(&self) -> WorkflowResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        self.requeue_lost_enqueues(&mut report).await?;
        self.fail_timed_out_tasks(&mut report).await?;
        self.advance_stuck_projects(&mut report).await?;
        Ok(report)
    }

    async fn active_projects(&self) -> WorkflowResult<Vec<Project>> {
        let filters = vec![Filter::eq(
            "status",
            IndexValue::String(ProjectStatus::InProgress.to_string()),
        )];
        Ok(self.store.list_projects(filters).await?.into_iter().map(|s| s.value).collect())
    }

    /// (a) blocks whose state implies a submitted task that has no
    /// pending/in-progress row. `generate_block` and `run_qc` are
    /// re-derivable purely from block fields, so they are resubmitted
    /// outright; the dispatcher's idempotency-key absorption makes a
    /// spurious resubmission harmless. `refinement_pending` depends on
    /// caller-supplied feedback that isn't persisted on the block, so a lost
    /// enqueue there can't be replayed — it is flagged for manual review
    /// instead.
    async fn requeue_lost_enqueues(&self, report: &mut ReconcileReport) -> WorkflowResult<()> {
        for project in self.active_projects().await? {
            if project.current_step.is_empty() {
                continue;
            }
            let blocks = self.store.list_blocks_by_version(&project.current_step, None).await?;
            for stored in blocks {
                let block = stored.value;
                match block.status {
                    BlockStatus::PendingGeneration => {
                        let task = WorkflowTask::new(
                            &project.id,
                            TaskParameters::GenerateBlock {
                                block_id: block.id.clone(),
                                slot_id: block.slot_id.clone(),
                                feedback: None,
                            },
                            policy::default_priority(crate::domain::TaskType::GenerateBlock),
                            block.refinement_attempts,
                        );
                        self.dispatcher.submit(task).await?;
                        report.requeued += 1;
                        debug!(block_id = %block.id, "re-enqueued generate_block");
                    }
                    BlockStatus::QcPending => {
                        let task = WorkflowTask::new(
                            &project.id,
                            TaskParameters::RunQc { block_id: block.id.clone() },
                            policy::default_priority(crate::domain::TaskType::RunQc),
                            block.refinement_attempts,
                        );
                        self.dispatcher.submit(task).await?;
                        report.requeued += 1;
                        debug!(block_id = %block.id, "re-enqueued run_qc");
                    }
                    BlockStatus::RefinementPending => {
                        warn!(
                            block_id = %block.id,
                            "block stuck in refinement_pending with no recoverable feedback, flagging project for manual review"
                        );
                        self.mark_needs_manual_review(&project.id).await?;
                        report.flagged_unrecoverable += 1;
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// (b) in_progress tasks past their deadline with no heartbeat. Routes
    /// through the dispatcher's own retry/exhaust decision (spec.md §4.3)
    /// rather than failing the task directly, so a timed-out task still gets
    /// its remaining retry budget.
    async fn fail_timed_out_tasks(&self, report: &mut ReconcileReport) -> WorkflowResult<()> {
        let filters = vec![Filter::eq(
            "status",
            IndexValue::String(TaskStatus::InProgress.to_string()),
        )];
        let now_s = now_ms() / 1000;
        for stored in self.store.list_tasks(filters).await? {
            let task = stored.value;
            if task.deadline_unix_s >= now_s {
                continue;
            }
            debug!(task_id = %task.task_id, "task past deadline with no heartbeat, reporting timeout");
            self.dispatcher
                .report_failure(task.task_id.clone(), WorkflowError::Timeout("deadline exceeded with no heartbeat".into()))
                .await?;
            report.timed_out += 1;
        }
        Ok(())
    }

    /// (c) projects whose blocks are all terminal but whose status hasn't
    /// advanced to assembly or manual review. Delegates to the Driver's own
    /// progress check (spec.md §4.4 step 8) so the completion logic lives in
    /// exactly one place.
    async fn advance_stuck_projects(&self, report: &mut ReconcileReport) -> WorkflowResult<()> {
        for project in self.active_projects().await? {
            if project.current_step.is_empty() {
                continue;
            }
            self.driver.evaluate_project_progress(&project.id, &project.current_step).await?;
            report.progress_checked += 1;
        }
        Ok(())
    }

    async fn mark_needs_manual_review(&self, project_id: &str) -> WorkflowResult<()> {
        let stored = self.store.get_project(project_id).await?;
        if stored.value.status.is_terminal() {
            return Ok(());
        }
        let mut project = stored.value;
        project.status = ProjectStatus::NeedsManualReview;
        project.updated_at = now_ms();
        self.store.update_project(project, stored.version).await?;
        Ok(())
    }
}

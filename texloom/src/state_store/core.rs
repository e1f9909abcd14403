//! StateStore actor: the only thing that touches [`texloom_store::Store`]
//! directly. Processing commands one at a time off a single channel gives
//! every operation the linearizable single-row semantics §6.3 requires
//! without extra locking.

use tokio::sync::mpsc;
use tracing::debug;

use texloom_store::{now_ms, Store, Stored};

use crate::domain::{
    BlockStatus, ContentBlock, DocumentVersion, Filter, IntakeReceipt, Project, Record, TaskOutcome, WorkflowTask,
};
use crate::error::{WorkflowError, WorkflowResult};

use super::messages::StateCommand;

pub struct StateStore {
    store: Store,
    rx: mpsc::Receiver<StateCommand>,
}

impl StateStore {
    pub fn new(store: Store, rx: mpsc::Receiver<StateCommand>) -> Self {
        Self { store, rx }
    }

    pub async fn run(mut self) {
        debug!("StateStore actor started");
        while let Some(cmd) = self.rx.recv().await {
            if matches!(cmd, StateCommand::Shutdown) {
                debug!("StateStore actor shutting down");
                break;
            }
            self.handle(cmd);
        }
    }

    fn handle(&mut self, cmd: StateCommand) {
        match cmd {
            StateCommand::CreateProject { project, reply } => {
                let _ = reply.send(self.store.create(project).map_err(Into::into));
            }
            StateCommand::GetProject { id, reply } => {
                let _ = reply.send(self.store.get_required::<Project>(&id).map_err(Into::into));
            }
            StateCommand::UpdateProject {
                project,
                expected_version,
                reply,
            } => {
                let _ = reply.send(self.store.update(project, expected_version).map_err(Into::into));
            }
            StateCommand::ListProjects { filters, reply } => {
                let _ = reply.send(self.store.list::<Project>(&filters).map_err(Into::into));
            }

            StateCommand::CreateVersion { version, reply } => {
                let _ = reply.send(self.store.create(version).map_err(Into::into));
            }
            StateCommand::GetVersion { id, reply } => {
                let _ = reply.send(self.store.get_required::<DocumentVersion>(&id).map_err(Into::into));
            }
            StateCommand::UpdateVersion {
                version,
                expected_version,
                reply,
            } => {
                let _ = reply.send(self.store.update(version, expected_version).map_err(Into::into));
            }

            StateCommand::CreateBlock { block, reply } => {
                let _ = reply.send(self.store.create(block).map_err(Into::into));
            }
            StateCommand::GetBlock { id, reply } => {
                let _ = reply.send(self.store.get_required::<ContentBlock>(&id).map_err(Into::into));
            }
            StateCommand::UpdateBlock {
                block,
                expected_version,
                reply,
            } => {
                let _ = reply.send(self.store.update(block, expected_version).map_err(Into::into));
            }
            StateCommand::ListBlocksByVersion {
                version_id,
                status_filter,
                reply,
            } => {
                let _ = reply.send(self.list_blocks_by_version(&version_id, status_filter));
            }

            StateCommand::UpsertTask { task, reply } => {
                let _ = reply.send(self.upsert_task(task));
            }
            StateCommand::GetTask { id, reply } => {
                let _ = reply.send(self.store.get_required::<WorkflowTask>(&id).map_err(Into::into));
            }
            StateCommand::ClaimTask {
                queue,
                worker_id,
                reply,
            } => {
                let _ = reply.send(self.claim_task(&queue, &worker_id));
            }
            StateCommand::CompleteTask {
                task_id,
                outcome,
                reply,
            } => {
                let _ = reply.send(self.complete_task(&task_id, outcome));
            }
            StateCommand::ListTasks { filters, reply } => {
                let _ = reply.send(self.store.list::<WorkflowTask>(&filters).map_err(Into::into));
            }

            StateCommand::Sync { collection, reply } => {
                let _ = reply.send(self.store.sync_collection(&collection).map_err(Into::into));
            }

            StateCommand::GetReceipt { dedup_key, reply } => {
                let _ = reply.send(self.store.get::<IntakeReceipt>(&dedup_key).map(|r| r.map(|s| s.value)).map_err(Into::into));
            }
            StateCommand::PutReceipt { receipt, reply } => {
                let _ = reply.send(self.put_receipt(receipt));
            }

            StateCommand::Shutdown => unreachable!("handled in run()"),
        }
    }

    fn list_blocks_by_version(
        &self,
        version_id: &str,
        status_filter: Option<BlockStatus>,
    ) -> WorkflowResult<Vec<Stored<ContentBlock>>> {
        let filters = vec![Filter::eq(
            "version_id",
            texloom_store::IndexValue::String(version_id.to_string()),
        )];
        let mut blocks = self.store.list::<ContentBlock>(&filters)?;
        if let Some(status) = status_filter {
            blocks.retain(|b| b.value.status == status);
        }
        Ok(blocks)
    }

    /// Creates the task if its id is unseen, otherwise reloads and updates
    /// it with the caller's fields at the current version (spec.md §4.1
    /// `upsert_task`).
    fn upsert_task(&mut self, task: WorkflowTask) -> WorkflowResult<String> {
        match self.store.get::<WorkflowTask>(task.id())? {
            None => Ok(self.store.create(task)?),
            Some(existing) => {
                let task_id = task.task_id.clone();
                self.store.update(task, existing.version)?;
                Ok(task_id)
            }
        }
    }

    fn claim_task(&mut self, queue: &str, worker_id: &str) -> WorkflowResult<Option<Stored<WorkflowTask>>> {
        let filters = vec![
            Filter::eq("queue", texloom_store::IndexValue::String(queue.to_string())),
            Filter::eq(
                "status",
                texloom_store::IndexValue::String(crate::domain::TaskStatus::Pending.to_string()),
            ),
        ];
        let mut candidates = self.store.list::<WorkflowTask>(&filters)?;
        // Highest priority first, then earliest submission (FIFO within priority).
        candidates.sort_by(|a, b| {
            b.value
                .priority
                .cmp(&a.value.priority)
                .then_with(|| a.value.created_at.cmp(&b.value.created_at))
        });

        let Some(mut claimed) = candidates.into_iter().next() else {
            return Ok(None);
        };

        claimed.value.status = crate::domain::TaskStatus::InProgress;
        claimed.value.claimed_by = Some(worker_id.to_string());
        claimed.value.started_at = Some(now_ms());
        let new_version = self.store.update(claimed.value.clone(), claimed.version)?;
        Ok(Some(Stored {
            value: claimed.value,
            version: new_version,
        }))
    }

    /// Record a receipt for a new dedup key. A collision means a racing
    /// duplicate delivery arrived between the caller's lookup and this
    /// write; surfaced as `conflict` so Intake re-reads the winner's receipt.
    fn put_receipt(&mut self, receipt: IntakeReceipt) -> WorkflowResult<()> {
        self.store.create(receipt).map(|_| ()).map_err(|e| match e {
            texloom_store::StoreError::Conflict { id, .. } => {
                WorkflowError::Conflict(format!("intake receipt {id} already recorded"))
            }
            other => other.into(),
        })
    }

    fn complete_task(&mut self, task_id: &str, outcome: TaskOutcome) -> WorkflowResult<Stored<WorkflowTask>> {
        let mut current = self.store.get_required::<WorkflowTask>(task_id)?;
        match outcome {
            TaskOutcome::Success { .. } => {
                current.value.status = crate::domain::TaskStatus::Completed;
                current.value.error_message = None;
            }
            TaskOutcome::Failure { error_message, .. } => {
                current.value.status = crate::domain::TaskStatus::Failed;
                current.value.error_message = Some(error_message);
            }
        }
        current.value.completed_at = Some(now_ms());
        current.value.claimed_by = None;
        let new_version = self.store.update(current.value.clone(), current.version)?;
        Ok(Stored {
            value: current.value,
            version: new_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProjectMode, TaskParameters, TaskPriority};
    use tempfile::tempdir;

    fn store() -> Store {
        let dir = tempdir().unwrap();
        Store::open(dir.path().join("db")).unwrap()
    }

    #[tokio::test]
    async fn claim_task_picks_highest_priority_then_fifo() {
        let (tx, rx) = mpsc::channel(8);
        let actor = StateStore::new(store(), rx);
        tokio::spawn(actor.run());

        let low = WorkflowTask::new(
            "p1",
            TaskParameters::RunQc { block_id: "b1".into() },
            TaskPriority::new(1),
            0,
        );
        let high = WorkflowTask::new(
            "p1",
            TaskParameters::RunQc { block_id: "b2".into() },
            TaskPriority::new(9),
            0,
        );

        for t in [low, high.clone()] {
            let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
            tx.send(StateCommand::UpsertTask { task: t, reply: reply_tx }).await.unwrap();
            reply_rx.await.unwrap().unwrap();
        }

        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        tx.send(StateCommand::ClaimTask {
            queue: "qc".into(),
            worker_id: "w1".into(),
            reply: reply_tx,
        })
        .await
        .unwrap();
        let claimed = reply_rx.await.unwrap().unwrap().unwrap();
        assert_eq!(claimed.value.task_id, high.task_id);
        assert_eq!(claimed.value.claimed_by, Some("w1".to_string()));
    }

    #[tokio::test]
    async fn complete_task_records_failure() {
        let (tx, rx) = mpsc::channel(8);
        let actor = StateStore::new(store(), rx);
        tokio::spawn(actor.run());

        let task = WorkflowTask::new(
            "p1",
            TaskParameters::RunQc { block_id: "b1".into() },
            TaskPriority::default(),
            0,
        );
        let task_id = task.task_id.clone();

        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        tx.send(StateCommand::UpsertTask { task, reply: reply_tx }).await.unwrap();
        reply_rx.await.unwrap().unwrap();

        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        tx.send(StateCommand::CompleteTask {
            task_id: task_id.clone(),
            outcome: TaskOutcome::Failure {
                error_message: "boom".into(),
                transient: false,
            },
            reply: reply_tx,
        })
        .await
        .unwrap();
        let completed = reply_rx.await.unwrap().unwrap();
        assert_eq!(completed.value.status, crate::domain::TaskStatus::Failed);
        assert_eq!(completed.value.error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn project_round_trips_through_actor() {
        let (tx, rx) = mpsc::channel(8);
        let actor = StateStore::new(store(), rx);
        tokio::spawn(actor.run());

        let project = Project::new("alice", "Topology", "topology", "grad", "terse", ProjectMode::Autonomous);
        let id = project.id.clone();

        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        tx.send(StateCommand::CreateProject { project, reply: reply_tx }).await.unwrap();
        reply_rx.await.unwrap().unwrap();

        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        tx.send(StateCommand::GetProject { id: id.clone(), reply: reply_tx }).await.unwrap();
        let fetched = reply_rx.await.unwrap().unwrap();
        assert_eq!(fetched.value.id, id);
    }
}

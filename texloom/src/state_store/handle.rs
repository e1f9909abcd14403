//! Cloneable client handle for the [`super::core::StateStore`] actor.

use tokio::sync::{mpsc, oneshot};

use crate::domain::{BlockStatus, ContentBlock, DocumentVersion, Filter, IntakeReceipt, Project, TaskOutcome, WorkflowTask};
use crate::error::{WorkflowError, WorkflowResult};
use texloom_store::Stored;

use super::messages::StateCommand;

#[derive(Clone)]
pub struct StateStoreHandle {
    tx: mpsc::Sender<StateCommand>,
}

fn channel_closed() -> WorkflowError {
    WorkflowError::Unavailable("state store actor is not running".into())
}

impl StateStoreHandle {
    pub(crate) fn new(tx: mpsc::Sender<StateCommand>) -> Self {
        Self { tx }
    }

    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<WorkflowResult<T>>) -> StateCommand) -> WorkflowResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(build(reply)).await.map_err(|_| channel_closed())?;
        rx.await.map_err(|_| channel_closed())?
    }

    pub async fn create_project(&self, project: Project) -> WorkflowResult<String> {
        self.call(|reply| StateCommand::CreateProject { project, reply }).await
    }

    pub async fn get_project(&self, id: impl Into<String>) -> WorkflowResult<Stored<Project>> {
        let id = id.into();
        self.call(|reply| StateCommand::GetProject { id, reply }).await
    }

    pub async fn update_project(&self, project: Project, expected_version: u64) -> WorkflowResult<u64> {
        self.call(|reply| StateCommand::UpdateProject {
            project,
            expected_version,
            reply,
        })
        .await
    }

    pub async fn list_projects(&self, filters: Vec<Filter>) -> WorkflowResult<Vec<Stored<Project>>> {
        self.call(|reply| StateCommand::ListProjects { filters, reply }).await
    }

    pub async fn create_version(&self, version: DocumentVersion) -> WorkflowResult<String> {
        self.call(|reply| StateCommand::CreateVersion { version, reply }).await
    }

    pub async fn get_version(&self, id: impl Into<String>) -> WorkflowResult<Stored<DocumentVersion>> {
        let id = id.into();
        self.call(|reply| StateCommand::GetVersion { id, reply }).await
    }

    pub async fn update_version(&self, version: DocumentVersion, expected_version: u64) -> WorkflowResult<u64> {
        self.call(|reply| StateCommand::UpdateVersion {
            version,
            expected_version,
            reply,
        })
        .await
    }

    pub async fn create_block(&self, block: ContentBlock) -> WorkflowResult<String> {
        self.call(|reply| StateCommand::CreateBlock { block, reply }).await
    }

    pub async fn get_block(&self, id: impl Into<String>) -> WorkflowResult<Stored<ContentBlock>> {
        let id = id.into();
        self.call(|reply| StateCommand::GetBlock { id, reply }).await
    }

    pub async fn update_block(&self, block: ContentBlock, expected_version: u64) -> WorkflowResult<u64> {
        self.call(|reply| StateCommand::UpdateBlock {
            block,
            expected_version,
            reply,
        })
        .await
    }

    pub async fn list_blocks_by_version(
        &self,
        version_id: impl Into<String>,
        status_filter: Option<BlockStatus>,
    ) -> WorkflowResult<Vec<Stored<ContentBlock>>> {
        let version_id = version_id.into();
        self.call(|reply| StateCommand::ListBlocksByVersion {
            version_id,
            status_filter,
            reply,
        })
        .await
    }

    pub async fn upsert_task(&self, task: WorkflowTask) -> WorkflowResult<String> {
        self.call(|reply| StateCommand::UpsertTask { task, reply }).await
    }

    pub async fn get_task(&self, id: impl Into<String>) -> WorkflowResult<Stored<WorkflowTask>> {
        let id = id.into();
        self.call(|reply| StateCommand::GetTask { id, reply }).await
    }

    pub async fn claim_task(
        &self,
        queue: impl Into<String>,
        worker_id: impl Into<String>,
    ) -> WorkflowResult<Option<Stored<WorkflowTask>>> {
        let queue = queue.into();
        let worker_id = worker_id.into();
        self.call(|reply| StateCommand::ClaimTask { queue, worker_id, reply }).await
    }

    pub async fn complete_task(
        &self,
        task_id: impl Into<String>,
        outcome: TaskOutcome,
    ) -> WorkflowResult<Stored<WorkflowTask>> {
        let task_id = task_id.into();
        self.call(|reply| StateCommand::CompleteTask { task_id, outcome, reply }).await
    }

    pub async fn list_tasks(&self, filters: Vec<Filter>) -> WorkflowResult<Vec<Stored<WorkflowTask>>> {
        self.call(|reply| StateCommand::ListTasks { filters, reply }).await
    }

    pub async fn sync(&self, collection: impl Into<String>) -> WorkflowResult<usize> {
        let collection = collection.into();
        self.call(|reply| StateCommand::Sync { collection, reply }).await
    }

    pub async fn get_receipt(&self, dedup_key: impl Into<String>) -> WorkflowResult<Option<IntakeReceipt>> {
        let dedup_key = dedup_key.into();
        self.call(|reply| StateCommand::GetReceipt { dedup_key, reply }).await
    }

    pub async fn put_receipt(&self, receipt: IntakeReceipt) -> WorkflowResult<()> {
        self.call(|reply| StateCommand::PutReceipt { receipt, reply }).await
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(StateCommand::Shutdown).await;
    }
}

//! Commands and responses for the [`super::core::StateStore`] actor.

use tokio::sync::oneshot;

use crate::domain::{BlockStatus, ContentBlock, DocumentVersion, Filter, IntakeReceipt, Project, TaskOutcome, WorkflowTask};
use crate::error::WorkflowResult;
use texloom_store::Stored;

#[derive(Debug)]
pub enum StateCommand {
    CreateProject {
        project: Project,
        reply: oneshot::Sender<WorkflowResult<String>>,
    },
    GetProject {
        id: String,
        reply: oneshot::Sender<WorkflowResult<Stored<Project>>>,
    },
    UpdateProject {
        project: Project,
        expected_version: u64,
        reply: oneshot::Sender<WorkflowResult<u64>>,
    },
    ListProjects {
        filters: Vec<Filter>,
        reply: oneshot::Sender<WorkflowResult<Vec<Stored<Project>>>>,
    },

    CreateVersion {
        version: DocumentVersion,
        reply: oneshot::Sender<WorkflowResult<String>>,
    },
    GetVersion {
        id: String,
        reply: oneshot::Sender<WorkflowResult<Stored<DocumentVersion>>>,
    },
    UpdateVersion {
        version: DocumentVersion,
        expected_version: u64,
        reply: oneshot::Sender<WorkflowResult<u64>>,
    },

    CreateBlock {
        block: ContentBlock,
        reply: oneshot::Sender<WorkflowResult<String>>,
    },
    GetBlock {
        id: String,
        reply: oneshot::Sender<WorkflowResult<Stored<ContentBlock>>>,
    },
    UpdateBlock {
        block: ContentBlock,
        expected_version: u64,
        reply: oneshot::Sender<WorkflowResult<u64>>,
    },
    ListBlocksByVersion {
        version_id: String,
        status_filter: Option<BlockStatus>,
        reply: oneshot::Sender<WorkflowResult<Vec<Stored<ContentBlock>>>>,
    },

    UpsertTask {
        task: WorkflowTask,
        reply: oneshot::Sender<WorkflowResult<String>>,
    },
    GetTask {
        id: String,
        reply: oneshot::Sender<WorkflowResult<Stored<WorkflowTask>>>,
    },
    /// Atomically flips the highest-priority pending task in `queue` to
    /// `in_progress` and stamps `claimed_by` (spec.md §4.1 `claim_task`).
    ClaimTask {
        queue: String,
        worker_id: String,
        reply: oneshot::Sender<WorkflowResult<Option<Stored<WorkflowTask>>>>,
    },
    CompleteTask {
        task_id: String,
        outcome: TaskOutcome,
        reply: oneshot::Sender<WorkflowResult<Stored<WorkflowTask>>>,
    },
    ListTasks {
        filters: Vec<Filter>,
        reply: oneshot::Sender<WorkflowResult<Vec<Stored<WorkflowTask>>>>,
    },

    Sync {
        collection: String,
        reply: oneshot::Sender<WorkflowResult<usize>>,
    },

    /// Look up a prior intake receipt by dedup key (spec.md §4.6).
    GetReceipt {
        dedup_key: String,
        reply: oneshot::Sender<WorkflowResult<Option<IntakeReceipt>>>,
    },
    /// Record a new intake receipt; fails with `conflict` if the key was
    /// already recorded (a racing duplicate delivery).
    PutReceipt {
        receipt: IntakeReceipt,
        reply: oneshot::Sender<WorkflowResult<()>>,
    },

    Shutdown,
}

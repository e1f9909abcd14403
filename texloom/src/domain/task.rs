//! WorkflowTask: a unit of asynchronous work handed to a worker (spec.md §3, §6.2).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use texloom_store::{now_ms, IndexValue, Record};

use super::feedback::Feedback;
use super::id::generate_id;
use super::priority::TaskPriority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    GenerateBlock,
    RunQc,
    RefineBlock,
    AssembleDocument,
    ExportDocument,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::GenerateBlock => "generate_block",
            Self::RunQc => "run_qc",
            Self::RefineBlock => "refine_block",
            Self::AssembleDocument => "assemble_document",
            Self::ExportDocument => "export_document",
        };
        write!(f, "{s}")
    }
}

impl TaskType {
    /// Which of the five logical dispatcher queues this task type belongs to.
    pub fn queue_name(&self) -> &'static str {
        match self {
            Self::GenerateBlock => "generation",
            Self::RunQc => "qc",
            Self::RefineBlock => "refine",
            Self::AssembleDocument => "assemble",
            Self::ExportDocument => "export",
        }
    }

    /// Default wall-clock deadline in seconds (spec.md §6.5).
    pub fn default_deadline_secs(&self) -> u64 {
        match self {
            Self::ExportDocument => 900,
            _ => 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Retrying,
    Cancelled,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Closed, tagged parameter schema per task_type (spec.md §9: no open dict).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "snake_case")]
pub enum TaskParameters {
    GenerateBlock {
        block_id: String,
        slot_id: String,
        feedback: Option<Feedback>,
    },
    RunQc {
        block_id: String,
    },
    RefineBlock {
        predecessor_block_id: String,
        new_block_id: String,
        feedback: Feedback,
    },
    AssembleDocument {
        version_id: String,
    },
    ExportDocument {
        version_id: String,
        artifact_ref: String,
        formats: Vec<String>,
    },
}

impl TaskParameters {
    pub fn task_type(&self) -> TaskType {
        match self {
            Self::GenerateBlock { .. } => TaskType::GenerateBlock,
            Self::RunQc { .. } => TaskType::RunQc,
            Self::RefineBlock { .. } => TaskType::RefineBlock,
            Self::AssembleDocument { .. } => TaskType::AssembleDocument,
            Self::ExportDocument { .. } => TaskType::ExportDocument,
        }
    }

    /// The block this task concerns, if block-scoped (spec.md §4.3 idempotency key).
    pub fn block_id(&self) -> Option<&str> {
        match self {
            Self::GenerateBlock { block_id, .. } => Some(block_id),
            Self::RunQc { block_id } => Some(block_id),
            Self::RefineBlock { new_block_id, .. } => Some(new_block_id),
            Self::AssembleDocument { .. } | Self::ExportDocument { .. } => None,
        }
    }

    pub fn version_id(&self) -> Option<&str> {
        match self {
            Self::AssembleDocument { version_id } | Self::ExportDocument { version_id, .. } => Some(version_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTask {
    pub task_id: String,
    pub project_id: String,
    pub parameters: TaskParameters,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// Idempotency key collapsing duplicate submissions (spec.md §4.3).
    pub idempotency_key: String,
    /// Set by `claim_task`; cleared when the task leaves `in_progress`.
    pub claimed_by: Option<String>,
    pub attempt: u32,
    /// refinement_attempts carried from the block, used to cap auto-refine loops.
    pub refinement_attempts: u32,
    pub deadline_unix_s: i64,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub error_message: Option<String>,
}

impl WorkflowTask {
    pub fn new(
        project_id: impl Into<String>,
        parameters: TaskParameters,
        priority: TaskPriority,
        refinement_attempts: u32,
    ) -> Self {
        let project_id = project_id.into();
        let task_type = parameters.task_type();
        let now = now_ms();
        let idempotency_key = build_idempotency_key(&parameters, refinement_attempts);
        Self {
            task_id: generate_id("task", &format!("{task_type}-{idempotency_key}")),
            project_id,
            parameters,
            status: TaskStatus::Pending,
            priority,
            idempotency_key,
            claimed_by: None,
            attempt: 1,
            refinement_attempts,
            deadline_unix_s: now / 1000 + task_type.default_deadline_secs() as i64,
            created_at: now,
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    pub fn task_type(&self) -> TaskType {
        self.parameters.task_type()
    }
}

/// Outcome a worker posts back to Intake via `task_completion` (spec.md §6.1, §6.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskOutcome {
    Success { output: serde_json::Value },
    Failure { error_message: String, transient: bool },
}

/// `(block_id, task_type, refinement_attempts)` for block-scoped tasks,
/// `(version_id, task_type)` for document-scoped ones (spec.md §4.3).
/// generate_block and refine_block share queue semantics with run_qc so the
/// task_type is folded in to keep the three block-scoped task types distinct
/// at the same refinement_attempts value.
fn build_idempotency_key(parameters: &TaskParameters, refinement_attempts: u32) -> String {
    let task_type = parameters.task_type();
    if let Some(block_id) = parameters.block_id() {
        format!("{block_id}:{task_type}:{refinement_attempts}")
    } else if let Some(version_id) = parameters.version_id() {
        format!("{version_id}:{task_type}")
    } else {
        unreachable!("every TaskParameters variant is block- or version-scoped")
    }
}

impl Record for WorkflowTask {
    fn id(&self) -> &str {
        &self.task_id
    }

    fn collection_name() -> &'static str {
        "tasks"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("project_id".into(), IndexValue::String(self.project_id.clone()));
        fields.insert("status".into(), IndexValue::String(self.status.to_string()));
        fields.insert("queue".into(), IndexValue::String(self.task_type().queue_name().to_string()));
        fields.insert(
            "idempotency_key".into(),
            IndexValue::String(self.idempotency_key.clone()),
        );
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_stable_for_same_inputs() {
        let params = TaskParameters::GenerateBlock {
            block_id: "b1".into(),
            slot_id: "s1".into(),
            feedback: None,
        };
        let t1 = WorkflowTask::new("p1", params.clone(), TaskPriority::default(), 0);
        let t2 = WorkflowTask::new("p1", params, TaskPriority::default(), 0);
        assert_eq!(t1.idempotency_key, t2.idempotency_key);
    }

    #[test]
    fn idempotency_key_changes_with_refinement_attempts() {
        let params = TaskParameters::RunQc { block_id: "b1".into() };
        let t1 = WorkflowTask::new("p1", params.clone(), TaskPriority::default(), 0);
        let t2 = WorkflowTask::new("p1", params, TaskPriority::default(), 1);
        assert_ne!(t1.idempotency_key, t2.idempotency_key);
    }

    #[test]
    fn document_scoped_task_keys_on_version_and_type() {
        let params = TaskParameters::AssembleDocument { version_id: "v1".into() };
        let task = WorkflowTask::new("p1", params, TaskPriority::default(), 0);
        assert_eq!(task.idempotency_key, "v1:assemble_document");
    }

    #[test]
    fn default_deadlines_match_spec() {
        assert_eq!(TaskType::ExportDocument.default_deadline_secs(), 900);
        assert_eq!(TaskType::GenerateBlock.default_deadline_secs(), 300);
    }
}

//! Messages for the [`super::core::Dispatcher`] actor.

use std::time::Duration;

use tokio::sync::oneshot;

use crate::domain::WorkflowTask;
use crate::error::{WorkflowError, WorkflowResult};

#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    Retry { attempt: u32, delay: Duration },
    Exhausted,
}

#[derive(Debug)]
pub enum DispatcherRequest {
    /// Submit a task, deduplicating on idempotency key (spec.md §4.3).
    Submit {
        task: WorkflowTask,
        reply: oneshot::Sender<WorkflowResult<String>>,
    },
    /// Record a worker's failure for `task_id` and decide whether to retry.
    ReportFailure {
        task_id: String,
        error: WorkflowError,
        reply: oneshot::Sender<WorkflowResult<RetryDecision>>,
    },
    Shutdown,
}

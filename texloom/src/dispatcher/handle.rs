//! Cloneable client handle for the [`super::core::Dispatcher`] actor.

use tokio::sync::{mpsc, oneshot};

use crate::domain::WorkflowTask;
use crate::error::{WorkflowError, WorkflowResult};

use super::messages::{DispatcherRequest, RetryDecision};
use super::metrics::{DispatcherMetrics, DispatcherMetricsSnapshot};

#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<DispatcherRequest>,
    metrics: DispatcherMetrics,
}

fn channel_closed() -> WorkflowError {
    WorkflowError::Unavailable("dispatcher actor is not running".into())
}

impl DispatcherHandle {
    pub(crate) fn new(tx: mpsc::Sender<DispatcherRequest>, metrics: DispatcherMetrics) -> Self {
        Self { tx, metrics }
    }

    /// Snapshot of submission/retry counters, read without a round trip
    /// through the actor.
    pub fn metrics(&self) -> DispatcherMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn submit(&self, task: WorkflowTask) -> WorkflowResult<String> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(DispatcherRequest::Submit { task, reply })
            .await
            .map_err(|_| channel_closed())?;
        rx.await.map_err(|_| channel_closed())?
    }

    pub async fn report_failure(&self, task_id: impl Into<String>, error: WorkflowError) -> WorkflowResult<RetryDecision> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(DispatcherRequest::ReportFailure {
                task_id: task_id.into(),
                error,
                reply,
            })
            .await
            .map_err(|_| channel_closed())?;
        rx.await.map_err(|_| channel_closed())?
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(DispatcherRequest::Shutdown).await;
    }
}

//! Task Dispatcher (C, spec.md §4.3): idempotent submission and
//! transient-failure retry with exponential backoff over the five logical
//! queues (generation, qc, refine, assemble, export). Priority ordering and
//! at-most-one-claim-at-a-time are enforced by the State Store's
//! `claim_task`; the dispatcher owns de-duplication and the retry clock.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::{Filter, IndexValue, TaskOutcome, TaskStatus};
use crate::error::WorkflowResult;
use crate::state_store::StateStoreHandle;

use super::backoff::compute_delay;
use super::config::DispatcherConfig;
use super::messages::{DispatcherRequest, RetryDecision};
use super::metrics::DispatcherMetrics;

pub struct Dispatcher {
    store: StateStoreHandle,
    config: DispatcherConfig,
    rx: mpsc::Receiver<DispatcherRequest>,
    metrics: DispatcherMetrics,
}

impl Dispatcher {
    pub fn new(
        store: StateStoreHandle,
        config: DispatcherConfig,
        rx: mpsc::Receiver<DispatcherRequest>,
        metrics: DispatcherMetrics,
    ) -> Self {
        Self {
            store,
            config,
            rx,
            metrics,
        }
    }

    pub async fn run(mut self) {
        debug!("Dispatcher actor started");
        while let Some(req) = self.rx.recv().await {
            match req {
                DispatcherRequest::Submit { task, reply } => {
                    let _ = reply.send(self.submit(task).await);
                }
                DispatcherRequest::ReportFailure { task_id, error, reply } => {
                    let _ = reply.send(self.report_failure(task_id, error).await);
                }
                DispatcherRequest::Shutdown => {
                    debug!("Dispatcher actor shutting down");
                    break;
                }
            }
        }
    }

    /// Absorb a duplicate submission sharing an idempotency key with a
    /// pending or in-progress task; otherwise enqueue (spec.md §4.3).
    async fn submit(&self, task: crate::domain::WorkflowTask) -> WorkflowResult<String> {
        let filters = vec![Filter::eq(
            "idempotency_key",
            IndexValue::String(task.idempotency_key.clone()),
        )];
        let existing = self.store.list_tasks(filters).await?;
        if let Some(absorbed) = existing
            .iter()
            .find(|t| matches!(t.value.status, TaskStatus::Pending | TaskStatus::InProgress))
        {
            debug!(idempotency_key = %task.idempotency_key, task_id = %absorbed.value.task_id, "duplicate submission absorbed");
            self.metrics.record_absorbed_duplicate();
            return Ok(absorbed.value.task_id.clone());
        }

        self.metrics.record_submitted();
        self.store.upsert_task(task).await
    }

    async fn report_failure(&mut self, task_id: String, error: crate::error::WorkflowError) -> WorkflowResult<RetryDecision> {
        let current = self.store.get_task(&task_id).await?;
        let mut task = current.value;

        let exhausted = !error.is_transient() || task.attempt >= self.config.max_task_retries;
        if exhausted {
            self.store
                .complete_task(
                    &task_id,
                    TaskOutcome::Failure {
                        error_message: error.to_string(),
                        transient: error.is_transient(),
                    },
                )
                .await?;
            self.metrics.record_exhausted();
            return Ok(RetryDecision::Exhausted);
        }

        let delay = compute_delay(&self.config, task.attempt);
        task.attempt += 1;
        task.status = TaskStatus::Retrying;
        task.error_message = Some(error.to_string());
        self.store.upsert_task(task.clone()).await?;

        self.metrics.record_retried();
        self.schedule_requeue(task_id, delay);
        Ok(RetryDecision::Retry {
            attempt: task.attempt,
            delay,
        })
    }

    /// After `delay`, flip the task back to `pending` so `claim_task` can
    /// pick it up again. Runs detached from the actor loop so a long delay
    /// never blocks other dispatcher traffic.
    fn schedule_requeue(&self, task_id: String, delay: std::time::Duration) {
        let store = self.store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match store.get_task(&task_id).await {
                Ok(mut current) if current.value.status == TaskStatus::Retrying => {
                    current.value.status = TaskStatus::Pending;
                    if let Err(e) = store.upsert_task(current.value).await {
                        warn!(%task_id, error = %e, "failed to requeue task after backoff");
                    }
                }
                Ok(_) => {
                    debug!(%task_id, "task left retrying state before backoff elapsed, not requeueing");
                }
                Err(e) => warn!(%task_id, error = %e, "task vanished before backoff elapsed"),
            }
        });
    }
}

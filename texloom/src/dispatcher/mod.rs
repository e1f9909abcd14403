//! Task Dispatcher: idempotent submission and transient-failure retry
//! sitting above the State Store (spec.md §4.3).

mod backoff;
mod config;
mod core;
mod handle;
mod messages;
mod metrics;

pub use backoff::compute_delay;
pub use config::DispatcherConfig;
pub use core::Dispatcher;
pub use handle::DispatcherHandle;
pub use messages::{DispatcherRequest, RetryDecision};
pub use metrics::{DispatcherMetrics, DispatcherMetricsSnapshot};

use tokio::sync::mpsc;

use crate::state_store::StateStoreHandle;

/// Spawn a [`Dispatcher`] actor and return a handle to it.
pub fn spawn(store: StateStoreHandle, config: DispatcherConfig) -> DispatcherHandle {
    let (tx, rx) = mpsc::channel(config.channel_buffer);
    let metrics = DispatcherMetrics::new();
    let dispatcher = Dispatcher::new(store, config, rx, metrics.clone());
    tokio::spawn(dispatcher.run());
    DispatcherHandle::new(tx, metrics)
}

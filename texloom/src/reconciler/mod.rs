//! Periodic sweep that repairs drift between stored state and the
//! dispatcher's queues (spec.md §5).

mod config;
mod core;

pub use config::ReconcilerConfig;
pub use core::{ReconcileReport, Reconciler};

use crate::dispatcher::DispatcherHandle;
use crate::driver::DriverConfig;
use crate::state_store::StateStoreHandle;

/// Build a `Reconciler` and hand back a `JoinHandle` running its loop,
/// mirroring `dispatcher::spawn` / `state_store::spawn`.
pub fn spawn(
    store: StateStoreHandle,
    dispatcher: DispatcherHandle,
    driver_config: DriverConfig,
    config: ReconcilerConfig,
) -> tokio::task::JoinHandle<()> {
    let reconciler = Reconciler::new(store, dispatcher, driver_config, config);
    tokio::spawn(reconciler.run())
}

//! State Store Adapter (A, spec.md §4.1): optimistic-locked CRUD for
//! projects, versions, blocks, and tasks, fronting [`texloom_store::Store`].

mod core;
mod handle;
mod messages;

pub use core::StateStore;
pub use handle::StateStoreHandle;
pub use messages::StateCommand;

use tokio::sync::mpsc;

/// Spawn the actor on the current runtime and return a handle to it.
pub fn spawn(store: texloom_store::Store, channel_buffer: usize) -> StateStoreHandle {
    let (tx, rx) = mpsc::channel(channel_buffer);
    let actor = StateStore::new(store, rx);
    tokio::spawn(actor.run());
    StateStoreHandle::new(tx)
}

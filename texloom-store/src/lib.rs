//! Generic persistent record store with optimistic concurrency.
//!
//! A collection is a named set of [`Record`]s. Writes append to a
//! per-collection JSONL journal (the durable, git-trackable source of
//! truth) and update a SQLite cache used for lookups and filtered
//! listing. [`Store::sync_collection`] rebuilds the cache from the
//! journal, which is the recovery path after a crash between the two
//! writes.
//!
//! This crate knows nothing about the workflow domain above it — it is
//! the same kind of generic persistence layer a coordinator or scheduler
//! crate would sit on top of, just generalized over any `Record` impl.

mod error;
mod record;
mod store;
mod stored;

pub use error::{StoreError, StoreResult};
pub use record::{filters_match, now_ms, Filter, FilterOp, IndexValue, Record};
pub use store::Store;
pub use stored::Stored;

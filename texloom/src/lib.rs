//! texloom - workflow orchestration engine for the document-generation pipeline.
//!
//! Drives per-block content through generation, QC, and refinement cycles
//! to an exported document, under either explicit human control
//! ("supervised") or fully automatic control ("autonomous").
//!
//! # Core Concepts
//!
//! - **State Store Adapter** ([`domain`] + [`texloom_store`]): optimistic-locked
//!   CRUD for projects, versions, blocks, tasks.
//! - **Block FSM** ([`fsm`]): the per-block transition table and guards.
//! - **Mode Policies** ([`policy`]): decide what to enqueue on each transition.
//! - **Task Dispatcher** ([`dispatcher`]): typed queues with retries and idempotency.
//! - **Workflow Driver** ([`driver`]): the single entry point that advances a block.
//! - **Signal/Result Intake** ([`intake`]): user signals and worker completions.
//! - **Reconciler** ([`reconciler`]): periodic sweep for lost work.
//!
//! # Modules
//!
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

#![allow(dead_code)]

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod driver;
pub mod error;
pub mod fsm;
pub mod intake;
pub mod policy;
pub mod reconciler;
pub mod state_store;

// Re-export commonly used types
pub use dispatcher::{Dispatcher, DispatcherConfig, DispatcherHandle};
pub use domain::{DomainId, Filter, FilterOp, IndexValue, Record, Store};
pub use driver::Driver;
pub use error::{WorkflowError, WorkflowResult};
pub use intake::Intake;
pub use reconciler::Reconciler;
pub use state_store::{StateStore, StateStoreHandle};

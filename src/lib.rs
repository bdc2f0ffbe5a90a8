//! # spark-reconciler
//!
//! Declarative UI-tree reconciliation runtime for Rust.
//!
//! Describe the UI you want as a tree of elements; the reconciler works out
//! the smallest set of host mutations that turns the previously rendered
//! tree into it, and applies them through a pluggable [`Host`] adapter.
//! Function components keep per-instance state across renders through
//! ordered state cells ([`Hooks`]).
//!
//! ## Architecture
//!
//! Every rendered instance is backed by at most two work nodes living in a
//! slab arena: the committed one and the one being built. A render walks
//! the tree depth first, then a commit applies the collected effects and
//! swaps the two generations:
//! ```text
//! render() → UpdateQueue → work loop (begin ↓ / complete ↑) → commit → Host
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Elements, props, work tags and effect flags
//! - [`engine`] - Work nodes and their arena
//! - [`state`] - Update queues and state cells
//! - [`reconciler`] - Keyed child diffing
//! - [`pipeline`] - Work loop, commit, scheduling and the root container
//! - [`host`] - Host adapter trait, property diffing, in-memory host

pub mod engine;
pub mod error;
pub mod host;
pub mod pipeline;
pub mod reconciler;
pub mod state;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use error::{ReconcileError, Result};

pub use engine::{NodeArena, NodeId, NodeProps, WorkNode};

pub use state::{Dispatch, Hooks, SetState, StateAction};

pub use pipeline::{
    CommitSummary, EffectRecord, ImmediateScheduler, ManualScheduler, RootContainer,
    RootOptions, Scheduler, TreeSnapshot, create_root,
};

pub use host::{Host, HostHandle, HostOp, MemoryHost, MemoryHostError, UpdatePayload};

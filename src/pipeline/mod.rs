//! Render Pipeline
//!
//! This module turns a render request into host mutations.
//!
//! # Pipeline Architecture
//!
//! ```text
//! render() / dispatch → scheduler → work loop (begin ↓ complete ↑) → commit → swap current
//! ```
//!
//! ## Data Flow
//!
//! 1. **root** - Enqueues the update and schedules a single task per batch
//! 2. **work_loop** - Builds the work-in-progress tree, one node at a time
//! 3. **begin / complete** - Per-node halves of the loop: children down, instances and flags up
//! 4. **commit** - Applies deletions, placements and updates, then swaps `current`
//!
//! ## Key Design Principles
//!
//! - **One render in flight**: the tree sits behind a `RefCell`; re-entry becomes a deferred re-render
//! - **All or nothing visibility**: a failed render never swaps `current`
//! - **Skip clean subtrees**: `subtree_flags` lets the commit skip untouched branches

mod begin;
mod commit;
mod complete;
pub mod root;
pub mod scheduler;
pub mod work_loop;

// Re-exports
pub use commit::{CommitSummary, EffectRecord, commit_root};
pub use root::{RootContainer, RootOptions, TreeSnapshot, create_root};
pub use scheduler::{ImmediateScheduler, ManualScheduler, Scheduler, Task};
pub use work_loop::{FinishedWork, RenderContext, abandon_work, render_root_sync};

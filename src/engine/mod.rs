//! Reconciler Engine - Work nodes and their arena.
//!
//! The engine manages the core data structures:
//! - WorkNode: one rendered instance in one generation
//! - NodeArena: slab storage for both generations, double buffering
//!
//! # Architecture
//!
//! Work nodes are NOT linked objects. They are entries in a slab, and every
//! link between them (parent, child, sibling, alternate) is a [`NodeId`]:
//!
//! ```text
//! #0 Root          (child=#2, alternate=#1)
//! #1 Root          (child=#3, alternate=#0)   work-in-progress
//! #2 HostComponent (parent=#0, alternate=#3)
//! #3 HostComponent (parent=#1, alternate=#2)  work-in-progress
//! ```
//!
//! Cyclic parent/alternate links need no reference counting, and freeing a
//! deleted instance frees both of its generations at once.

mod arena;
mod node;

pub use arena::*;
pub use node::*;

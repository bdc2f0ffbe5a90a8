//! Reconciler - diffing of child descriptions against the current tree.
//!
//! The pipeline calls [`ChildReconciler`] from the begin phase of every node
//! that has children. Tracking is on when the parent already has a current
//! node, off while mounting.

mod child;

pub use child::ChildReconciler;

//! Host Adapter - the environment the reconciler renders into.
//!
//! The reconciler never touches a real UI. It asks a [`Host`] to create
//! instances, move them around and apply property diffs. Anything that can
//! create, insert, remove and update nodes can be plugged in:
//!
//! - **MemoryHost** - in-memory tree with an operation log (tests, tooling)
//!
//! # Call Order
//!
//! ```text
//! complete phase   create_instance → append_initial_child* → finalize_initial_children
//!                  diff_properties (existing instances)
//! commit phase     apply_property_diff (text reset) → remove_child*
//!                  → insert_before / append_child → apply_property_diff
//! ```

pub mod memory;
pub mod props;

use std::error::Error;
use std::fmt::Debug;

use crate::types::Props;

pub use memory::{HostHandle, HostOp, MemoryHost, MemoryHostError};
pub use props::{UpdatePayload, diff_properties, is_text_only_children};

/// Host environment operations.
///
/// Instances are cheap handles (`Clone`). The root container is itself an
/// `Instance`.
pub trait Host {
    type Instance: Clone + PartialEq + Debug + 'static;
    type Error: Error + Send + Sync + 'static;

    // =========================================================================
    // Creation (complete phase)
    // =========================================================================

    fn create_instance(&mut self, tag: &str, props: &Props) -> Result<Self::Instance, Self::Error>;

    fn create_text_instance(&mut self, text: &str) -> Result<Self::Instance, Self::Error>;

    /// Append a child to an instance that is not attached yet.
    fn append_initial_child(
        &mut self,
        parent: &Self::Instance,
        child: &Self::Instance,
    ) -> Result<(), Self::Error> {
        self.append_child(parent, child)
    }

    /// Apply initial props once every initial child is appended.
    fn finalize_initial_children(
        &mut self,
        instance: &Self::Instance,
        tag: &str,
        props: &Props,
    ) -> Result<(), Self::Error>;

    // =========================================================================
    // Mutation (commit phase)
    // =========================================================================

    /// Append `child` as the last child of `parent`, moving it if attached.
    fn append_child(
        &mut self,
        parent: &Self::Instance,
        child: &Self::Instance,
    ) -> Result<(), Self::Error>;

    /// Insert `child` before `before` in `parent`, moving it if attached.
    fn insert_before(
        &mut self,
        parent: &Self::Instance,
        child: &Self::Instance,
        before: &Self::Instance,
    ) -> Result<(), Self::Error>;

    fn remove_child(
        &mut self,
        parent: &Self::Instance,
        child: &Self::Instance,
    ) -> Result<(), Self::Error>;

    /// Remove everything from the container before the first mount.
    fn clear_container(&mut self, _container: &Self::Instance) -> Result<(), Self::Error> {
        Ok(())
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Compute the changes between two props of the same element.
    fn diff_properties(&self, _tag: &str, old: &Props, new: &Props) -> Option<UpdatePayload> {
        diff_properties(old, new)
    }

    /// Apply a payload computed by [`Host::diff_properties`].
    ///
    /// A `children: Null` entry clears text content. It arrives on its own,
    /// before any element child is placed into the instance.
    fn apply_property_diff(
        &mut self,
        instance: &Self::Instance,
        payload: &UpdatePayload,
        tag: &str,
        old: &Props,
        new: &Props,
    ) -> Result<(), Self::Error>;

    fn commit_text_update(
        &mut self,
        instance: &Self::Instance,
        old: &str,
        new: &str,
    ) -> Result<(), Self::Error>;

    /// Check if `children` is assigned as text content rather than reconciled.
    fn is_text_only_children(&self, _tag: &str, props: &Props) -> bool {
        is_text_only_children(props)
    }
}

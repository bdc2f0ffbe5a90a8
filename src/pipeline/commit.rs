//! Commit phase - apply the finished generation to the host.
//!
//! Order of work:
//!
//! 1. mutation pass, depth first: at each level deletions first, then the
//!    children, then the node's own placement / update
//! 2. layout pass: attach refs
//! 3. swap `current` to the finished root
//! 4. detach the state cells of deleted nodes and free them (both generations)
//!
//! If a host call fails, `current` is not swapped and deleted instances keep
//! their state cells.
//!
//! A subtree whose `flags | subtree_flags` misses the pass mask is skipped
//! entirely.

use std::rc::Rc;

use crate::engine::{MemoizedState, NodeArena, NodeId, NodeProps};
use crate::error::{ReconcileError, Result};
use crate::host::props::CHILDREN;
use crate::host::{Host, UpdatePayload};
use crate::state::detach_hooks;
use crate::types::{Flags, Key, Props, WorkTag};

// =============================================================================
// Commit Summary
// =============================================================================

/// One applied effect.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectRecord {
    pub node: NodeId,
    pub tag: WorkTag,
    pub key: Option<Key>,
    pub label: String,
}

/// Effects applied by one commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitSummary {
    pub placements: Vec<EffectRecord>,
    pub updates: Vec<EffectRecord>,
    pub deletions: Vec<EffectRecord>,
}

impl CommitSummary {
    /// Check if the commit touched the host at all.
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty() && self.updates.is_empty() && self.deletions.is_empty()
    }

    /// Labels of placed nodes, in commit order.
    pub fn placed_labels(&self) -> Vec<&str> {
        self.placements.iter().map(|r| r.label.as_str()).collect()
    }

    /// Keys of placed nodes, in commit order.
    pub fn placed_keys(&self) -> Vec<&str> {
        self.placements
            .iter()
            .filter_map(|r| r.key.as_deref())
            .collect()
    }

    /// Keys of deleted nodes, in commit order.
    pub fn deleted_keys(&self) -> Vec<&str> {
        self.deletions
            .iter()
            .filter_map(|r| r.key.as_deref())
            .collect()
    }
}

// =============================================================================
// Commit
// =============================================================================

/// Commit `finished` and make it current.
///
/// When `clear_container` is set the container is emptied before any
/// insertion. On error `current` is left untouched.
pub fn commit_root<H: Host>(
    arena: &mut NodeArena<H::Instance>,
    host: &mut H,
    container: &H::Instance,
    current: &mut NodeId,
    finished: NodeId,
    clear_container: bool,
) -> Result<CommitSummary> {
    let mut committer = Committer {
        arena,
        host,
        container,
        summary: CommitSummary::default(),
        to_free: Vec::new(),
    };

    if clear_container {
        committer
            .host
            .clear_container(container)
            .map_err(ReconcileError::host("clear_container"))?;
    }

    let root = &committer.arena[finished];
    let root_flags = root.flags | root.subtree_flags;
    if root_flags.intersects(Flags::MUTATION_MASK) {
        committer.commit_mutation_effects_on_node(finished)?;
    }
    if root_flags.intersects(Flags::LAYOUT_MASK) {
        committer.commit_layout_effects(finished);
    }

    *current = finished;

    let Committer {
        arena,
        summary,
        to_free,
        ..
    } = committer;
    for id in to_free {
        if let Some(node) = arena.free(id) {
            if let MemoizedState::Hooks(hooks) = &node.memoized_state {
                detach_hooks(hooks);
            }
        }
    }
    Ok(summary)
}

struct Committer<'a, H: Host> {
    arena: &'a mut NodeArena<H::Instance>,
    host: &'a mut H,
    container: &'a H::Instance,
    summary: CommitSummary,
    /// Deleted nodes, detached and freed once the commit has succeeded.
    to_free: Vec<NodeId>,
}

impl<H: Host> Committer<'_, H> {
    fn record(&self, node: NodeId) -> EffectRecord {
        let n = &self.arena[node];
        EffectRecord {
            node,
            tag: n.tag,
            key: n.key.clone(),
            label: n.label(),
        }
    }

    /// Host instance children of `node` are inserted into: the container
    /// for the Root, the instance for a HostComponent.
    fn host_instance_of(&self, node: NodeId) -> Option<H::Instance> {
        let n = &self.arena[node];
        match n.tag {
            WorkTag::Root => Some(self.container.clone()),
            WorkTag::HostComponent => n.state_node.clone(),
            _ => None,
        }
    }

    /// Nearest host parent of `node`, inclusive.
    fn nearest_host_instance(&self, node: NodeId) -> Option<H::Instance> {
        if self.arena[node].tag.is_host_parent() {
            return self.host_instance_of(node);
        }
        self.arena
            .host_parent(node)
            .and_then(|parent| self.host_instance_of(parent))
    }

    // =========================================================================
    // Mutation Pass
    // =========================================================================

    fn recursively_traverse_mutation_effects(&mut self, parent: NodeId) -> Result<()> {
        let deletions = std::mem::take(&mut self.arena[parent].deletions);
        for deleted in deletions {
            self.commit_deletion_effects(parent, deleted)?;
        }

        if self.arena[parent].subtree_flags.intersects(Flags::MUTATION_MASK) {
            let mut child = self.arena[parent].child;
            while let Some(c) = child {
                self.commit_mutation_effects_on_node(c)?;
                child = self.arena[c].sibling;
            }
        }
        Ok(())
    }

    fn commit_mutation_effects_on_node(&mut self, node: NodeId) -> Result<()> {
        let n = &self.arena[node];
        if !(n.flags | n.subtree_flags).intersects(Flags::MUTATION_MASK) {
            return Ok(());
        }
        let tag = n.tag;
        let current = n.alternate;

        if tag == WorkTag::HostComponent && self.arena[node].has_flags(Flags::UPDATE) {
            self.commit_text_reset(node, current)?;
        }
        self.recursively_traverse_mutation_effects(node)?;
        self.commit_placement(node)?;

        match tag {
            WorkTag::HostComponent => {
                if self.arena[node].has_flags(Flags::REF) {
                    // The old ref no longer points at this instance.
                    if let Some(old_ref) = current.and_then(|c| self.arena[c].element_ref.clone()) {
                        old_ref.detach();
                    }
                }
                if self.arena[node].has_flags(Flags::UPDATE) {
                    self.commit_update(node, current)?;
                }
            }
            WorkTag::HostText => {
                if self.arena[node].has_flags(Flags::UPDATE) {
                    self.commit_text_update(node, current)?;
                }
            }
            WorkTag::Root | WorkTag::FunctionComponent | WorkTag::Indeterminate => {}
        }
        Ok(())
    }

    /// Clear text content before element children are placed into the
    /// instance. The `children: Null` entry is taken out of the payload.
    fn commit_text_reset(&mut self, node: NodeId, current: Option<NodeId>) -> Result<()> {
        let n = &mut self.arena[node];
        let Some(payload) = n.update_payload.as_mut() else {
            return Ok(());
        };
        let Some(position) = payload
            .iter()
            .position(|(name, value)| name == CHILDREN && value.is_null())
        else {
            return Ok(());
        };
        let reset: UpdatePayload = vec![payload.remove(position)];
        let Some(instance) = n.state_node.clone() else {
            return Ok(());
        };
        let tag = n.host_tag().unwrap_or_default().to_string();
        let new_props = props_of(n.memoized_props.as_ref());
        let old_props = props_of(current.and_then(|c| self.arena[c].memoized_props.as_ref()));

        self.host
            .apply_property_diff(&instance, &reset, &tag, &old_props, &new_props)
            .map_err(ReconcileError::host("apply_property_diff"))
    }

    fn commit_update(&mut self, node: NodeId, current: Option<NodeId>) -> Result<()> {
        let n = &mut self.arena[node];
        let Some(payload) = n.update_payload.take() else {
            return Ok(());
        };
        if payload.is_empty() {
            // Only the text reset, already applied.
            self.summary.updates.push(self.record(node));
            return Ok(());
        }
        let Some(instance) = n.state_node.clone() else {
            return Ok(());
        };
        let tag = n.host_tag().unwrap_or_default().to_string();
        let new_props = props_of(n.memoized_props.as_ref());
        let old_props = props_of(current.and_then(|c| self.arena[c].memoized_props.as_ref()));

        self.host
            .apply_property_diff(&instance, &payload, &tag, &old_props, &new_props)
            .map_err(ReconcileError::host("apply_property_diff"))?;
        self.summary.updates.push(self.record(node));
        Ok(())
    }

    fn commit_text_update(&mut self, node: NodeId, current: Option<NodeId>) -> Result<()> {
        let n = &self.arena[node];
        let Some(instance) = n.state_node.clone() else {
            return Ok(());
        };
        let new_text = text_of(n.memoized_props.as_ref());
        let old_text = text_of(current.and_then(|c| self.arena[c].memoized_props.as_ref()));

        self.host
            .commit_text_update(&instance, &old_text, &new_text)
            .map_err(ReconcileError::host("commit_text_update"))?;
        self.summary.updates.push(self.record(node));
        Ok(())
    }

    // =========================================================================
    // Placement
    // =========================================================================

    fn commit_placement(&mut self, node: NodeId) -> Result<()> {
        if !self.arena[node].has_flags(Flags::PLACEMENT) {
            return Ok(());
        }
        let parent = self
            .arena
            .host_parent(node)
            .and_then(|parent| self.host_instance_of(parent));
        if let Some(parent) = parent {
            let before = self.get_host_sibling(node);
            self.insert_or_append_placement_node(node, before.as_ref(), &parent)?;
        }
        self.arena[node].flags.remove(Flags::PLACEMENT);
        self.summary.placements.push(self.record(node));
        Ok(())
    }

    /// Host instance the placed node must be inserted before, if any.
    ///
    /// Walks forward through siblings, descending into non-host nodes and
    /// skipping nodes that are themselves about to be placed.
    fn get_host_sibling(&self, node: NodeId) -> Option<H::Instance> {
        let mut node = node;
        'siblings: loop {
            while self.arena[node].sibling.is_none() {
                match self.arena[node].parent {
                    Some(parent) if !self.arena[parent].tag.is_host_parent() => node = parent,
                    _ => return None,
                }
            }
            node = self.arena[node].sibling?;

            while !self.arena[node].tag.is_host() {
                if self.arena[node].has_flags(Flags::PLACEMENT) {
                    continue 'siblings;
                }
                match self.arena[node].child {
                    Some(child) => node = child,
                    None => continue 'siblings,
                }
            }

            if !self.arena[node].has_flags(Flags::PLACEMENT) {
                return self.arena[node].state_node.clone();
            }
        }
    }

    fn insert_or_append_placement_node(
        &mut self,
        node: NodeId,
        before: Option<&H::Instance>,
        parent: &H::Instance,
    ) -> Result<()> {
        let n = &self.arena[node];
        if n.tag.is_host() {
            let Some(instance) = n.state_node.clone() else {
                return Ok(());
            };
            match before {
                Some(before) => self
                    .host
                    .insert_before(parent, &instance, before)
                    .map_err(ReconcileError::host("insert_before")),
                None => self
                    .host
                    .append_child(parent, &instance)
                    .map_err(ReconcileError::host("append_child")),
            }
        } else {
            let mut child = n.child;
            while let Some(c) = child {
                self.insert_or_append_placement_node(c, before, parent)?;
                child = self.arena[c].sibling;
            }
            Ok(())
        }
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    fn commit_deletion_effects(&mut self, parent: NodeId, deleted: NodeId) -> Result<()> {
        let host_parent = self.nearest_host_instance(parent);
        self.summary.deletions.push(self.record(deleted));
        self.delete_subtree(deleted, host_parent.as_ref())
    }

    /// Tear down `node` and its subtree, children first.
    ///
    /// Every host instance is removed from its own host parent exactly once:
    /// descendants from the deleted instance, the topmost ones from
    /// `host_parent`.
    fn delete_subtree(&mut self, node: NodeId, host_parent: Option<&H::Instance>) -> Result<()> {
        let n = &self.arena[node];
        let tag = n.tag;
        let instance = n.state_node.clone();
        let children = self.arena.children(node);

        match tag {
            WorkTag::HostComponent | WorkTag::HostText => {
                if let Some(element_ref) = &self.arena[node].element_ref {
                    element_ref.detach();
                }
                for child in children {
                    self.delete_subtree(child, instance.as_ref())?;
                }
                if let (Some(parent), Some(instance)) = (host_parent, &instance) {
                    self.host
                        .remove_child(parent, instance)
                        .map_err(ReconcileError::host("remove_child"))?;
                }
            }
            WorkTag::FunctionComponent | WorkTag::Indeterminate | WorkTag::Root => {
                for child in children {
                    self.delete_subtree(child, host_parent)?;
                }
            }
        }

        self.to_free.push(node);
        if let Some(alternate) = self.arena[node].alternate {
            self.to_free.push(alternate);
        }
        Ok(())
    }

    // =========================================================================
    // Layout Pass
    // =========================================================================

    fn commit_layout_effects(&mut self, node: NodeId) {
        let n = &self.arena[node];
        if !(n.flags | n.subtree_flags).intersects(Flags::LAYOUT_MASK) {
            return;
        }

        if n.tag == WorkTag::HostComponent && n.has_flags(Flags::REF) {
            if let (Some(element_ref), Some(instance)) = (&n.element_ref, &n.state_node) {
                element_ref.attach(instance.clone());
            }
        }

        let mut child = n.child;
        while let Some(c) = child {
            self.commit_layout_effects(c);
            child = self.arena[c].sibling;
        }
    }
}

fn props_of(props: Option<&NodeProps>) -> Rc<Props> {
    match props {
        Some(NodeProps::Element(props)) => props.clone(),
        _ => Rc::default(),
    }
}

fn text_of(props: Option<&NodeProps>) -> Rc<str> {
    match props {
        Some(NodeProps::Text(text)) => text.clone(),
        _ => Rc::from(""),
    }
}

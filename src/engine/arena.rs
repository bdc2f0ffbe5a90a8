//! Node Arena - storage and lifecycle of work nodes.
//!
//! Manages the lifecycle of work nodes:
//! - Slab storage with O(1) reuse of freed slots
//! - Work-in-progress creation from a current node (double buffering)
//! - Node creation from elements and text
//! - An allocation journal so an abandoned render can be rolled back

use std::ops::{Index, IndexMut};
use std::rc::Rc;

use slab::Slab;

use super::node::{MemoizedState, NodeId, NodeProps, WorkNode};
use crate::state::{RootState, UpdateQueue};
use crate::types::{Element, ElementType, Flags, WorkTag};

/// Owner of every work node of one root, both generations.
#[derive(Debug)]
pub struct NodeArena<I> {
    nodes: Slab<WorkNode<I>>,
    journal: Option<Vec<NodeId>>,
}

impl<I> Default for NodeArena<I> {
    fn default() -> Self {
        Self {
            nodes: Slab::new(),
            journal: None,
        }
    }
}

impl<I: Clone> NodeArena<I> {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Storage
    // =========================================================================

    /// Store a node and return its id.
    pub fn alloc(&mut self, node: WorkNode<I>) -> NodeId {
        let id = NodeId(self.nodes.insert(node));
        if let Some(journal) = self.journal.as_mut() {
            journal.push(id);
        }
        id
    }

    /// Remove a node. Returns `None` if the id is not allocated.
    pub fn free(&mut self, id: NodeId) -> Option<WorkNode<I>> {
        self.nodes.try_remove(id.0)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(id.0)
    }

    pub fn get(&self, id: NodeId) -> Option<&WorkNode<I>> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut WorkNode<I>> {
        self.nodes.get_mut(id.0)
    }

    /// Number of allocated nodes (both generations).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // =========================================================================
    // Allocation Journal
    // =========================================================================

    /// Start recording every allocation.
    pub fn begin_journal(&mut self) {
        self.journal = Some(Vec::new());
    }

    /// Stop recording and return the ids allocated since `begin_journal`.
    pub fn take_journal(&mut self) -> Vec<NodeId> {
        self.journal.take().unwrap_or_default()
    }

    // =========================================================================
    // Node Creation
    // =========================================================================

    /// Create the root node with an empty update queue.
    pub fn create_host_root(&mut self) -> NodeId {
        let mut root = WorkNode::new(WorkTag::Root, NodeProps::Empty, None);
        root.memoized_state = MemoizedState::Root(RootState::default());
        root.update_queue = Some(Rc::new(UpdateQueue::new()));
        self.alloc(root)
    }

    /// Create a node from an element.
    ///
    /// Host tags become `HostComponent`. Components start `Indeterminate` and
    /// are re-tagged after their first render.
    pub fn create_from_element(&mut self, element: &Element) -> NodeId {
        let tag = match element.element_type {
            ElementType::Host(_) => WorkTag::HostComponent,
            ElementType::Component(_) => WorkTag::Indeterminate,
        };
        let mut node = WorkNode::new(
            tag,
            NodeProps::Element(element.props.clone()),
            element.key.clone(),
        );
        node.element_type = Some(element.element_type.clone());
        node.node_type = Some(element.element_type.clone());
        node.element_ref = element.element_ref.clone();
        self.alloc(node)
    }

    /// Create a text node.
    pub fn create_from_text(&mut self, text: Rc<str>) -> NodeId {
        self.alloc(WorkNode::new(WorkTag::HostText, NodeProps::Text(text), None))
    }

    /// Create (or reuse) the work-in-progress twin of `current`.
    ///
    /// If `current` already has an alternate it is reused and its transient
    /// fields (flags, subtree flags, deletions, update payload) are reset, so
    /// an instance never needs more than two nodes.
    pub fn create_work_in_progress(&mut self, current: NodeId, pending_props: NodeProps) -> NodeId {
        let wip = match self[current].alternate {
            Some(wip) => {
                let state_node = self[current].state_node.clone();
                let node_type = self[current].node_type.clone();
                let node = &mut self[wip];
                node.pending_props = pending_props;
                node.node_type = node_type;
                node.state_node = state_node;
                node.flags = Flags::NONE;
                node.subtree_flags = Flags::NONE;
                node.deletions.clear();
                node.update_payload = None;
                wip
            }
            None => {
                let source = &self[current];
                let mut node = WorkNode::new(source.tag, pending_props, source.key.clone());
                node.element_type = source.element_type.clone();
                node.node_type = source.node_type.clone();
                node.state_node = source.state_node.clone();
                node.alternate = Some(current);
                let wip = self.alloc(node);
                self[current].alternate = Some(wip);
                wip
            }
        };

        let source = &self[current];
        let tag = source.tag;
        let child = source.child;
        let sibling = source.sibling;
        let index = source.index;
        let parent = source.parent;
        let memoized_props = source.memoized_props.clone();
        let memoized_state = source.memoized_state.clone();
        let update_queue = source.update_queue.clone();
        let element_ref = source.element_ref.clone();

        let node = &mut self[wip];
        node.tag = tag;
        node.child = child;
        node.sibling = sibling;
        node.index = index;
        node.parent = parent;
        node.memoized_props = memoized_props;
        node.memoized_state = memoized_state;
        node.update_queue = update_queue;
        node.element_ref = element_ref;
        wip
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Walk parent links up to the Root node.
    ///
    /// Returns `None` if the chain ends somewhere else (detached node).
    pub fn find_root(&self, id: NodeId) -> Option<NodeId> {
        let mut node = id;
        loop {
            let current = self.get(node)?;
            match current.parent {
                Some(parent) => node = parent,
                None => return (current.tag == WorkTag::Root).then_some(node),
            }
        }
    }

    /// Direct children of a node, in sibling order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut children = Vec::new();
        let mut child = self[id].child;
        while let Some(c) = child {
            children.push(c);
            child = self[c].sibling;
        }
        children
    }

    /// Nearest ancestor that is a HostComponent or the Root.
    pub fn host_parent(&self, id: NodeId) -> Option<NodeId> {
        let mut parent = self[id].parent;
        while let Some(p) = parent {
            if self[p].tag.is_host_parent() {
                return Some(p);
            }
            parent = self[p].parent;
        }
        None
    }
}

impl<I> Index<NodeId> for NodeArena<I> {
    type Output = WorkNode<I>;

    fn index(&self, id: NodeId) -> &Self::Output {
        &self.nodes[id.0]
    }
}

impl<I> IndexMut<NodeId> for NodeArena<I> {
    fn index_mut(&mut self, id: NodeId) -> &mut Self::Output {
        &mut self.nodes[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Element, Node};

    fn setup() -> (NodeArena<u32>, NodeId) {
        let mut arena = NodeArena::new();
        let root = arena.create_host_root();
        (arena, root)
    }

    #[test]
    fn test_create_from_element_tags() {
        let (mut arena, _) = setup();
        let host = arena.create_from_element(&Element::host("div").key("a").build());
        assert_eq!(arena[host].tag, WorkTag::HostComponent);
        assert_eq!(arena[host].key.as_deref(), Some("a"));
        assert_eq!(arena[host].label(), "div");

        let component = crate::types::Component::new("App", |_, _| Node::Empty);
        let comp = arena.create_from_element(&Element::component(&component).build());
        assert_eq!(arena[comp].tag, WorkTag::Indeterminate);
        assert_eq!(arena[comp].label(), "App");
    }

    #[test]
    fn test_work_in_progress_reuses_alternate() {
        let (mut arena, root) = setup();

        let wip = arena.create_work_in_progress(root, NodeProps::Empty);
        assert_ne!(wip, root);
        assert_eq!(arena[wip].alternate, Some(root));
        assert_eq!(arena[root].alternate, Some(wip));

        arena[wip].flags = Flags::PLACEMENT;
        arena[wip].subtree_flags = Flags::UPDATE;
        arena[wip].deletions.push(NodeId(99));

        // Swap roles: wip becomes current, then build the next generation.
        let next = arena.create_work_in_progress(wip, NodeProps::Empty);
        assert_eq!(next, root);
        let again = arena.create_work_in_progress(root, NodeProps::Empty);
        assert_eq!(again, wip);
        assert_eq!(arena[again].flags, Flags::NONE);
        assert_eq!(arena[again].subtree_flags, Flags::NONE);
        assert!(arena[again].deletions.is_empty());
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_work_in_progress_shares_root_queue() {
        let (mut arena, root) = setup();
        let wip = arena.create_work_in_progress(root, NodeProps::Empty);

        let a = arena[root].update_queue.clone();
        let b = arena[wip].update_queue.clone();
        assert!(matches!((a, b), (Some(a), Some(b)) if Rc::ptr_eq(&a, &b)));
    }

    #[test]
    fn test_find_root() {
        let (mut arena, root) = setup();
        let child = arena.create_from_text("x".into());
        assert_eq!(arena.find_root(child), None);

        arena[child].parent = Some(root);
        assert_eq!(arena.find_root(child), Some(root));

        arena.free(root);
        assert_eq!(arena.find_root(child), None);
    }

    #[test]
    fn test_journal_records_allocations() {
        let (mut arena, root) = setup();
        arena.begin_journal();
        let wip = arena.create_work_in_progress(root, NodeProps::Empty);
        let text = arena.create_from_text("a".into());
        assert_eq!(arena.take_journal(), vec![wip, text]);

        arena.create_from_text("b".into());
        assert!(arena.take_journal().is_empty());
    }
}

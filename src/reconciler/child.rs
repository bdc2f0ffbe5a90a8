//! Child Reconciler - builds the next generation of one parent's children.
//!
//! Given the parent's current first child and the new child description, it
//! reuses, creates and deletes work nodes and tags the host effects the
//! commit phase needs:
//!
//! - single element: one scan over the current children by key and type
//! - single text: reuse a leading text node
//! - list: three-pass keyed diff with the last-placed-index move rule
//!
//! # Move detection
//!
//! ```text
//! old  [1, 2, 3]           indices 0, 1, 2
//! new  [3, 1, 2]
//!
//! 3: old index 2 ≥ last_placed 0  → stays,  last_placed = 2
//! 1: old index 0 <  last_placed 2 → PLACEMENT (moved)
//! 2: old index 1 <  last_placed 2 → PLACEMENT (moved)
//! ```
//!
//! Linear and not minimal: a node is only ever moved forward relative to
//! the highest old index already kept in place.

use std::collections::HashMap;
use std::rc::Rc;

use crate::engine::{NodeArena, NodeId, NodeProps};
use crate::types::{Element, Flags, Key, Node, WorkTag};

/// Lookup key of an old child in the third pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MapKey {
    Key(Key),
    Index(usize),
}

/// Reconciles the children of one parent.
///
/// A mounting reconciler (`track_side_effects == false`) never tags
/// placements or deletions: the whole new subtree is inserted by the
/// placement of its topmost node.
pub struct ChildReconciler<'a, I> {
    arena: &'a mut NodeArena<I>,
    track_side_effects: bool,
}

impl<'a, I: Clone> ChildReconciler<'a, I> {
    /// Reconciler for a parent that has a current node.
    pub fn tracking(arena: &'a mut NodeArena<I>) -> Self {
        Self {
            arena,
            track_side_effects: true,
        }
    }

    /// Reconciler for a parent that is being mounted.
    pub fn mounting(arena: &'a mut NodeArena<I>) -> Self {
        Self {
            arena,
            track_side_effects: false,
        }
    }

    /// Reconcile `new_child` against the current children starting at
    /// `current_first`. Returns the first new child.
    pub fn reconcile_child_nodes(
        &mut self,
        parent: NodeId,
        current_first: Option<NodeId>,
        new_child: &Node,
    ) -> Option<NodeId> {
        match new_child {
            Node::Element(element) => {
                let child = self.reconcile_single_element(parent, current_first, element);
                Some(self.place_single_child(child))
            }
            Node::Text(text) if !text.is_empty() => {
                let child = self.reconcile_single_text_node(parent, current_first, text);
                Some(self.place_single_child(child))
            }
            Node::List(children) => self.reconcile_children_array(parent, current_first, children),
            _ => {
                self.delete_remaining_children(parent, current_first);
                None
            }
        }
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    fn delete_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.track_side_effects {
            return;
        }
        let node = &mut self.arena[parent];
        node.deletions.push(child);
        node.flags |= Flags::CHILD_DELETION;
    }

    fn delete_remaining_children(&mut self, parent: NodeId, first: Option<NodeId>) {
        if !self.track_side_effects {
            return;
        }
        let mut child = first;
        while let Some(c) = child {
            self.delete_child(parent, c);
            child = self.arena[c].sibling;
        }
    }

    // =========================================================================
    // Node reuse and creation
    // =========================================================================

    /// Work-in-progress twin of `current` as the only child so far.
    fn use_node(&mut self, current: NodeId, pending_props: NodeProps) -> NodeId {
        let clone = self.arena.create_work_in_progress(current, pending_props);
        let node = &mut self.arena[clone];
        node.index = 0;
        node.sibling = None;
        clone
    }

    fn update_text_node(&mut self, parent: NodeId, current: Option<NodeId>, text: &Rc<str>) -> NodeId {
        let node = match current {
            Some(current) if self.arena[current].tag == WorkTag::HostText => {
                self.use_node(current, NodeProps::Text(text.clone()))
            }
            _ => self.arena.create_from_text(text.clone()),
        };
        self.arena[node].parent = Some(parent);
        node
    }

    fn update_element(&mut self, parent: NodeId, current: Option<NodeId>, element: &Element) -> NodeId {
        let node = match current {
            Some(current)
                if self.arena[current].element_type.as_ref() == Some(&element.element_type) =>
            {
                let existing = self.use_node(current, NodeProps::Element(element.props.clone()));
                self.arena[existing].element_ref = element.element_ref.clone();
                existing
            }
            _ => self.arena.create_from_element(element),
        };
        self.arena[node].parent = Some(parent);
        node
    }

    fn create_child(&mut self, parent: NodeId, new_child: &Node) -> Option<NodeId> {
        let node = match new_child {
            Node::Text(text) if !text.is_empty() => self.arena.create_from_text(text.clone()),
            Node::Element(element) => self.arena.create_from_element(element),
            // Nested lists and empty values render nothing.
            _ => return None,
        };
        self.arena[node].parent = Some(parent);
        Some(node)
    }

    /// Update `old` in place if `new_child` has the same key, else `None`.
    fn update_slot(&mut self, parent: NodeId, old: Option<NodeId>, new_child: &Node) -> Option<NodeId> {
        let key = old.and_then(|old| self.arena[old].key.clone());
        match new_child {
            Node::Text(text) if !text.is_empty() => {
                // Text has no key; a keyed old node cannot be reused for it.
                if key.is_some() {
                    return None;
                }
                Some(self.update_text_node(parent, old, text))
            }
            Node::Element(element) if element.key == key => {
                Some(self.update_element(parent, old, element))
            }
            _ => None,
        }
    }

    fn update_from_map(
        &mut self,
        existing: &HashMap<MapKey, NodeId>,
        parent: NodeId,
        new_index: usize,
        new_child: &Node,
    ) -> Option<NodeId> {
        match new_child {
            Node::Text(text) if !text.is_empty() => {
                let matched = existing.get(&MapKey::Index(new_index)).copied();
                Some(self.update_text_node(parent, matched, text))
            }
            Node::Element(element) => {
                let lookup = match &element.key {
                    Some(key) => MapKey::Key(key.clone()),
                    None => MapKey::Index(new_index),
                };
                let matched = existing.get(&lookup).copied();
                Some(self.update_element(parent, matched, element))
            }
            _ => None,
        }
    }

    // =========================================================================
    // Placement
    // =========================================================================

    fn place_child(&mut self, node: NodeId, last_placed_index: usize, new_index: usize) -> usize {
        self.arena[node].index = new_index;
        if !self.track_side_effects {
            return last_placed_index;
        }
        match self.arena[node].alternate {
            Some(current) => {
                let old_index = self.arena[current].index;
                if old_index < last_placed_index {
                    // Moved.
                    self.arena[node].flags |= Flags::PLACEMENT;
                    last_placed_index
                } else {
                    old_index
                }
            }
            None => {
                self.arena[node].flags |= Flags::PLACEMENT;
                last_placed_index
            }
        }
    }

    fn place_single_child(&mut self, node: NodeId) -> NodeId {
        if self.track_side_effects && self.arena[node].alternate.is_none() {
            self.arena[node].flags |= Flags::PLACEMENT;
        }
        node
    }

    // =========================================================================
    // Single child
    // =========================================================================

    fn reconcile_single_element(
        &mut self,
        parent: NodeId,
        current_first: Option<NodeId>,
        element: &Element,
    ) -> NodeId {
        let mut child = current_first;
        while let Some(c) = child {
            if self.arena[c].key == element.key {
                if self.arena[c].element_type.as_ref() == Some(&element.element_type) {
                    let rest = self.arena[c].sibling;
                    self.delete_remaining_children(parent, rest);
                    let existing = self.use_node(c, NodeProps::Element(element.props.clone()));
                    let node = &mut self.arena[existing];
                    node.element_ref = element.element_ref.clone();
                    node.parent = Some(parent);
                    return existing;
                }
                // Same key, different type: nothing after it can match either.
                self.delete_remaining_children(parent, Some(c));
                break;
            }
            self.delete_child(parent, c);
            child = self.arena[c].sibling;
        }

        let created = self.arena.create_from_element(element);
        self.arena[created].parent = Some(parent);
        created
    }

    fn reconcile_single_text_node(
        &mut self,
        parent: NodeId,
        current_first: Option<NodeId>,
        text: &Rc<str>,
    ) -> NodeId {
        if let Some(first) = current_first {
            if self.arena[first].tag == WorkTag::HostText {
                let rest = self.arena[first].sibling;
                self.delete_remaining_children(parent, rest);
                let existing = self.use_node(first, NodeProps::Text(text.clone()));
                self.arena[existing].parent = Some(parent);
                return existing;
            }
        }
        self.delete_remaining_children(parent, current_first);
        let created = self.arena.create_from_text(text.clone());
        self.arena[created].parent = Some(parent);
        created
    }

    // =========================================================================
    // Lists
    // =========================================================================

    fn reconcile_children_array(
        &mut self,
        parent: NodeId,
        current_first: Option<NodeId>,
        new_children: &[Node],
    ) -> Option<NodeId> {
        let mut result_first: Option<NodeId> = None;
        let mut previous_new: Option<NodeId> = None;

        let mut old_node = current_first;
        let mut last_placed_index = 0;
        let mut new_index = 0;

        // Pass 1: walk both lists while keys line up.
        while let Some(old) = old_node {
            if new_index >= new_children.len() {
                break;
            }
            // An old node whose index is ahead of us (holes from ignored
            // children) is compared against nothing for this slot.
            let (slot_old, next_old) = if self.arena[old].index > new_index {
                (None, Some(old))
            } else {
                (Some(old), self.arena[old].sibling)
            };

            let Some(new_node) = self.update_slot(parent, slot_old, &new_children[new_index]) else {
                break;
            };
            if let Some(slot_old) = slot_old {
                if self.track_side_effects && self.arena[new_node].alternate.is_none() {
                    // Matched the slot but could not reuse it.
                    self.delete_child(parent, slot_old);
                }
            }
            last_placed_index = self.place_child(new_node, last_placed_index, new_index);
            self.link(&mut result_first, &mut previous_new, new_node);
            old_node = next_old;
            new_index += 1;
        }

        // Pass 2a: new list consumed, drop what is left.
        if new_index == new_children.len() {
            self.delete_remaining_children(parent, old_node);
            return result_first;
        }

        // Pass 2b: old list consumed, everything left is new.
        if old_node.is_none() {
            for (index, child) in new_children.iter().enumerate().skip(new_index) {
                let Some(new_node) = self.create_child(parent, child) else {
                    continue;
                };
                last_placed_index = self.place_child(new_node, last_placed_index, index);
                self.link(&mut result_first, &mut previous_new, new_node);
            }
            return result_first;
        }

        // Pass 3: resolve the rest through a key/index map.
        let mut existing = self.map_remaining_children(parent, old_node);
        for (index, child) in new_children.iter().enumerate().skip(new_index) {
            let Some(new_node) = self.update_from_map(&existing, parent, index, child) else {
                continue;
            };
            if self.track_side_effects && self.arena[new_node].alternate.is_some() {
                let used = match &self.arena[new_node].key {
                    Some(key) => MapKey::Key(key.clone()),
                    None => MapKey::Index(index),
                };
                existing.remove(&used);
            }
            last_placed_index = self.place_child(new_node, last_placed_index, index);
            self.link(&mut result_first, &mut previous_new, new_node);
        }

        if self.track_side_effects {
            let mut leftovers: Vec<NodeId> = existing.into_values().collect();
            leftovers.sort_by_key(|&id| self.arena[id].index);
            for old in leftovers {
                self.delete_child(parent, old);
            }
        }

        result_first
    }

    fn map_remaining_children(
        &mut self,
        parent: NodeId,
        first: Option<NodeId>,
    ) -> HashMap<MapKey, NodeId> {
        let mut existing = HashMap::new();
        let mut shadowed = Vec::new();
        let mut child = first;
        while let Some(c) = child {
            let node = &self.arena[c];
            let map_key = match &node.key {
                Some(key) => MapKey::Key(key.clone()),
                None => MapKey::Index(node.index),
            };
            if let Some(previous) = existing.insert(map_key, c) {
                tracing::warn!(
                    key = ?node.key,
                    parent = %parent,
                    "duplicate key among siblings, only the last one is kept"
                );
                shadowed.push(previous);
            }
            child = node.sibling;
        }
        for node in shadowed {
            self.delete_child(parent, node);
        }
        existing
    }

    fn link(&mut self, first: &mut Option<NodeId>, previous: &mut Option<NodeId>, node: NodeId) {
        match *previous {
            Some(prev) => self.arena[prev].sibling = Some(node),
            None => *first = Some(node),
        }
        *previous = Some(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Element;
    use pretty_assertions::assert_eq;

    struct Fixture {
        arena: NodeArena<u32>,
        parent: NodeId,
    }

    fn setup() -> Fixture {
        let mut arena = NodeArena::new();
        let parent = arena.create_host_root();
        Fixture { arena, parent }
    }

    fn item(key: &str) -> Node {
        Element::host("li").key(key).build().into()
    }

    fn keyed(keys: &[&str]) -> Node {
        Node::List(keys.iter().map(|k| item(k)).collect())
    }

    impl Fixture {
        /// Mount `children` and pretend they were committed: return the
        /// first child of the new "current" parent.
        fn mount(&mut self, children: &Node) -> Option<NodeId> {
            let first = ChildReconciler::mounting(&mut self.arena).reconcile_child_nodes(
                self.parent,
                None,
                children,
            );
            self.arena[self.parent].child = first;
            first
        }

        fn update(&mut self, current_first: Option<NodeId>, children: &Node) -> (NodeId, Option<NodeId>) {
            let wip = self.arena.create_work_in_progress(self.parent, NodeProps::Empty);
            let first = ChildReconciler::tracking(&mut self.arena).reconcile_child_nodes(
                wip,
                current_first,
                children,
            );
            self.arena[wip].child = first;
            (wip, first)
        }

        fn keys(&self, first: Option<NodeId>) -> Vec<String> {
            let mut keys = Vec::new();
            let mut child = first;
            while let Some(c) = child {
                keys.push(self.arena[c].key.as_deref().unwrap_or("-").to_string());
                child = self.arena[c].sibling;
            }
            keys
        }

        fn placed(&self, first: Option<NodeId>) -> Vec<String> {
            let mut keys = Vec::new();
            let mut child = first;
            while let Some(c) = child {
                if self.arena[c].has_flags(Flags::PLACEMENT) {
                    keys.push(self.arena[c].key.as_deref().unwrap_or("-").to_string());
                }
                child = self.arena[c].sibling;
            }
            keys
        }

        fn deleted_keys(&self, parent: NodeId) -> Vec<String> {
            self.arena[parent]
                .deletions
                .iter()
                .map(|&d| self.arena[d].key.as_deref().unwrap_or("-").to_string())
                .collect()
        }
    }

    #[test]
    fn test_mount_tags_nothing() {
        let mut fx = setup();
        let first = fx.mount(&keyed(&["a", "b"]));
        assert_eq!(fx.keys(first), vec!["a", "b"]);
        assert!(fx.placed(first).is_empty());
        assert!(fx.arena[fx.parent].deletions.is_empty());
    }

    #[test]
    fn test_move_to_front_uses_last_placed_index() {
        let mut fx = setup();
        let current = fx.mount(&keyed(&["1", "2", "3"]));
        let old_ids: Vec<NodeId> = fx.arena.children(fx.parent);

        let (wip, first) = fx.update(current, &keyed(&["3", "1", "2"]));
        assert_eq!(fx.keys(first), vec!["3", "1", "2"]);
        assert_eq!(fx.placed(first), vec!["1", "2"]);
        assert!(fx.arena[wip].deletions.is_empty());

        // Every new node is the alternate of an old one.
        let mut child = first;
        while let Some(c) = child {
            let alternate = fx.arena[c].alternate.unwrap();
            assert!(old_ids.contains(&alternate));
            child = fx.arena[c].sibling;
        }
    }

    #[test]
    fn test_append_is_not_a_move() {
        let mut fx = setup();
        let current = fx.mount(&keyed(&["a", "b"]));
        let (wip, first) = fx.update(current, &keyed(&["a", "b", "c"]));
        assert_eq!(fx.placed(first), vec!["c"]);
        assert!(fx.arena[wip].deletions.is_empty());
    }

    #[test]
    fn test_removed_keys_are_deleted() {
        let mut fx = setup();
        let current = fx.mount(&keyed(&["a", "b", "c", "d"]));
        let (wip, first) = fx.update(current, &keyed(&["d", "b"]));
        assert_eq!(fx.keys(first), vec!["d", "b"]);
        assert_eq!(fx.deleted_keys(wip), vec!["a", "c"]);
        assert!(fx.arena[wip].has_flags(Flags::CHILD_DELETION));
        assert_eq!(fx.placed(first), vec!["b"]);
    }

    #[test]
    fn test_truncated_list_deletes_tail() {
        let mut fx = setup();
        let current = fx.mount(&keyed(&["a", "b", "c"]));
        let (wip, first) = fx.update(current, &keyed(&["a"]));
        assert_eq!(fx.keys(first), vec!["a"]);
        assert_eq!(fx.deleted_keys(wip), vec!["b", "c"]);
        assert!(fx.placed(first).is_empty());
    }

    #[test]
    fn test_type_change_replaces_node() {
        let mut fx = setup();
        let current = fx.mount(&Node::List(vec![Element::host("p").key("a").build().into()]));
        let (wip, first) = fx.update(
            current,
            &Node::List(vec![Element::host("div").key("a").build().into()]),
        );
        let first = first.unwrap();
        assert_eq!(fx.arena[first].alternate, None);
        assert!(fx.arena[first].has_flags(Flags::PLACEMENT));
        assert_eq!(fx.arena[wip].deletions, vec![current.unwrap()]);
    }

    #[test]
    fn test_single_element_scans_by_key() {
        let mut fx = setup();
        let current = fx.mount(&keyed(&["a", "b", "c"]));
        let b = fx.arena[current.unwrap()].sibling.unwrap();

        let (wip, first) = fx.update(current, &item("b"));
        let first = first.unwrap();
        assert_eq!(fx.arena[first].alternate, Some(b));
        assert!(!fx.arena[first].has_flags(Flags::PLACEMENT));
        assert_eq!(fx.deleted_keys(wip), vec!["a", "c"]);
    }

    #[test]
    fn test_single_text_reuses_text_node() {
        let mut fx = setup();
        let current = fx.mount(&Node::from("x"));
        let (wip, first) = fx.update(current, &Node::from("y"));
        let first = first.unwrap();
        assert_eq!(fx.arena[first].alternate, current);
        assert_eq!(fx.arena[first].pending_props.as_text(), Some("y"));
        assert!(fx.arena[wip].deletions.is_empty());
    }

    #[test]
    fn test_empty_and_nested_lists_render_nothing() {
        let mut fx = setup();
        let first = fx.mount(&Node::List(vec![
            Node::from(""),
            Node::List(vec![item("x")]),
            Node::Empty,
            item("a"),
        ]));
        assert_eq!(fx.keys(first), vec!["a"]);
        assert_eq!(fx.arena[first.unwrap()].index, 3);

        let (wip, first) = fx.update(first, &Node::Empty);
        assert_eq!(first, None);
        assert_eq!(fx.deleted_keys(wip), vec!["a"]);
    }

    #[test]
    fn test_duplicate_keys_delete_shadowed_node() {
        let mut fx = setup();
        let current = fx.mount(&keyed(&["a", "a", "b"]));
        let (wip, first) = fx.update(current, &keyed(&["b", "a"]));
        assert_eq!(fx.keys(first), vec!["b", "a"]);
        // The first "a" was shadowed in the map and must still be removed.
        assert_eq!(fx.deleted_keys(wip), vec!["a"]);
        assert_eq!(fx.arena[wip].deletions, vec![current.unwrap()]);
    }
}

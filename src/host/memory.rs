//! MemoryHost - an in-memory host tree.
//!
//! Nodes live in a slab and are addressed by [`HostHandle`]. Every host call
//! is recorded in an operation log, so tests can assert exactly which
//! mutations a commit performed:
//!
//! ```ignore
//! let mut host = MemoryHost::new();
//! let container = host.create_container();
//! // ... render ...
//! assert_eq!(host.markup(container), r#"<div id="a">x</div>"#);
//! assert_eq!(host.count_ops(|op| matches!(op, HostOp::RemoveChild { .. })), 0);
//! ```
//!
//! Inserting a node that is already attached moves it (DOM semantics).

use std::collections::HashSet;
use std::fmt::Write as _;

use indexmap::IndexMap;
use slab::Slab;
use thiserror::Error;

use super::Host;
use super::props::UpdatePayload;
use crate::types::{Node, PropValue, Props};

// =============================================================================
// Handles, Nodes, Operations
// =============================================================================

/// Handle of a node in a [`MemoryHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostHandle(usize);

#[derive(Debug, Clone)]
enum HostNodeKind {
    Container,
    Element {
        tag: String,
        props: IndexMap<String, PropValue>,
        style: IndexMap<String, String>,
        text_content: Option<String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct HostNode {
    kind: HostNodeKind,
    parent: Option<HostHandle>,
    children: Vec<HostHandle>,
}

/// One recorded host call.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    CreateInstance { handle: HostHandle, tag: String },
    CreateText { handle: HostHandle, text: String },
    AppendInitialChild { parent: HostHandle, child: HostHandle },
    AppendChild { parent: HostHandle, child: HostHandle },
    InsertBefore { parent: HostHandle, child: HostHandle, before: HostHandle },
    RemoveChild { parent: HostHandle, child: HostHandle },
    ApplyDiff { handle: HostHandle, payload: UpdatePayload },
    TextUpdate { handle: HostHandle, text: String },
    ClearContainer { container: HostHandle },
}

#[derive(Debug, Error)]
pub enum MemoryHostError {
    #[error("injected failure while creating `{tag}`")]
    InjectedFailure { tag: String },

    #[error("injected failure in {operation}")]
    InjectedOperationFailure { operation: &'static str },

    #[error("unknown host node {0:?}")]
    UnknownNode(HostHandle),

    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild { parent: HostHandle, child: HostHandle },

    #[error("host node {0:?} is not an element")]
    NotAnElement(HostHandle),
}

// =============================================================================
// MemoryHost
// =============================================================================

/// In-memory [`Host`] implementation.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Slab<HostNode>,
    ops: Vec<HostOp>,
    failing_tags: HashSet<String>,
    failing_operations: HashSet<&'static str>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached container node to render into.
    pub fn create_container(&mut self) -> HostHandle {
        self.insert(HostNodeKind::Container)
    }

    /// Make every later `create_instance(tag)` fail.
    pub fn fail_on_create(&mut self, tag: &str) {
        self.failing_tags.insert(tag.to_string());
    }

    /// Make every later call of a mutation fail, by method name
    /// (`append_child`, `insert_before`, `remove_child`,
    /// `apply_property_diff`, `commit_text_update`).
    pub fn fail_on_operation(&mut self, operation: &'static str) {
        self.failing_operations.insert(operation);
    }

    pub fn clear_failures(&mut self) {
        self.failing_tags.clear();
        self.failing_operations.clear();
    }

    // =========================================================================
    // Operation Log
    // =========================================================================

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn count_ops(&self, predicate: impl Fn(&HostOp) -> bool) -> usize {
        self.ops.iter().filter(|op| predicate(op)).count()
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn children(&self, handle: HostHandle) -> Vec<HostHandle> {
        self.nodes
            .get(handle.0)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    pub fn parent(&self, handle: HostHandle) -> Option<HostHandle> {
        self.nodes.get(handle.0).and_then(|node| node.parent)
    }

    /// Tag of an element node.
    pub fn tag(&self, handle: HostHandle) -> Option<&str> {
        match &self.nodes.get(handle.0)?.kind {
            HostNodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Content of a text node, or the text content of an element.
    pub fn text(&self, handle: HostHandle) -> Option<&str> {
        match &self.nodes.get(handle.0)?.kind {
            HostNodeKind::Text(text) => Some(text),
            HostNodeKind::Element { text_content, .. } => text_content.as_deref(),
            HostNodeKind::Container => None,
        }
    }

    pub fn prop(&self, handle: HostHandle, name: &str) -> Option<&PropValue> {
        match &self.nodes.get(handle.0)?.kind {
            HostNodeKind::Element { props, .. } => props.get(name),
            _ => None,
        }
    }

    pub fn style(&self, handle: HostHandle) -> Option<&IndexMap<String, String>> {
        match &self.nodes.get(handle.0)?.kind {
            HostNodeKind::Element { style, .. } => Some(style),
            _ => None,
        }
    }

    /// Number of nodes attached under `root`, excluding `root` itself.
    pub fn descendant_count(&self, root: HostHandle) -> usize {
        self.children(root)
            .into_iter()
            .map(|child| 1 + self.descendant_count(child))
            .sum()
    }

    /// Serialize the subtree under `handle` (a container prints only its children).
    pub fn markup(&self, handle: HostHandle) -> String {
        let mut out = String::new();
        self.write_markup(handle, &mut out);
        out
    }

    fn write_markup(&self, handle: HostHandle, out: &mut String) {
        let Some(node) = self.nodes.get(handle.0) else {
            return;
        };
        match &node.kind {
            HostNodeKind::Container => {
                for &child in &node.children {
                    self.write_markup(child, out);
                }
            }
            HostNodeKind::Text(text) => out.push_str(text),
            HostNodeKind::Element {
                tag,
                props,
                style,
                text_content,
            } => {
                let _ = write!(out, "<{tag}");
                for (name, value) in props {
                    let _ = write!(out, " {name}=\"{value}\"");
                }
                if !style.is_empty() {
                    let style = PropValue::Style(style.clone());
                    let _ = write!(out, " style=\"{style}\"");
                }
                out.push('>');
                if let Some(text) = text_content {
                    out.push_str(text);
                }
                for &child in &node.children {
                    self.write_markup(child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn insert(&mut self, kind: HostNodeKind) -> HostHandle {
        HostHandle(self.nodes.insert(HostNode {
            kind,
            parent: None,
            children: Vec::new(),
        }))
    }

    fn node_mut(&mut self, handle: HostHandle) -> Result<&mut HostNode, MemoryHostError> {
        self.nodes
            .get_mut(handle.0)
            .ok_or(MemoryHostError::UnknownNode(handle))
    }

    fn check_injected(&self, operation: &'static str) -> Result<(), MemoryHostError> {
        if self.failing_operations.contains(operation) {
            return Err(MemoryHostError::InjectedOperationFailure { operation });
        }
        Ok(())
    }

    fn check(&self, handle: HostHandle) -> Result<(), MemoryHostError> {
        if self.nodes.contains(handle.0) {
            Ok(())
        } else {
            Err(MemoryHostError::UnknownNode(handle))
        }
    }

    /// Detach `child` from wherever it currently is.
    fn detach(&mut self, child: HostHandle) -> Result<(), MemoryHostError> {
        if let Some(parent) = self.node_mut(child)?.parent.take() {
            self.node_mut(parent)?.children.retain(|&c| c != child);
        }
        Ok(())
    }

    fn element_mut(
        &mut self,
        handle: HostHandle,
    ) -> Result<
        (
            &mut IndexMap<String, PropValue>,
            &mut IndexMap<String, String>,
            &mut Option<String>,
        ),
        MemoryHostError,
    > {
        match &mut self.node_mut(handle)?.kind {
            HostNodeKind::Element {
                props,
                style,
                text_content,
                ..
            } => Ok((props, style, text_content)),
            _ => Err(MemoryHostError::NotAnElement(handle)),
        }
    }
}

impl Host for MemoryHost {
    type Instance = HostHandle;
    type Error = MemoryHostError;

    fn create_instance(&mut self, tag: &str, _props: &Props) -> Result<HostHandle, MemoryHostError> {
        if self.failing_tags.contains(tag) {
            return Err(MemoryHostError::InjectedFailure {
                tag: tag.to_string(),
            });
        }
        let handle = self.insert(HostNodeKind::Element {
            tag: tag.to_string(),
            props: IndexMap::new(),
            style: IndexMap::new(),
            text_content: None,
        });
        self.ops.push(HostOp::CreateInstance {
            handle,
            tag: tag.to_string(),
        });
        Ok(handle)
    }

    fn create_text_instance(&mut self, text: &str) -> Result<HostHandle, MemoryHostError> {
        let handle = self.insert(HostNodeKind::Text(text.to_string()));
        self.ops.push(HostOp::CreateText {
            handle,
            text: text.to_string(),
        });
        Ok(handle)
    }

    fn append_initial_child(
        &mut self,
        parent: &HostHandle,
        child: &HostHandle,
    ) -> Result<(), MemoryHostError> {
        self.check(*parent)?;
        self.detach(*child)?;
        self.node_mut(*parent)?.children.push(*child);
        self.node_mut(*child)?.parent = Some(*parent);
        self.ops.push(HostOp::AppendInitialChild {
            parent: *parent,
            child: *child,
        });
        Ok(())
    }

    fn finalize_initial_children(
        &mut self,
        instance: &HostHandle,
        _tag: &str,
        props: &Props,
    ) -> Result<(), MemoryHostError> {
        let (values, style, text_content) = self.element_mut(*instance)?;
        for (name, value) in &props.values {
            match value {
                PropValue::Null => {}
                PropValue::Style(entries) => style.extend(entries.clone()),
                _ => {
                    values.insert(name.clone(), value.clone());
                }
            }
        }
        if let Node::Text(text) = &props.children {
            *text_content = Some(text.to_string());
        }
        Ok(())
    }

    fn append_child(&mut self, parent: &HostHandle, child: &HostHandle) -> Result<(), MemoryHostError> {
        self.check_injected("append_child")?;
        self.check(*parent)?;
        self.detach(*child)?;
        self.node_mut(*parent)?.children.push(*child);
        self.node_mut(*child)?.parent = Some(*parent);
        self.ops.push(HostOp::AppendChild {
            parent: *parent,
            child: *child,
        });
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: &HostHandle,
        child: &HostHandle,
        before: &HostHandle,
    ) -> Result<(), MemoryHostError> {
        self.check_injected("insert_before")?;
        self.check(*parent)?;
        self.detach(*child)?;
        let siblings = &mut self.node_mut(*parent)?.children;
        let Some(position) = siblings.iter().position(|c| c == before) else {
            return Err(MemoryHostError::NotAChild {
                parent: *parent,
                child: *before,
            });
        };
        siblings.insert(position, *child);
        self.node_mut(*child)?.parent = Some(*parent);
        self.ops.push(HostOp::InsertBefore {
            parent: *parent,
            child: *child,
            before: *before,
        });
        Ok(())
    }

    fn remove_child(&mut self, parent: &HostHandle, child: &HostHandle) -> Result<(), MemoryHostError> {
        self.check_injected("remove_child")?;
        if self.parent(*child) != Some(*parent) {
            return Err(MemoryHostError::NotAChild {
                parent: *parent,
                child: *child,
            });
        }
        self.detach(*child)?;
        self.ops.push(HostOp::RemoveChild {
            parent: *parent,
            child: *child,
        });
        Ok(())
    }

    fn clear_container(&mut self, container: &HostHandle) -> Result<(), MemoryHostError> {
        for child in self.children(*container) {
            self.detach(child)?;
        }
        self.ops.push(HostOp::ClearContainer {
            container: *container,
        });
        Ok(())
    }

    fn apply_property_diff(
        &mut self,
        instance: &HostHandle,
        payload: &UpdatePayload,
        _tag: &str,
        _old: &Props,
        _new: &Props,
    ) -> Result<(), MemoryHostError> {
        self.check_injected("apply_property_diff")?;
        let (values, style, text_content) = self.element_mut(*instance)?;
        for (name, value) in payload {
            match (name.as_str(), value) {
                ("children", PropValue::Null) => *text_content = None,
                ("children", value) => *text_content = Some(value.to_string()),
                ("style", PropValue::Style(entries)) => {
                    for (style_name, style_value) in entries {
                        if style_value.is_empty() {
                            style.shift_remove(style_name);
                        } else {
                            style.insert(style_name.clone(), style_value.clone());
                        }
                    }
                }
                (_, PropValue::Null) => {
                    values.shift_remove(name);
                }
                _ => {
                    values.insert(name.clone(), value.clone());
                }
            }
        }
        self.ops.push(HostOp::ApplyDiff {
            handle: *instance,
            payload: payload.clone(),
        });
        Ok(())
    }

    fn commit_text_update(
        &mut self,
        instance: &HostHandle,
        _old: &str,
        new: &str,
    ) -> Result<(), MemoryHostError> {
        self.check_injected("commit_text_update")?;
        match &mut self.node_mut(*instance)?.kind {
            HostNodeKind::Text(text) => *text = new.to_string(),
            _ => return Err(MemoryHostError::NotAnElement(*instance)),
        }
        self.ops.push(HostOp::TextUpdate {
            handle: *instance,
            text: new.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Element;
    use pretty_assertions::assert_eq;

    fn setup() -> (MemoryHost, HostHandle) {
        let mut host = MemoryHost::new();
        let container = host.create_container();
        (host, container)
    }

    fn element(host: &mut MemoryHost, builder: crate::types::ElementBuilder) -> HostHandle {
        let element = builder.build();
        let tag = element.element_type.label().to_string();
        let handle = host.create_instance(&tag, &element.props).unwrap();
        host.finalize_initial_children(&handle, &tag, &element.props)
            .unwrap();
        handle
    }

    #[test]
    fn test_markup_with_props_style_and_text() {
        let (mut host, container) = setup();
        let div = element(
            &mut host,
            Element::host("div")
                .prop("id", "a")
                .style([("color", "red")])
                .content("x"),
        );
        host.append_child(&container, &div).unwrap();
        assert_eq!(
            host.markup(container),
            r#"<div id="a" style="color:red">x</div>"#
        );
    }

    #[test]
    fn test_insert_before_moves_attached_node() {
        let (mut host, container) = setup();
        let a = host.create_text_instance("a").unwrap();
        let b = host.create_text_instance("b").unwrap();
        let c = host.create_text_instance("c").unwrap();
        for child in [a, b, c] {
            host.append_child(&container, &child).unwrap();
        }

        host.insert_before(&container, &c, &a).unwrap();
        assert_eq!(host.markup(container), "cab");
        assert_eq!(host.children(container), vec![c, a, b]);

        host.append_child(&container, &c).unwrap();
        assert_eq!(host.markup(container), "abc");
    }

    #[test]
    fn test_remove_child_requires_parent() {
        let (mut host, container) = setup();
        let a = host.create_text_instance("a").unwrap();
        assert!(matches!(
            host.remove_child(&container, &a),
            Err(MemoryHostError::NotAChild { .. })
        ));

        host.append_child(&container, &a).unwrap();
        host.remove_child(&container, &a).unwrap();
        assert_eq!(host.parent(a), None);
        assert_eq!(host.markup(container), "");
    }

    #[test]
    fn test_apply_property_diff() {
        let (mut host, _) = setup();
        let old = Element::host("div")
            .prop("id", "a")
            .prop("title", "t")
            .style([("color", "red")])
            .content("x")
            .build();
        let new = Element::host("div")
            .prop("id", "b")
            .style([("margin", "1")])
            .content("y")
            .build();
        let handle = host.create_instance("div", &old.props).unwrap();
        host.finalize_initial_children(&handle, "div", &old.props)
            .unwrap();

        let payload = host
            .diff_properties("div", &old.props, &new.props)
            .unwrap();
        host.apply_property_diff(&handle, &payload, "div", &old.props, &new.props)
            .unwrap();

        assert_eq!(host.markup(handle), r#"<div id="b" style="margin:1">y</div>"#);
    }

    #[test]
    fn test_injected_failure() {
        let (mut host, _) = setup();
        host.fail_on_create("img");
        let err = host.create_instance("img", &Props::default()).unwrap_err();
        assert_eq!(err.to_string(), "injected failure while creating `img`");

        host.clear_failures();
        assert!(host.create_instance("img", &Props::default()).is_ok());
    }

    #[test]
    fn test_injected_operation_failure_leaves_tree_untouched() {
        let (mut host, container) = setup();
        let a = host.create_text_instance("a").unwrap();
        host.fail_on_operation("append_child");

        let err = host.append_child(&container, &a).unwrap_err();
        assert!(matches!(
            err,
            MemoryHostError::InjectedOperationFailure {
                operation: "append_child"
            }
        ));
        assert_eq!(host.parent(a), None);
        assert!(host.ops().iter().all(|op| !matches!(op, HostOp::AppendChild { .. })));

        host.clear_failures();
        host.append_child(&container, &a).unwrap();
        assert_eq!(host.markup(container), "a");
    }
}

//! WorkNode - one rendered instance in one generation.
//!
//! Every live instance has at most two work nodes: the *current* one (last
//! committed) and the *work-in-progress* one (being built). They point at each
//! other through `alternate`.

use std::fmt;
use std::rc::Rc;

use crate::host::UpdatePayload;
use crate::state::{Hook, RootState, UpdateQueue};
use crate::types::{ElementRef, ElementType, Flags, Key, Props, WorkTag};

// =============================================================================
// NodeId
// =============================================================================

/// Stable index of a work node in the [`NodeArena`](super::NodeArena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Raw arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Node Props
// =============================================================================

/// Props as seen by the reconciler: element props, text content, or nothing (root).
#[derive(Debug, Clone, Default, PartialEq)]
pub enum NodeProps {
    #[default]
    Empty,
    Element(Rc<Props>),
    Text(Rc<str>),
}

impl NodeProps {
    pub fn as_props(&self) -> Option<&Props> {
        match self {
            NodeProps::Element(props) => Some(props),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            NodeProps::Text(text) => Some(text),
            _ => None,
        }
    }
}

// =============================================================================
// Memoized State
// =============================================================================

/// Per-tag state kept between renders.
#[derive(Clone, Default)]
pub enum MemoizedState {
    #[default]
    None,
    /// Root: the element currently rendered into the container.
    Root(RootState),
    /// Function component: state cells in call order.
    Hooks(Vec<Hook>),
}

impl MemoizedState {
    pub fn hooks(&self) -> Option<&[Hook]> {
        match self {
            MemoizedState::Hooks(hooks) => Some(hooks),
            _ => None,
        }
    }

    pub fn root(&self) -> Option<&RootState> {
        match self {
            MemoizedState::Root(state) => Some(state),
            _ => None,
        }
    }
}

impl fmt::Debug for MemoizedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoizedState::None => write!(f, "None"),
            MemoizedState::Root(state) => f.debug_tuple("Root").field(state).finish(),
            MemoizedState::Hooks(hooks) => write!(f, "Hooks({})", hooks.len()),
        }
    }
}

// =============================================================================
// WorkNode
// =============================================================================

/// Mutable unit of the reconciler's tree.
///
/// `parent`, `child`, `sibling` and `alternate` are non-owning ids. The node
/// owns `state_node`, its host instance handle.
#[derive(Debug)]
pub struct WorkNode<I> {
    pub tag: WorkTag,
    pub key: Option<Key>,
    pub element_type: Option<ElementType>,
    pub node_type: Option<ElementType>,
    /// Host instance (HostComponent / HostText only).
    pub state_node: Option<I>,

    pub parent: Option<NodeId>,
    pub child: Option<NodeId>,
    pub sibling: Option<NodeId>,
    /// Position among siblings in the last reconcile.
    pub index: usize,

    pub element_ref: Option<ElementRef>,

    pub pending_props: NodeProps,
    pub memoized_props: Option<NodeProps>,

    /// Root update queue, shared with the alternate.
    pub update_queue: Option<Rc<UpdateQueue<RootState>>>,
    /// Property diff computed in the completion phase, consumed by commit.
    pub update_payload: Option<UpdatePayload>,
    pub memoized_state: MemoizedState,

    pub flags: Flags,
    pub subtree_flags: Flags,
    pub deletions: Vec<NodeId>,

    pub alternate: Option<NodeId>,
}

impl<I> WorkNode<I> {
    pub fn new(tag: WorkTag, pending_props: NodeProps, key: Option<Key>) -> Self {
        Self {
            tag,
            key,
            element_type: None,
            node_type: None,
            state_node: None,
            parent: None,
            child: None,
            sibling: None,
            index: 0,
            element_ref: None,
            pending_props,
            memoized_props: None,
            update_queue: None,
            update_payload: None,
            memoized_state: MemoizedState::None,
            flags: Flags::NONE,
            subtree_flags: Flags::NONE,
            deletions: Vec::new(),
            alternate: None,
        }
    }

    /// Tag name, component name, text content, or `root`.
    pub fn label(&self) -> String {
        match self.tag {
            WorkTag::Root => "root".to_string(),
            WorkTag::HostText => self.pending_props.as_text().unwrap_or_default().to_string(),
            _ => self
                .node_type
                .as_ref()
                .map(|ty| ty.label().to_string())
                .unwrap_or_default(),
        }
    }

    /// Host tag of a HostComponent node.
    pub fn host_tag(&self) -> Option<&str> {
        self.node_type.as_ref().and_then(ElementType::host_tag)
    }

    /// Check if any of the given flags is set on this node.
    #[inline]
    pub fn has_flags(&self, flags: Flags) -> bool {
        self.flags.intersects(flags)
    }
}

//! Update Queue - pending changes folded into state once per render.
//!
//! Updates are kept in a circular singly-linked list. The queue only stores
//! the *last* inserted update (`pending`); its `next` is the first one, so
//! insertion is O(1) and draining walks the ring once in FIFO order.
//!
//! ```text
//! pending ──► u3 ──next──► u1 ──next──► u2 ──next──► u3
//! ```
//!
//! The ring lives in a `Vec` with `next` indices instead of heap links.

use std::cell::RefCell;
use std::fmt;

use crate::engine::{NodeArena, NodeId};
use crate::types::Node;

// =============================================================================
// UpdateRing
// =============================================================================

struct RingSlot<U> {
    update: Option<U>,
    next: usize,
}

/// Circular list of pending updates.
pub struct UpdateRing<U> {
    slots: Vec<RingSlot<U>>,
    /// Index of the last inserted update.
    pending: Option<usize>,
}

impl<U> Default for UpdateRing<U> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            pending: None,
        }
    }
}

impl<U> UpdateRing<U> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splice an update in after the last one.
    pub fn enqueue(&mut self, update: U) {
        let index = self.slots.len();
        let next = match self.pending {
            // First update points at itself.
            None => index,
            Some(last) => {
                let first = self.slots[last].next;
                self.slots[last].next = index;
                first
            }
        };
        self.slots.push(RingSlot {
            update: Some(update),
            next,
        });
        self.pending = Some(index);
    }

    /// Take every pending update in insertion order, leaving the ring empty.
    pub fn drain(&mut self) -> Vec<U> {
        let Some(last) = self.pending.take() else {
            return Vec::new();
        };
        let mut slots = std::mem::take(&mut self.slots);
        let mut updates = Vec::with_capacity(slots.len());
        let first = slots[last].next;
        let mut cursor = first;
        loop {
            let slot = &mut slots[cursor];
            if let Some(update) = slot.update.take() {
                updates.push(update);
            }
            cursor = slot.next;
            if cursor == first {
                break;
            }
        }
        updates
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

impl<U> fmt::Debug for UpdateRing<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateRing")
            .field("len", &self.slots.len())
            .field("pending", &self.pending)
            .finish()
    }
}

// =============================================================================
// Updates
// =============================================================================

/// How an update's payload is folded into the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTag {
    /// Shallow-merge the payload over the state.
    UpdateState,
    /// Replace the state with the payload.
    ReplaceState,
}

/// One pending change.
#[derive(Debug, Clone)]
pub struct Update<S> {
    pub tag: UpdateTag,
    pub payload: S,
}

impl<S> Update<S> {
    pub fn merge(payload: S) -> Self {
        Self {
            tag: UpdateTag::UpdateState,
            payload,
        }
    }

    pub fn replace(payload: S) -> Self {
        Self {
            tag: UpdateTag::ReplaceState,
            payload,
        }
    }
}

/// State that can absorb a partial state field by field.
pub trait ShallowMerge: Clone {
    /// Fields present in `partial` overwrite fields of `self`.
    fn merge(&self, partial: &Self) -> Self;
}

// =============================================================================
// Root State
// =============================================================================

/// State of the Root node: what is rendered into the container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootState {
    pub element: Option<Node>,
}

impl RootState {
    pub fn with_element(element: Node) -> Self {
        Self {
            element: Some(element),
        }
    }
}

impl ShallowMerge for RootState {
    fn merge(&self, partial: &Self) -> Self {
        Self {
            element: partial.element.clone().or_else(|| self.element.clone()),
        }
    }
}

// =============================================================================
// UpdateQueue
// =============================================================================

/// Update queue owned by a node (shared between its two generations).
pub struct UpdateQueue<S> {
    shared: RefCell<UpdateRing<Update<S>>>,
}

impl<S> Default for UpdateQueue<S> {
    fn default() -> Self {
        Self {
            shared: RefCell::new(UpdateRing::new()),
        }
    }
}

impl<S: ShallowMerge> UpdateQueue<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, update: Update<S>) {
        self.shared.borrow_mut().enqueue(update);
    }

    pub fn has_pending(&self) -> bool {
        !self.shared.borrow().is_empty()
    }

    /// Apply every pending update to `base`, in insertion order.
    pub fn process(&self, base: &S) -> S {
        let updates = self.shared.borrow_mut().drain();
        updates
            .into_iter()
            .fold(base.clone(), |state, update| state_from_update(update, &state))
    }
}

impl<S> fmt::Debug for UpdateQueue<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shared.try_borrow() {
            Ok(ring) => f.debug_struct("UpdateQueue").field("shared", &*ring).finish(),
            Err(_) => write!(f, "UpdateQueue(<borrowed>)"),
        }
    }
}

fn state_from_update<S: ShallowMerge>(update: Update<S>, previous: &S) -> S {
    match update.tag {
        UpdateTag::UpdateState => previous.merge(&update.payload),
        UpdateTag::ReplaceState => update.payload,
    }
}

/// Enqueue a root update on `node` and return the Root it belongs to.
///
/// A node without a queue has been unmounted; the update is dropped and
/// `None` is returned.
pub fn enqueue_update<I: Clone>(
    arena: &NodeArena<I>,
    node: NodeId,
    update: Update<RootState>,
) -> Option<NodeId> {
    let Some(queue) = arena.get(node).and_then(|n| n.update_queue.as_ref()) else {
        tracing::trace!(%node, "dropping update for node without a queue");
        return None;
    };
    queue.enqueue(update);
    arena.find_root(node)
}

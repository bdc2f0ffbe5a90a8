//! Root Container - binds a host container to its tree and schedules renders.
//!
//! # Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use spark_reconciler::{create_root, Element, ManualScheduler, MemoryHost, RootOptions};
//!
//! let mut host = MemoryHost::new();
//! let container = host.create_container();
//! let scheduler = Rc::new(ManualScheduler::new());
//! let root = create_root(host, container, scheduler.clone(), RootOptions::default());
//!
//! root.render(Element::host("div").prop("id", "a").child("x"))?;
//! scheduler.flush()?;
//! assert_eq!(root.host().markup(container), r#"<div id="a">x</div>"#);
//! ```
//!
//! # Scheduling gate
//!
//! Updates (from `render` or from state cells) only set a flag and hand one
//! task to the scheduler. Every update that arrives before the task runs is
//! picked up by that single render. An update that arrives *during* a render
//! requests another pass once the current commit is done.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use super::commit::{CommitSummary, commit_root};
use super::scheduler::Scheduler;
use super::work_loop::{RenderContext, abandon_work, render_root_sync};
use crate::engine::{NodeArena, NodeId};
use crate::error::{ReconcileError, Result};
use crate::host::Host;
use crate::state::{RootState, Update, UpdateSink, enqueue_update};
use crate::types::{Key, Node, WorkTag};

// =============================================================================
// Options
// =============================================================================

/// Root configuration.
///
/// ```ignore
/// let options = RootOptions {
///     log_effects: true,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Default)]
pub struct RootOptions {
    /// Remove whatever the container holds before the first commit.
    pub clear_container_on_mount: bool,
    /// Log every commit summary at `debug` level.
    pub log_effects: bool,
}

// =============================================================================
// Snapshot
// =============================================================================

/// Read-only copy of the committed tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeSnapshot<I> {
    pub id: NodeId,
    pub alternate: Option<NodeId>,
    pub tag: WorkTag,
    pub key: Option<Key>,
    pub label: String,
    pub instance: Option<I>,
    pub children: Vec<TreeSnapshot<I>>,
}

impl<I> TreeSnapshot<I> {
    /// First node (depth first) with the given key.
    pub fn find_by_key(&self, key: &str) -> Option<&TreeSnapshot<I>> {
        if self.key.as_deref() == Some(key) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_by_key(key))
    }

    /// First node (depth first) with the given label.
    pub fn find_by_label(&self, label: &str) -> Option<&TreeSnapshot<I>> {
        if self.label == label {
            return Some(self);
        }
        self.children
            .iter()
            .find_map(|child| child.find_by_label(label))
    }

    /// Number of nodes in this subtree, itself included.
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(TreeSnapshot::node_count)
            .sum::<usize>()
    }
}

fn snapshot_node<I: Clone>(arena: &NodeArena<I>, id: NodeId) -> TreeSnapshot<I> {
    let node = &arena[id];
    TreeSnapshot {
        id,
        alternate: node.alternate,
        tag: node.tag,
        key: node.key.clone(),
        label: node.label(),
        instance: node.state_node.clone(),
        children: arena
            .children(id)
            .into_iter()
            .map(|child| snapshot_node(arena, child))
            .collect(),
    }
}

// =============================================================================
// Root internals
// =============================================================================

struct Tree<I> {
    arena: NodeArena<I>,
    current: NodeId,
    mounted: bool,
}

struct RootShared<H: Host> {
    this: Weak<RootShared<H>>,
    host: RefCell<H>,
    container: H::Instance,
    tree: RefCell<Tree<H::Instance>>,
    scheduler: Rc<dyn Scheduler>,
    callback_scheduled: Cell<bool>,
    rerender_requested: Cell<bool>,
    options: RootOptions,
    render_count: Cell<usize>,
    last_commit: RefCell<Option<CommitSummary>>,
}

impl<H: Host + 'static> RootShared<H> {
    /// Make sure one render task is pending.
    fn ensure_root_is_scheduled(&self) {
        if self.callback_scheduled.replace(true) {
            return;
        }
        let root = self.this.clone();
        self.scheduler.schedule(Box::new(move || match root.upgrade() {
            Some(root) => root.perform_scheduled_work(),
            None => Ok(()),
        }));
    }

    fn perform_scheduled_work(&self) -> Result<()> {
        // Already flushed by `flush_sync`.
        if !self.callback_scheduled.replace(false) {
            return Ok(());
        }
        self.perform_work_on_root()
    }

    fn perform_work_on_root(&self) -> Result<()> {
        let Ok(mut tree) = self.tree.try_borrow_mut() else {
            self.rerender_requested.set(true);
            return Ok(());
        };
        let mut host = self
            .host
            .try_borrow_mut()
            .map_err(|_| ReconcileError::RenderInProgress)?;

        let result = self.render_and_commit(&mut tree, &mut host);
        drop(host);
        drop(tree);

        let rerender = self.rerender_requested.replace(false);
        if rerender && result.is_ok() {
            self.ensure_root_is_scheduled();
        }
        result
    }

    fn render_and_commit(&self, tree: &mut Tree<H::Instance>, host: &mut H) -> Result<()> {
        let span = tracing::debug_span!("render_root", render = self.render_count.get() + 1);
        let _enter = span.enter();

        let Tree {
            arena,
            current,
            mounted,
        } = tree;
        let sink: Weak<dyn UpdateSink> = self.this.clone();

        let finished = {
            let mut ctx = RenderContext::new(arena, host, sink);
            render_root_sync(&mut ctx, *current)?
        };

        let clear_container = self.options.clear_container_on_mount && !*mounted;
        let summary = match commit_root(
            arena,
            host,
            &self.container,
            current,
            finished.root,
            clear_container,
        ) {
            Ok(summary) => summary,
            Err(error) => {
                abandon_work(arena, finished.created);
                return Err(error);
            }
        };

        *mounted = true;
        self.render_count.set(self.render_count.get() + 1);
        if self.options.log_effects {
            tracing::debug!(
                placements = summary.placements.len(),
                updates = summary.updates.len(),
                deletions = summary.deletions.len(),
                ?summary,
                "commit"
            );
        }
        *self.last_commit.borrow_mut() = Some(summary);
        Ok(())
    }
}

impl<H: Host + 'static> UpdateSink for RootShared<H> {
    fn schedule_update_on_node(&self, node: NodeId) {
        // Mid-render the tree is borrowed; the node is known to be ours.
        if let Ok(tree) = self.tree.try_borrow() {
            if tree.arena.find_root(node).is_none() {
                tracing::trace!(%node, "dropping update for detached node");
                return;
            }
        }
        self.ensure_root_is_scheduled();
    }
}

// =============================================================================
// RootContainer
// =============================================================================

/// Persistent handle binding a host container to its rendered tree.
pub struct RootContainer<H: Host + 'static> {
    shared: Rc<RootShared<H>>,
}

/// Create a root that renders into `container`.
pub fn create_root<H: Host + 'static>(
    host: H,
    container: H::Instance,
    scheduler: Rc<dyn Scheduler>,
    options: RootOptions,
) -> RootContainer<H> {
    let mut arena = NodeArena::new();
    let current = arena.create_host_root();

    let shared = Rc::new_cyclic(|this| RootShared {
        this: this.clone(),
        host: RefCell::new(host),
        container,
        tree: RefCell::new(Tree {
            arena,
            current,
            mounted: false,
        }),
        scheduler,
        callback_scheduled: Cell::new(false),
        rerender_requested: Cell::new(false),
        options,
        render_count: Cell::new(0),
        last_commit: RefCell::new(None),
    });
    RootContainer { shared }
}

impl<H: Host + 'static> RootContainer<H> {
    /// Request a render of `element` into the container.
    ///
    /// Fails with `RenderInProgress` when called from inside a render.
    pub fn render(&self, element: impl Into<Node>) -> Result<()> {
        let element = element.into();
        {
            let tree = self
                .shared
                .tree
                .try_borrow()
                .map_err(|_| ReconcileError::RenderInProgress)?;
            let update = Update::merge(RootState::with_element(element));
            enqueue_update(&tree.arena, tree.current, update);
        }
        self.shared.ensure_root_is_scheduled();
        Ok(())
    }

    /// Render nothing: every host instance is removed.
    pub fn unmount(&self) -> Result<()> {
        self.render(Node::Empty)
    }

    /// Run the pending render now instead of waiting for the scheduler.
    pub fn flush_sync(&self) -> Result<()> {
        if !self.shared.callback_scheduled.replace(false) {
            return Ok(());
        }
        self.shared.perform_work_on_root()
    }

    /// Check if a render is waiting to run.
    pub fn has_pending_work(&self) -> bool {
        self.shared.callback_scheduled.get()
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn host(&self) -> Ref<'_, H> {
        self.shared.host.borrow()
    }

    pub fn host_mut(&self) -> RefMut<'_, H> {
        self.shared.host.borrow_mut()
    }

    pub fn container(&self) -> H::Instance {
        self.shared.container.clone()
    }

    /// Number of committed renders.
    pub fn render_count(&self) -> usize {
        self.shared.render_count.get()
    }

    /// Effects applied by the latest commit.
    pub fn last_commit(&self) -> Option<CommitSummary> {
        self.shared.last_commit.borrow().clone()
    }

    /// Number of work nodes alive, both generations.
    pub fn node_count(&self) -> Result<usize> {
        let tree = self
            .shared
            .tree
            .try_borrow()
            .map_err(|_| ReconcileError::RenderInProgress)?;
        Ok(tree.arena.len())
    }

    /// Copy of the committed tree, starting at the Root node.
    pub fn snapshot(&self) -> Result<TreeSnapshot<H::Instance>> {
        let tree = self
            .shared
            .tree
            .try_borrow()
            .map_err(|_| ReconcileError::RenderInProgress)?;
        Ok(snapshot_node(&tree.arena, tree.current))
    }
}

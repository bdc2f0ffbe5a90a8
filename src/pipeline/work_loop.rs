//! Work Loop - depth-first construction of the work-in-progress tree.
//!
//! One cursor walks the tree:
//!
//! ```text
//! Root
//!  └─ div           begin Root, begin div, begin "x"
//!      ├─ "x"       no child: complete "x", move to its sibling
//!      └─ span      begin span, complete span, no sibling: complete div
//!                   complete Root, done
//! ```
//!
//! - begin: compute a node's children (returns the first one)
//! - complete: when there is no child, finish the node, then move to its
//!   sibling, or climb to the parent and complete that too
//!
//! The loop runs to completion; it is never interrupted. If any step fails
//! the whole work-in-progress generation is abandoned and the committed
//! tree is left as it was.

use std::rc::Weak;

use super::begin::begin_work;
use super::complete::complete_work;
use crate::engine::{MemoizedState, NodeArena, NodeId};
use crate::error::Result;
use crate::host::Host;
use crate::state::{UpdateSink, detach_unshared_cells};

// =============================================================================
// Render Context
// =============================================================================

/// Everything one render needs, confined to that render.
pub struct RenderContext<'a, H: Host> {
    pub(crate) arena: &'a mut NodeArena<H::Instance>,
    pub(crate) host: &'a mut H,
    pub(crate) sink: Weak<dyn UpdateSink>,
    /// Cursor: the next node to begin, `None` when the tree is complete.
    work_in_progress: Option<NodeId>,
}

impl<'a, H: Host> RenderContext<'a, H> {
    pub fn new(
        arena: &'a mut NodeArena<H::Instance>,
        host: &'a mut H,
        sink: Weak<dyn UpdateSink>,
    ) -> Self {
        Self {
            arena,
            host,
            sink,
            work_in_progress: None,
        }
    }
}

/// Result of a completed render.
#[derive(Debug)]
pub struct FinishedWork {
    /// Work-in-progress root, ready to commit.
    pub root: NodeId,
    /// Nodes allocated by this render (freed if the commit fails).
    pub created: Vec<NodeId>,
}

// =============================================================================
// Render
// =============================================================================

/// Build the next generation starting from the committed root.
///
/// On failure the generation is abandoned before the error is returned.
pub fn render_root_sync<H: Host>(
    ctx: &mut RenderContext<'_, H>,
    current_root: NodeId,
) -> Result<FinishedWork> {
    let root = prepare_fresh_stack(ctx, current_root);

    if let Err(error) = work_loop_sync(ctx) {
        let created = ctx.arena.take_journal();
        tracing::debug!(%error, abandoned = created.len(), "render failed");
        abandon_work(ctx.arena, created);
        return Err(error);
    }

    Ok(FinishedWork {
        root,
        created: ctx.arena.take_journal(),
    })
}

fn prepare_fresh_stack<H: Host>(ctx: &mut RenderContext<'_, H>, current_root: NodeId) -> NodeId {
    ctx.arena.begin_journal();
    let props = ctx.arena[current_root].pending_props.clone();
    let root = ctx.arena.create_work_in_progress(current_root, props);
    ctx.work_in_progress = Some(root);
    root
}

fn work_loop_sync<H: Host>(ctx: &mut RenderContext<'_, H>) -> Result<()> {
    while let Some(unit) = ctx.work_in_progress {
        ctx.work_in_progress = perform_unit_of_work(ctx, unit)?;
    }
    Ok(())
}

fn perform_unit_of_work<H: Host>(ctx: &mut RenderContext<'_, H>, unit: NodeId) -> Result<Option<NodeId>> {
    let current = ctx.arena[unit].alternate;
    let next = begin_work(ctx, current, unit)?;

    let node = &mut ctx.arena[unit];
    node.memoized_props = Some(node.pending_props.clone());

    match next {
        Some(child) => Ok(Some(child)),
        None => complete_unit_of_work(ctx, unit),
    }
}

/// Complete `unit` and its ancestors until one of them has a sibling.
fn complete_unit_of_work<H: Host>(ctx: &mut RenderContext<'_, H>, unit: NodeId) -> Result<Option<NodeId>> {
    let mut completed = unit;
    loop {
        let current = ctx.arena[completed].alternate;
        complete_work(ctx, current, completed)?;

        if let Some(sibling) = ctx.arena[completed].sibling {
            return Ok(Some(sibling));
        }
        match ctx.arena[completed].parent {
            Some(parent) => completed = parent,
            // Completed past the root.
            None => return Ok(None),
        }
    }
}

// =============================================================================
// Abandoned Work
// =============================================================================

/// Free nodes created by a failed render and unlink them from the
/// committed tree.
///
/// State cells shared with a committed alternate stay attached: the
/// instance is still mounted and must keep receiving updates.
pub fn abandon_work<I: Clone>(arena: &mut NodeArena<I>, created: Vec<NodeId>) {
    for &id in &created {
        let Some(node) = arena.get(id) else {
            continue;
        };
        if let MemoizedState::Hooks(hooks) = &node.memoized_state {
            let committed = node
                .alternate
                .and_then(|current| arena.get(current))
                .and_then(|current| current.memoized_state.hooks());
            detach_unshared_cells(hooks, committed);
        }
        if let Some(current) = node.alternate {
            if let Some(current) = arena.get_mut(current) {
                if current.alternate == Some(id) {
                    current.alternate = None;
                }
            }
        }
    }
    for id in created {
        arena.free(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NodeProps;
    use crate::state::Hooks;
    use crate::types::{Component, Element, Node};

    struct NoopSink;

    impl UpdateSink for NoopSink {
        fn schedule_update_on_node(&self, _node: NodeId) {}
    }

    #[test]
    fn test_abandon_work_unlinks_and_frees() {
        let mut arena: NodeArena<u32> = NodeArena::new();
        let root = arena.create_host_root();

        arena.begin_journal();
        let wip = arena.create_work_in_progress(root, NodeProps::Empty);
        let text = arena.create_from_text("x".into());
        let created = arena.take_journal();
        assert_eq!(created, vec![wip, text]);

        abandon_work(&mut arena, created);
        assert!(!arena.contains(wip));
        assert!(!arena.contains(text));
        assert_eq!(arena[root].alternate, None);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_abandon_work_keeps_committed_state_cells() {
        let mut arena: NodeArena<u32> = NodeArena::new();
        let component = Component::new("Counter", |_, _| Node::Empty);
        let current = arena.create_from_element(&Element::component(&component).build());

        let sink: Weak<dyn UpdateSink> = Weak::<NoopSink>::new();
        let mut hooks = Hooks::new(current, "Counter", None, sink.clone());
        hooks.use_state(0i64);
        let committed = hooks.finish().unwrap();
        arena[current].memoized_state = MemoizedState::Hooks(committed.clone());

        arena.begin_journal();
        let wip = arena.create_work_in_progress(current, NodeProps::Empty);
        let mut hooks = Hooks::new(wip, "Counter", Some(committed.clone()), sink);
        hooks.use_state(0i64);
        arena[wip].memoized_state = MemoizedState::Hooks(hooks.finish().unwrap());

        let created = arena.take_journal();
        assert_eq!(created, vec![wip]);
        abandon_work(&mut arena, created);
        assert!(!arena.contains(wip));
        assert!(!committed[0].is_detached());
    }
}

//! Complete phase - materialize host instances and bubble flags.

use std::rc::Rc;

use super::work_loop::RenderContext;
use crate::engine::{NodeArena, NodeId, NodeProps};
use crate::error::{ReconcileError, Result};
use crate::host::Host;
use crate::types::{Flags, Props, WorkTag};

/// Run the complete phase on `wip`.
pub(crate) fn complete_work<H: Host>(
    ctx: &mut RenderContext<'_, H>,
    current: Option<NodeId>,
    wip: NodeId,
) -> Result<()> {
    let tag = ctx.arena[wip].tag;
    tracing::trace!(node = %wip, ?tag, label = %ctx.arena[wip].label(), "complete");

    match tag {
        WorkTag::HostComponent => complete_host_component(ctx, current, wip)?,
        WorkTag::HostText => complete_host_text(ctx, current, wip)?,
        WorkTag::Root | WorkTag::FunctionComponent | WorkTag::Indeterminate => {}
    }

    bubble_properties(ctx.arena, wip);
    Ok(())
}

fn complete_host_component<H: Host>(
    ctx: &mut RenderContext<'_, H>,
    current: Option<NodeId>,
    wip: NodeId,
) -> Result<()> {
    let node = &ctx.arena[wip];
    let tag: Rc<str> = node.host_tag().unwrap_or_default().into();
    let new_props = props_of(&node.pending_props);
    let has_instance = node.state_node.is_some();

    if let (Some(current), true) = (current, has_instance) {
        // Existing instance: record what changed for the commit phase.
        let old_props = ctx.arena[current]
            .memoized_props
            .as_ref()
            .map(props_of)
            .unwrap_or_default();
        if Rc::ptr_eq(&old_props, &new_props) {
            return Ok(());
        }
        if let Some(payload) = ctx.host.diff_properties(&tag, &old_props, &new_props) {
            let node = &mut ctx.arena[wip];
            node.update_payload = Some(payload);
            node.flags |= Flags::UPDATE;
        }
        return Ok(());
    }

    let instance = ctx
        .host
        .create_instance(&tag, &new_props)
        .map_err(ReconcileError::host("create_instance"))?;
    append_all_children(ctx, &instance, wip)?;
    ctx.host
        .finalize_initial_children(&instance, &tag, &new_props)
        .map_err(ReconcileError::host("finalize_initial_children"))?;
    ctx.arena[wip].state_node = Some(instance);
    Ok(())
}

fn complete_host_text<H: Host>(
    ctx: &mut RenderContext<'_, H>,
    current: Option<NodeId>,
    wip: NodeId,
) -> Result<()> {
    let node = &ctx.arena[wip];
    let new_text = node.pending_props.as_text().unwrap_or_default();
    let has_instance = node.state_node.is_some();

    if let (Some(current), true) = (current, has_instance) {
        let old_text = ctx.arena[current]
            .memoized_props
            .as_ref()
            .and_then(NodeProps::as_text);
        if old_text != Some(new_text) {
            ctx.arena[wip].flags |= Flags::UPDATE;
        }
        return Ok(());
    }

    let instance = ctx
        .host
        .create_text_instance(new_text)
        .map_err(ReconcileError::host("create_text_instance"))?;
    ctx.arena[wip].state_node = Some(instance);
    Ok(())
}

fn props_of(props: &NodeProps) -> Rc<Props> {
    match props {
        NodeProps::Element(props) => props.clone(),
        _ => Rc::default(),
    }
}

/// Append every top-level host descendant of `wip` to `parent`.
///
/// Function components have no instance, so their children are appended in
/// their place. Host children bring their own subtree along.
fn append_all_children<H: Host>(
    ctx: &mut RenderContext<'_, H>,
    parent: &H::Instance,
    wip: NodeId,
) -> Result<()> {
    let mut node = ctx.arena[wip].child;
    while let Some(n) = node {
        let child = &ctx.arena[n];
        if child.tag.is_host() {
            if let Some(instance) = &child.state_node {
                ctx.host
                    .append_initial_child(parent, instance)
                    .map_err(ReconcileError::host("append_initial_child"))?;
            }
        } else if let Some(first) = child.child {
            node = Some(first);
            continue;
        }

        // Next sibling, climbing back up as long as there is none.
        let mut climb = n;
        loop {
            if climb == wip {
                return Ok(());
            }
            if let Some(sibling) = ctx.arena[climb].sibling {
                node = Some(sibling);
                break;
            }
            match ctx.arena[climb].parent {
                Some(up) if up != wip => climb = up,
                _ => return Ok(()),
            }
        }
    }
    Ok(())
}

/// OR the flags of every child into `subtree_flags` and re-point children at
/// their completed parent.
pub(crate) fn bubble_properties<I: Clone>(arena: &mut NodeArena<I>, wip: NodeId) {
    let mut subtree_flags = Flags::NONE;
    let mut child = arena[wip].child;
    while let Some(c) = child {
        let node = &mut arena[c];
        subtree_flags |= node.subtree_flags | node.flags;
        node.parent = Some(wip);
        child = node.sibling;
    }
    arena[wip].subtree_flags |= subtree_flags;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bubble_properties() {
        let mut arena: NodeArena<u32> = NodeArena::new();
        let root = arena.create_host_root();
        let a = arena.create_from_text("a".into());
        let b = arena.create_from_text("b".into());
        arena[root].child = Some(a);
        arena[a].sibling = Some(b);
        arena[a].flags = Flags::PLACEMENT;
        arena[b].subtree_flags = Flags::UPDATE;

        bubble_properties(&mut arena, root);
        assert_eq!(arena[root].subtree_flags, Flags::PLACEMENT | Flags::UPDATE);
        assert_eq!(arena[root].flags, Flags::NONE);
        assert_eq!(arena[a].parent, Some(root));
        assert_eq!(arena[b].parent, Some(root));
    }
}

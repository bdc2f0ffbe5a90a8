//! Begin phase - compute the children of one node.

use std::rc::Rc;

use super::work_loop::RenderContext;
use crate::engine::{MemoizedState, NodeId, NodeProps};
use crate::error::Result;
use crate::host::Host;
use crate::reconciler::ChildReconciler;
use crate::state::Hooks;
use crate::types::{ElementType, Flags, Node, Props, WorkTag};

/// Run the begin phase on `wip` and return its first child.
pub(crate) fn begin_work<H: Host>(
    ctx: &mut RenderContext<'_, H>,
    current: Option<NodeId>,
    wip: NodeId,
) -> Result<Option<NodeId>> {
    let tag = ctx.arena[wip].tag;
    tracing::trace!(node = %wip, ?tag, label = %ctx.arena[wip].label(), "begin");

    match tag {
        WorkTag::Root => update_host_root(ctx, current, wip),
        WorkTag::Indeterminate => mount_indeterminate_component(ctx, wip),
        WorkTag::FunctionComponent => update_function_component(ctx, current, wip),
        WorkTag::HostComponent => update_host_component(ctx, current, wip),
        WorkTag::HostText => Ok(None),
    }
}

fn update_host_root<H: Host>(
    ctx: &mut RenderContext<'_, H>,
    current: Option<NodeId>,
    wip: NodeId,
) -> Result<Option<NodeId>> {
    let node = &ctx.arena[wip];
    let base = node.memoized_state.root().cloned().unwrap_or_default();
    let next = match &node.update_queue {
        Some(queue) => queue.process(&base),
        None => base,
    };

    let element = next.element.clone().unwrap_or_default();
    ctx.arena[wip].memoized_state = MemoizedState::Root(next);
    Ok(reconcile_children(ctx, current, wip, &element))
}

fn mount_indeterminate_component<H: Host>(
    ctx: &mut RenderContext<'_, H>,
    wip: NodeId,
) -> Result<Option<NodeId>> {
    let children = render_with_hooks(ctx, None, wip)?;
    ctx.arena[wip].tag = WorkTag::FunctionComponent;
    Ok(reconcile_children(ctx, None, wip, &children))
}

fn update_function_component<H: Host>(
    ctx: &mut RenderContext<'_, H>,
    current: Option<NodeId>,
    wip: NodeId,
) -> Result<Option<NodeId>> {
    let children = render_with_hooks(ctx, current, wip)?;
    Ok(reconcile_children(ctx, current, wip, &children))
}

/// Call the component body with a fresh `Hooks` context.
///
/// Mounts when `current` has no state cells, updates otherwise.
fn render_with_hooks<H: Host>(
    ctx: &mut RenderContext<'_, H>,
    current: Option<NodeId>,
    wip: NodeId,
) -> Result<Node> {
    let node = &ctx.arena[wip];
    let Some(ElementType::Component(component)) = node.node_type.clone() else {
        return Ok(Node::Empty);
    };
    let props = element_props(&node.pending_props);
    let previous = current
        .and_then(|current| ctx.arena[current].memoized_state.hooks())
        .map(<[_]>::to_vec);

    let mut hooks = Hooks::new(wip, component.name(), previous, ctx.sink.clone());
    let children = component.render(&mut hooks, &props);
    let cells = hooks.finish()?;

    ctx.arena[wip].memoized_state = MemoizedState::Hooks(cells);
    Ok(children)
}

fn update_host_component<H: Host>(
    ctx: &mut RenderContext<'_, H>,
    current: Option<NodeId>,
    wip: NodeId,
) -> Result<Option<NodeId>> {
    let node = &ctx.arena[wip];
    let props = element_props(&node.pending_props);
    let tag = node.host_tag().unwrap_or_default();

    // Text-only children are assigned by the host, not reconciled.
    let text_only = ctx.host.is_text_only_children(tag, &props);
    mark_ref(ctx, current, wip);

    if text_only {
        return Ok(reconcile_children(ctx, current, wip, &Node::Empty));
    }
    Ok(reconcile_children(ctx, current, wip, &props.children))
}

fn mark_ref<H: Host>(ctx: &mut RenderContext<'_, H>, current: Option<NodeId>, wip: NodeId) {
    let new_ref = ctx.arena[wip].element_ref.as_ref();
    let changed = match current {
        None => new_ref.is_some(),
        Some(current) => ctx.arena[current].element_ref.as_ref() != new_ref,
    };
    if changed {
        ctx.arena[wip].flags |= Flags::REF;
    }
}

fn element_props(props: &NodeProps) -> Rc<Props> {
    match props {
        NodeProps::Element(props) => props.clone(),
        _ => Rc::default(),
    }
}

/// Reconcile `next` into the children of `wip` and return the first one.
fn reconcile_children<H: Host>(
    ctx: &mut RenderContext<'_, H>,
    current: Option<NodeId>,
    wip: NodeId,
    next: &Node,
) -> Option<NodeId> {
    let first = match current {
        None => ChildReconciler::mounting(ctx.arena).reconcile_child_nodes(wip, None, next),
        Some(current) => {
            let current_first = ctx.arena[current].child;
            ChildReconciler::tracking(ctx.arena).reconcile_child_nodes(wip, current_first, next)
        }
    };
    ctx.arena[wip].child = first;
    first
}

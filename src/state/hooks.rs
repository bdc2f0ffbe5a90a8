//! Hooks - per-instance state cells of function components.
//!
//! A component body receives `&mut Hooks` and acquires state cells by calling
//! [`Hooks::use_state`] / [`Hooks::use_reducer`]. Call order defines cell
//! identity: the n-th call of this render reads the n-th cell of the previous
//! render. A render that acquires a different number of cells, or reads a cell
//! with a different value type, fails with `HookOrder` / `HookType`.
//!
//! # Dispatch
//!
//! Each cell has its own queue. Dispatching an action:
//!
//! 1. drops it if the owning node was deleted
//! 2. when nothing is pending, computes the next state eagerly and drops
//!    the action if the state would not change
//! 3. otherwise queues it and asks the root to render
//!
//! ```ignore
//! let slot: Rc<RefCell<Option<SetState<i64>>>> = Rc::default();
//! let handle = slot.clone();
//! let counter = Component::new("Counter", move |hooks, _| {
//!     let (count, set_count) = hooks.use_state(0);
//!     *handle.borrow_mut() = Some(set_count);
//!     Element::host("span").content(count).into()
//! });
//!
//! // Later, outside any render: schedules one render of the root.
//! if let Some(set_count) = slot.borrow().as_ref() {
//!     set_count.update(|n| n + 1);
//! }
//! ```

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::update_queue::UpdateRing;
use crate::engine::NodeId;
use crate::error::{ReconcileError, Result};

// =============================================================================
// Update Sink
// =============================================================================

/// Receiver of "this node has new state" notifications.
///
/// Implemented by the root container, which walks up to the Root node and
/// schedules a render.
pub trait UpdateSink {
    fn schedule_update_on_node(&self, node: NodeId);
}

// =============================================================================
// Dispatch
// =============================================================================

/// Stable handle that queues actions on one state cell.
///
/// The same handle is returned on every render of the instance.
pub struct Dispatch<A> {
    send: Rc<dyn Fn(A)>,
}

impl<A> Dispatch<A> {
    fn new(send: impl Fn(A) + 'static) -> Self {
        Self { send: Rc::new(send) }
    }

    fn noop() -> Self
    where
        A: 'static,
    {
        Self::new(|_| {})
    }

    /// Queue an action.
    pub fn dispatch(&self, action: A) {
        (self.send)(action)
    }

    /// Check if two handles target the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.send, &other.send)
    }
}

impl<A> Clone for Dispatch<A> {
    fn clone(&self) -> Self {
        Self {
            send: self.send.clone(),
        }
    }
}

impl<A> fmt::Debug for Dispatch<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dispatch({:p})", Rc::as_ptr(&self.send))
    }
}

/// Action of a `use_state` cell: a new value or an updater.
pub enum StateAction<T> {
    Set(T),
    Update(Rc<dyn Fn(&T) -> T>),
}

impl<T: Clone> Clone for StateAction<T> {
    fn clone(&self) -> Self {
        match self {
            StateAction::Set(value) => StateAction::Set(value.clone()),
            StateAction::Update(f) => StateAction::Update(f.clone()),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for StateAction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateAction::Set(value) => f.debug_tuple("Set").field(value).finish(),
            StateAction::Update(_) => write!(f, "Update(<fn>)"),
        }
    }
}

/// Setter returned by [`Hooks::use_state`].
pub type SetState<T> = Dispatch<StateAction<T>>;

impl<T: 'static> Dispatch<StateAction<T>> {
    /// Replace the value.
    pub fn set(&self, value: T) {
        self.dispatch(StateAction::Set(value));
    }

    /// Compute the next value from the latest one.
    pub fn update(&self, f: impl Fn(&T) -> T + 'static) {
        self.dispatch(StateAction::Update(Rc::new(f)));
    }
}

fn basic_state_reducer<T: Clone>(state: &T, action: &StateAction<T>) -> T {
    match action {
        StateAction::Set(value) => value.clone(),
        StateAction::Update(f) => f(state),
    }
}

// =============================================================================
// State Queue
// =============================================================================

type Reducer<S, A> = dyn Fn(&S, &A) -> S;

struct HookUpdate<S, A> {
    action: A,
    /// Next state computed at dispatch time, when the queue was empty.
    eager_state: Option<S>,
}

/// Type-erased view of a cell's queue.
pub trait CellQueue {
    /// Stop accepting actions (owning node deleted or render abandoned).
    fn detach(&self);
    fn is_detached(&self) -> bool;
    fn has_pending(&self) -> bool;
    fn as_any(&self) -> &dyn Any;
}

struct StateQueue<S, A> {
    pending: RefCell<UpdateRing<HookUpdate<S, A>>>,
    dispatch: RefCell<Option<Dispatch<A>>>,
    last_rendered_reducer: RefCell<Option<Rc<Reducer<S, A>>>>,
    last_rendered_state: RefCell<Option<S>>,
    detached: Cell<bool>,
}

impl<S, A> StateQueue<S, A>
where
    S: Clone + PartialEq + 'static,
    A: 'static,
{
    fn new(reducer: Rc<Reducer<S, A>>, state: S) -> Self {
        Self {
            pending: RefCell::new(UpdateRing::new()),
            dispatch: RefCell::new(None),
            last_rendered_reducer: RefCell::new(Some(reducer)),
            last_rendered_state: RefCell::new(Some(state)),
            detached: Cell::new(false),
        }
    }

    /// Queue an action. Returns `false` when it was dropped.
    fn enqueue_action(&self, action: A) -> bool {
        if self.detached.get() {
            tracing::trace!("dropping action for detached state cell");
            return false;
        }

        let mut eager_state = None;
        if self.pending.borrow().is_empty() {
            let reducer = self.last_rendered_reducer.borrow().clone();
            let last = self.last_rendered_state.borrow().clone();
            if let (Some(reducer), Some(last)) = (reducer, last) {
                let next = reducer(&last, &action);
                if next == last {
                    tracing::trace!("dropping no-op state update");
                    return false;
                }
                eager_state = Some(next);
            }
        }

        self.pending.borrow_mut().enqueue(HookUpdate {
            action,
            eager_state,
        });
        true
    }

    /// Fold pending actions into `base`, in dispatch order.
    fn process(&self, base: S, reducer: &Reducer<S, A>) -> S {
        let updates = self.pending.borrow_mut().drain();
        updates
            .into_iter()
            .fold(base, |state, update| match update.eager_state {
                Some(eager) => eager,
                None => reducer(&state, &update.action),
            })
    }
}

impl<S: 'static, A: 'static> CellQueue for StateQueue<S, A> {
    fn detach(&self) {
        self.detached.set(true);
        self.pending.borrow_mut().drain();
    }

    fn is_detached(&self) -> bool {
        self.detached.get()
    }

    fn has_pending(&self) -> bool {
        !self.pending.borrow().is_empty()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Hook (state cell)
// =============================================================================

/// One state cell: the value of the last render plus its queue.
#[derive(Clone)]
pub struct Hook {
    state: Rc<dyn Any>,
    queue: Rc<dyn CellQueue>,
}

impl Hook {
    /// Current value, if it has type `S`.
    pub fn state<S: 'static>(&self) -> Option<&S> {
        self.state.downcast_ref::<S>()
    }

    pub fn has_pending(&self) -> bool {
        self.queue.has_pending()
    }

    pub fn is_detached(&self) -> bool {
        self.queue.is_detached()
    }

    pub(crate) fn detach(&self) {
        self.queue.detach();
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("pending", &self.queue.has_pending())
            .field("detached", &self.queue.is_detached())
            .finish()
    }
}

/// Detach every cell so late dispatches are dropped.
pub fn detach_hooks(hooks: &[Hook]) {
    for hook in hooks {
        hook.detach();
    }
}

// =============================================================================
// Hooks (render context)
// =============================================================================

/// State-cell context for one render of one function component.
pub struct Hooks {
    node: NodeId,
    component: &'static str,
    /// Cells of the current render; `None` when mounting.
    previous: Option<Vec<Hook>>,
    cells: Vec<Hook>,
    sink: Weak<dyn UpdateSink>,
    error: Option<ReconcileError>,
}

impl Hooks {
    pub(crate) fn new(
        node: NodeId,
        component: &'static str,
        previous: Option<Vec<Hook>>,
        sink: Weak<dyn UpdateSink>,
    ) -> Self {
        Self {
            node,
            component,
            previous,
            cells: Vec::new(),
            sink,
            error: None,
        }
    }

    /// Check if this is the first render of the instance.
    pub fn is_mount(&self) -> bool {
        self.previous.is_none()
    }

    /// Node being rendered.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// State cell driven by a reducer.
    ///
    /// `initial` is only used on mount. Returns the state for this render and
    /// a dispatch handle that is identical across renders.
    pub fn use_reducer<S, A>(
        &mut self,
        reducer: impl Fn(&S, &A) -> S + 'static,
        initial: S,
    ) -> (S, Dispatch<A>)
    where
        S: Clone + PartialEq + 'static,
        A: 'static,
    {
        let reducer: Rc<Reducer<S, A>> = Rc::new(reducer);
        let index = self.cells.len();

        let previous = self
            .previous
            .as_ref()
            .and_then(|cells| cells.get(index))
            .cloned();

        match previous {
            Some(hook) => self.update_reducer(hook, reducer, initial, index),
            // Mount, or more cells than last render (reported by `finish`).
            None => self.mount_reducer(reducer, initial),
        }
    }

    /// State cell holding a plain value.
    pub fn use_state<T>(&mut self, initial: T) -> (T, SetState<T>)
    where
        T: Clone + PartialEq + 'static,
    {
        self.use_reducer(basic_state_reducer::<T>, initial)
    }

    fn mount_reducer<S, A>(&mut self, reducer: Rc<Reducer<S, A>>, initial: S) -> (S, Dispatch<A>)
    where
        S: Clone + PartialEq + 'static,
        A: 'static,
    {
        let queue = Rc::new(StateQueue::new(reducer, initial.clone()));
        let dispatch = self.bind_dispatch(&queue);
        *queue.dispatch.borrow_mut() = Some(dispatch.clone());

        self.cells.push(Hook {
            state: Rc::new(initial.clone()),
            queue,
        });
        (initial, dispatch)
    }

    fn update_reducer<S, A>(
        &mut self,
        hook: Hook,
        reducer: Rc<Reducer<S, A>>,
        initial: S,
        index: usize,
    ) -> (S, Dispatch<A>)
    where
        S: Clone + PartialEq + 'static,
        A: 'static,
    {
        let base = hook.state.downcast_ref::<S>().cloned();
        let queue = hook.queue.as_any().downcast_ref::<StateQueue<S, A>>();
        let dispatch = queue.and_then(|q| q.dispatch.borrow().clone());

        let (Some(base), Some(queue), Some(dispatch)) = (base, queue, dispatch) else {
            self.fail(ReconcileError::HookType {
                component: self.component,
                index,
            });
            // Keep the cell so the count check in `finish` stays meaningful.
            self.cells.push(hook);
            // The render fails in `finish`; the body only needs some value.
            return (initial, Dispatch::noop());
        };

        let state = queue.process(base, &*reducer);
        *queue.last_rendered_reducer.borrow_mut() = Some(reducer);
        *queue.last_rendered_state.borrow_mut() = Some(state.clone());

        self.cells.push(Hook {
            state: Rc::new(state.clone()),
            queue: hook.queue,
        });
        (state, dispatch)
    }

    fn bind_dispatch<S, A>(&self, queue: &Rc<StateQueue<S, A>>) -> Dispatch<A>
    where
        S: Clone + PartialEq + 'static,
        A: 'static,
    {
        let queue = Rc::downgrade(queue);
        let sink = self.sink.clone();
        let node = self.node;
        Dispatch::new(move |action| {
            let Some(queue) = queue.upgrade() else {
                return;
            };
            let Some(sink) = sink.upgrade() else {
                tracing::trace!(%node, "dropping action, root is gone");
                return;
            };
            if queue.enqueue_action(action) {
                sink.schedule_update_on_node(node);
            }
        })
    }

    fn fail(&mut self, error: ReconcileError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// End the render and return the cells to memoize.
    pub(crate) fn finish(self) -> Result<Vec<Hook>> {
        if let Some(error) = self.error {
            detach_unshared_cells(&self.cells, self.previous.as_deref());
            return Err(error);
        }
        if let Some(previous) = &self.previous {
            if previous.len() != self.cells.len() {
                detach_unshared_cells(&self.cells, self.previous.as_deref());
                return Err(ReconcileError::HookOrder {
                    component: self.component,
                    expected: previous.len(),
                    found: self.cells.len(),
                });
            }
        }
        Ok(self.cells)
    }
}

/// Detach the cells of `cells` that `committed` does not share.
///
/// Cells carried over from a committed render keep their queue; only cells
/// created by the abandoned render are detached. With no committed cells
/// (a mount) every cell is detached.
pub(crate) fn detach_unshared_cells(cells: &[Hook], committed: Option<&[Hook]>) {
    let Some(committed) = committed else {
        detach_hooks(cells);
        return;
    };
    for cell in cells {
        let shared = committed.iter().any(|c| Rc::ptr_eq(&c.queue, &cell.queue));
        if !shared {
            cell.detach();
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("node", &self.node)
            .field("component", &self.component)
            .field("mount", &self.is_mount())
            .field("cells", &self.cells.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        scheduled: RefCell<Vec<NodeId>>,
    }

    impl UpdateSink for RecordingSink {
        fn schedule_update_on_node(&self, node: NodeId) {
            self.scheduled.borrow_mut().push(node);
        }
    }

    fn setup() -> (Rc<RecordingSink>, Weak<dyn UpdateSink>) {
        let sink = Rc::new(RecordingSink::default());
        let as_dyn: Rc<dyn UpdateSink> = sink.clone();
        let weak = Rc::downgrade(&as_dyn);
        (sink, weak)
    }

    fn render_counter(
        previous: Option<Vec<Hook>>,
        sink: &Weak<dyn UpdateSink>,
    ) -> (i64, SetState<i64>, Vec<Hook>) {
        let mut hooks = Hooks::new(NodeId(1), "Counter", previous, sink.clone());
        let (count, set_count) = hooks.use_state(0i64);
        let cells = hooks.finish().unwrap();
        (count, set_count, cells)
    }

    #[test]
    fn test_mount_returns_initial_state() {
        let (_sink, weak) = setup();
        let (count, _, cells) = render_counter(None, &weak);
        assert_eq!(count, 0);
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].state::<i64>(), Some(&0));
    }

    #[test]
    fn test_updates_apply_in_order_and_dispatch_is_stable() {
        let (sink, weak) = setup();
        let (_, set_count, cells) = render_counter(None, &weak);

        set_count.set(5);
        set_count.update(|n| n * 10);
        assert_eq!(sink.scheduled.borrow().len(), 2);
        assert!(cells[0].has_pending());

        let (count, set_again, cells) = render_counter(Some(cells), &weak);
        assert_eq!(count, 50);
        assert!(set_count.ptr_eq(&set_again));
        assert!(!cells[0].has_pending());
    }

    #[test]
    fn test_noop_update_is_dropped() {
        let (sink, weak) = setup();
        let (_, set_count, cells) = render_counter(None, &weak);

        set_count.set(0);
        set_count.update(|n| *n);
        assert!(sink.scheduled.borrow().is_empty());
        assert!(!cells[0].has_pending());
    }

    #[test]
    fn test_detached_cell_drops_actions() {
        let (sink, weak) = setup();
        let (_, set_count, cells) = render_counter(None, &weak);

        detach_hooks(&cells);
        set_count.set(3);
        assert!(sink.scheduled.borrow().is_empty());
        assert!(cells[0].is_detached());
    }

    #[test]
    fn test_detach_unshared_cells_keeps_committed_queues() {
        let (sink, weak) = setup();
        let (_, set_count, committed) = render_counter(None, &weak);

        // An update render carries the committed cell over.
        let (_, _, next) = render_counter(Some(committed.clone()), &weak);
        detach_unshared_cells(&next, Some(&committed));
        assert!(!committed[0].is_detached());

        set_count.set(4);
        assert_eq!(sink.scheduled.borrow().len(), 1);

        // A mounting render owns every cell it created.
        let (_, _, fresh) = render_counter(None, &weak);
        detach_unshared_cells(&fresh, None);
        assert!(fresh[0].is_detached());
    }

    #[test]
    fn test_dropped_root_drops_actions() {
        let (sink, weak) = setup();
        let (_, set_count, cells) = render_counter(None, &weak);
        drop(sink);

        set_count.set(3);
        assert!(!cells[0].has_pending());
    }

    #[test]
    fn test_reducer_without_eager_state() {
        let (_sink, weak) = setup();
        let reducer = |state: &Vec<&'static str>, action: &&'static str| {
            let mut next = state.clone();
            next.push(*action);
            next
        };

        let mut hooks = Hooks::new(NodeId(2), "Log", None, weak.clone());
        let (_, dispatch) = hooks.use_reducer(reducer, Vec::new());
        let cells = hooks.finish().unwrap();

        dispatch.dispatch("a");
        dispatch.dispatch("b");
        dispatch.dispatch("c");

        let mut hooks = Hooks::new(NodeId(2), "Log", Some(cells), weak);
        let (log, _) = hooks.use_reducer(reducer, Vec::new());
        assert_eq!(log, vec!["a", "b", "c"]);
        assert!(hooks.finish().is_ok());
    }

    #[test]
    fn test_hook_count_mismatch_fails() {
        let (_sink, weak) = setup();
        let (_, _, cells) = render_counter(None, &weak);

        let mut hooks = Hooks::new(NodeId(1), "Counter", Some(cells), weak);
        hooks.use_state(0i64);
        hooks.use_state(String::new());
        let err = hooks.finish().unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::HookOrder {
                component: "Counter",
                expected: 1,
                found: 2
            }
        ));
    }

    #[test]
    fn test_hook_type_mismatch_fails() {
        let (_sink, weak) = setup();
        let (_, _, cells) = render_counter(None, &weak);

        let mut hooks = Hooks::new(NodeId(1), "Counter", Some(cells), weak);
        let (value, _) = hooks.use_state(String::from("x"));
        assert_eq!(value, "x");
        let err = hooks.finish().unwrap_err();
        assert!(matches!(err, ReconcileError::HookType { index: 0, .. }));
    }
}

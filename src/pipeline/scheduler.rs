//! Scheduler - when a pending render actually runs.
//!
//! The root hands one task per batch of updates to a [`Scheduler`]. The
//! policy of when that task runs belongs to the embedder:
//!
//! - **ManualScheduler** - queue until `flush()` (tests, frame loops)
//! - **ImmediateScheduler** - run inline, log failures

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;

use crate::error::Result;

/// A deferred render.
pub type Task = Box<dyn FnOnce() -> Result<()>>;

/// "Run this later" service.
pub trait Scheduler {
    fn schedule(&self, task: Task);
}

// =============================================================================
// ManualScheduler
// =============================================================================

/// Queues tasks until [`flush`](Self::flush) is called.
#[derive(Default)]
pub struct ManualScheduler {
    queue: RefCell<VecDeque<Task>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting.
    pub fn pending_count(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Run queued tasks, including tasks they schedule, until none is left.
    ///
    /// Stops at the first failing task and returns its error; later tasks
    /// stay queued. Returns the number of tasks run.
    pub fn flush(&self) -> Result<usize> {
        let mut ran = 0;
        loop {
            let task = self.queue.borrow_mut().pop_front();
            let Some(task) = task else {
                return Ok(ran);
            };
            ran += 1;
            task()?;
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, task: Task) {
        self.queue.borrow_mut().push_back(task);
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending_count())
            .finish()
    }
}

// =============================================================================
// ImmediateScheduler
// =============================================================================

/// Runs every task as soon as it is scheduled.
///
/// Errors cannot reach the caller, so they are logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
    fn schedule(&self, task: Task) {
        if let Err(error) = task() {
            tracing::error!(%error, "scheduled render failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconcileError;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_manual_scheduler_runs_nested_tasks_in_order() {
        let scheduler = Rc::new(ManualScheduler::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let inner_log = log.clone();
        let inner_scheduler = scheduler.clone();
        scheduler.schedule(Box::new(move || {
            inner_log.borrow_mut().push("first");
            let nested_log = inner_log.clone();
            inner_scheduler.schedule(Box::new(move || {
                nested_log.borrow_mut().push("nested");
                Ok(())
            }));
            Ok(())
        }));
        let second_log = log.clone();
        scheduler.schedule(Box::new(move || {
            second_log.borrow_mut().push("second");
            Ok(())
        }));

        assert_eq!(scheduler.pending_count(), 2);
        assert_eq!(scheduler.flush().unwrap(), 3);
        assert_eq!(*log.borrow(), vec!["first", "second", "nested"]);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_manual_scheduler_stops_at_error() {
        let scheduler = ManualScheduler::new();
        let ran = Rc::new(Cell::new(false));
        scheduler.schedule(Box::new(|| Err(ReconcileError::RenderInProgress)));
        let flag = ran.clone();
        scheduler.schedule(Box::new(move || {
            flag.set(true);
            Ok(())
        }));

        assert!(matches!(scheduler.flush(), Err(ReconcileError::RenderInProgress)));
        assert!(!ran.get());
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[test]
    fn test_immediate_scheduler_runs_inline() {
        let ran = Rc::new(Cell::new(0));
        let counter = ran.clone();
        ImmediateScheduler.schedule(Box::new(move || {
            counter.set(counter.get() + 1);
            Ok(())
        }));
        assert_eq!(ran.get(), 1);
    }
}

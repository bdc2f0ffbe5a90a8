//! Reconciler errors.

use thiserror::Error;

/// Errors that abort a render pass.
///
/// When a render fails, the work-in-progress generation is abandoned and the
/// previously committed tree stays current.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("host adapter failed during {operation}: {source}")]
    Host {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("component `{component}` used {found} state cells, previous render used {expected}")]
    HookOrder {
        component: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("component `{component}` read state cell {index} with a different type than it was created with")]
    HookType {
        component: &'static str,
        index: usize,
    },

    #[error("a render is already in progress on this root")]
    RenderInProgress,
}

impl ReconcileError {
    /// Wrap a host adapter error.
    pub(crate) fn host<E>(operation: &'static str) -> impl FnOnce(E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        move |source| ReconcileError::Host {
            operation,
            source: Box::new(source),
        }
    }
}

pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;

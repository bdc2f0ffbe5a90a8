//! State Module - pending updates and per-instance state
//!
//! Two mechanisms share one contract: apply every pending update to a base
//! state, in insertion order, producing the next state.
//!
//! - **Update Queue** - Root queue, shallow-merged into `RootState`
//! - **Hooks** - State cells of function components, with eager bail-out

mod hooks;
mod update_queue;

pub use hooks::*;
pub use update_queue::*;

//! Serialized filesystem worker and directory watching for pathwatch.
//!
//! One dedicated worker thread per [`FsScheduler`] performs every blocking
//! filesystem operation and drains native watch notifications; results and
//! change batches are delivered to consumers through an [`EventDispatcher`]
//! on a caller-supplied [`TaskExecutor`], never on the worker thread itself.

mod dispatch;
mod error;
mod event;
mod ops;
mod registry;
mod scheduler;
mod snapshot;

pub use dispatch::{
    EventDispatcher, ExecutorClosed, Task, TaskExecutor, ThreadExecutor, TokioExecutor,
};
pub use error::WatchError;
pub use event::{ChangeKind, DirectoryChange, DirectoryEvent};
pub use registry::WatchKeyRegistry;
pub use scheduler::FsScheduler;
pub use snapshot::tree_snapshot;

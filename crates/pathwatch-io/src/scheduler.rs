//! The single-worker operation scheduler and watch-notification loop.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::SystemTime;

use pathwatch_core::{Charset, FsError, PathElement};

use crate::dispatch::{EventDispatcher, TaskExecutor};
use crate::error::WatchError;
use crate::event::{DirectoryEvent, package_batches};
use crate::ops;
use crate::registry::WatchKeyRegistry;
use crate::snapshot;

/// A queued operation, run on the worker thread.
type Operation = Box<dyn FnOnce(&EventDispatcher) + Send + 'static>;

/// Serializes all blocking filesystem work and native watch polling onto one
/// dedicated worker thread.
///
/// Any number of threads may submit operations, manage watches, or request
/// shutdown; results and notification batches are delivered through the
/// scheduler's [`EventDispatcher`] on the caller-supplied execution context,
/// never on the worker thread. Cloning the scheduler yields another handle
/// to the same worker.
#[derive(Clone)]
pub struct FsScheduler {
    shared: Arc<Shared>,
    registry: Arc<WatchKeyRegistry>,
    dispatcher: EventDispatcher,
}

struct Shared {
    state: Mutex<WorkerState>,
    /// Signalled whenever a notification, an operation, or a shutdown
    /// request lands in the state. The producer appends under the lock
    /// before signalling and the worker re-checks everything under the same
    /// lock before sleeping, so a wake request is never lost and never
    /// aborts an unrelated poll.
    wakeup: Condvar,
    shutdown_complete: AtomicBool,
}

#[derive(Default)]
struct WorkerState {
    notifications: VecDeque<notify::Result<notify::Event>>,
    queue: VecDeque<Operation>,
    shutdown: bool,
}

/// What the worker decided to do for one loop iteration.
enum Step {
    Notifications(Vec<notify::Result<notify::Event>>),
    Drain(Vec<Operation>),
    Shutdown,
}

impl FsScheduler {
    /// Create a scheduler delivering onto `executor` and start its worker
    /// thread.
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Result<Self, WatchError> {
        let shared = Arc::new(Shared {
            state: Mutex::new(WorkerState::default()),
            wakeup: Condvar::new(),
            shutdown_complete: AtomicBool::new(false),
        });

        let sink_shared = Arc::clone(&shared);
        let registry = Arc::new(WatchKeyRegistry::new(move |result| {
            let mut state = sink_shared.state.lock().expect("scheduler lock poisoned");
            state.notifications.push_back(result);
            sink_shared.wakeup.notify_one();
        })?);

        let dispatcher = EventDispatcher::new(executor);

        let worker_shared = Arc::clone(&shared);
        let worker_registry = Arc::clone(&registry);
        let worker_dispatcher = dispatcher.clone();
        thread::Builder::new()
            .name("pathwatch-io".into())
            .spawn(move || run_worker(worker_shared, worker_registry, worker_dispatcher))
            .map_err(|source| WatchError::WorkerSpawn { source })?;

        Ok(Self {
            shared,
            registry,
            dispatcher,
        })
    }

    // --- Queued file operations -----------------------------------------

    /// Create a single directory; parents must already exist.
    pub fn create_directory(
        &self,
        path: PathBuf,
        on_done: impl FnOnce(Result<(), FsError>) + Send + 'static,
    ) -> Result<(), FsError> {
        self.submit(Box::new(move |dispatcher| {
            let result = ops::create_directory(&path);
            dispatcher.dispatch_task(Box::new(move || on_done(result)));
        }))
    }

    /// Create a directory and any missing parents.
    pub fn create_directories(
        &self,
        path: PathBuf,
        on_done: impl FnOnce(Result<(), FsError>) + Send + 'static,
    ) -> Result<(), FsError> {
        self.submit(Box::new(move |dispatcher| {
            let result = ops::create_directories(&path);
            dispatcher.dispatch_task(Box::new(move || on_done(result)));
        }))
    }

    /// Create an empty file; fails when the target already exists.
    pub fn create_file(
        &self,
        path: PathBuf,
        on_done: impl FnOnce(Result<(), FsError>) + Send + 'static,
    ) -> Result<(), FsError> {
        self.submit(Box::new(move |dispatcher| {
            let result = ops::create_file(&path);
            dispatcher.dispatch_task(Box::new(move || on_done(result)));
        }))
    }

    /// Remove a file or empty directory; resolves to whether the path
    /// existed.
    pub fn delete(
        &self,
        path: PathBuf,
        on_done: impl FnOnce(Result<bool, FsError>) + Send + 'static,
    ) -> Result<(), FsError> {
        self.submit(Box::new(move |dispatcher| {
            let result = ops::delete(&path);
            dispatcher.dispatch_task(Box::new(move || on_done(result)));
        }))
    }

    /// Recursively remove a subtree; a missing root is not an error.
    pub fn delete_tree(
        &self,
        path: PathBuf,
        on_done: impl FnOnce(Result<(), FsError>) + Send + 'static,
    ) -> Result<(), FsError> {
        self.submit(Box::new(move |dispatcher| {
            let result = ops::delete_tree(&path);
            dispatcher.dispatch_task(Box::new(move || on_done(result)));
        }))
    }

    /// Read a file's raw bytes.
    pub fn read_binary_file(
        &self,
        path: PathBuf,
        on_done: impl FnOnce(Result<Vec<u8>, FsError>) + Send + 'static,
    ) -> Result<(), FsError> {
        self.submit(Box::new(move |dispatcher| {
            let result = ops::read_binary_file(&path);
            dispatcher.dispatch_task(Box::new(move || on_done(result)));
        }))
    }

    /// Read and decode a text file.
    pub fn read_text_file(
        &self,
        path: PathBuf,
        charset: Charset,
        on_done: impl FnOnce(Result<String, FsError>) + Send + 'static,
    ) -> Result<(), FsError> {
        self.submit(Box::new(move |dispatcher| {
            let result = ops::read_text_file(&path, charset);
            dispatcher.dispatch_task(Box::new(move || on_done(result)));
        }))
    }

    /// Write raw bytes, truncating existing content; resolves to the new
    /// modification time.
    pub fn write_binary_file(
        &self,
        path: PathBuf,
        bytes: Vec<u8>,
        on_done: impl FnOnce(Result<SystemTime, FsError>) + Send + 'static,
    ) -> Result<(), FsError> {
        self.submit(Box::new(move |dispatcher| {
            let result = ops::write_binary_file(&path, &bytes);
            dispatcher.dispatch_task(Box::new(move || on_done(result)));
        }))
    }

    /// Encode and write text content, truncating existing content; resolves
    /// to the new modification time.
    pub fn write_text_file(
        &self,
        path: PathBuf,
        content: String,
        charset: Charset,
        on_done: impl FnOnce(Result<SystemTime, FsError>) + Send + 'static,
    ) -> Result<(), FsError> {
        self.submit(Box::new(move |dispatcher| {
            let result = ops::write_text_file(&path, &content, charset);
            dispatcher.dispatch_task(Box::new(move || on_done(result)));
        }))
    }

    /// Build a recursively sorted snapshot of a subtree.
    pub fn tree_snapshot(
        &self,
        path: PathBuf,
        on_done: impl FnOnce(Result<PathElement, FsError>) + Send + 'static,
    ) -> Result<(), FsError> {
        self.submit(Box::new(move |dispatcher| {
            let result = snapshot::tree_snapshot(&path);
            dispatcher.dispatch_task(Box::new(move || on_done(result)));
        }))
    }

    // --- Watch API -------------------------------------------------------

    /// Register a directory for change notifications.
    pub fn watch(&self, path: &Path) -> Result<(), WatchError> {
        self.registry.watch(path)
    }

    /// Watch `path` and its ancestors up to, but excluding, `ancestor`.
    pub fn watch_up(&self, path: &Path, ancestor: Option<&Path>) -> Result<(), WatchError> {
        self.registry.watch_up(path, ancestor)
    }

    /// Remove a watch registration; a non-watched path is a no-op.
    pub fn unwatch(&self, path: &Path) -> Result<(), WatchError> {
        self.registry.unwatch(path)
    }

    /// Unwatch `path` and its ancestors up to, but excluding, `ancestor`.
    pub fn unwatch_up(&self, path: &Path, ancestor: Option<&Path>) -> Result<(), WatchError> {
        self.registry.unwatch_up(path, ancestor)
    }

    /// Whether a valid watch registration exists for exactly this path.
    pub fn is_watched(&self, path: &Path) -> bool {
        self.registry.is_watched(path)
    }

    /// Like [`watch`](Self::watch), but pushes a failure onto the error
    /// stream instead of returning it.
    pub fn watch_or_stream_error(&self, path: &Path) {
        if let Err(error) = self.watch(path) {
            self.dispatcher.dispatch_error(error);
        }
    }

    /// Like [`watch_up`](Self::watch_up), but pushes a failure onto the
    /// error stream instead of returning it.
    pub fn watch_up_or_stream_error(&self, path: &Path, ancestor: Option<&Path>) {
        if let Err(error) = self.watch_up(path, ancestor) {
            self.dispatcher.dispatch_error(error);
        }
    }

    /// Like [`unwatch`](Self::unwatch), but pushes a failure onto the error
    /// stream instead of returning it.
    pub fn unwatch_or_stream_error(&self, path: &Path) {
        if let Err(error) = self.unwatch(path) {
            self.dispatcher.dispatch_error(error);
        }
    }

    /// Like [`unwatch_up`](Self::unwatch_up), but pushes a failure onto the
    /// error stream instead of returning it.
    pub fn unwatch_up_or_stream_error(&self, path: &Path, ancestor: Option<&Path>) {
        if let Err(error) = self.unwatch_up(path, ancestor) {
            self.dispatcher.dispatch_error(error);
        }
    }

    // --- Streams ---------------------------------------------------------

    /// Subscribe to watch-notification batches. Deliveries arrive on the
    /// scheduler's execution context, in production order.
    pub fn subscribe_events(&self, subscriber: impl Fn(DirectoryEvent) + Send + Sync + 'static) {
        self.dispatcher.subscribe_events(subscriber);
    }

    /// Subscribe to the error stream.
    pub fn subscribe_errors(
        &self,
        subscriber: impl Fn(Arc<WatchError>) + Send + Sync + 'static,
    ) {
        self.dispatcher.subscribe_errors(subscriber);
    }

    // --- Lifecycle -------------------------------------------------------

    /// Request shutdown. Idempotent and asynchronous: pending operations
    /// already queued are abandoned, the native watch source is closed, and
    /// the worker thread terminates. Submissions made after this call fail
    /// fast.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock().expect("scheduler lock poisoned");
        if !state.shutdown {
            state.shutdown = true;
            tracing::debug!("scheduler shutdown requested");
        }
        self.shared.wakeup.notify_one();
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shared
            .state
            .lock()
            .expect("scheduler lock poisoned")
            .shutdown
    }

    /// Whether the worker thread has actually terminated.
    pub fn is_shutdown_complete(&self) -> bool {
        self.shared.shutdown_complete.load(Ordering::SeqCst)
    }

    fn submit(&self, operation: Operation) -> Result<(), FsError> {
        let mut state = self.shared.state.lock().expect("scheduler lock poisoned");
        if state.shutdown {
            return Err(FsError::SchedulerShutDown);
        }
        state.queue.push_back(operation);
        self.shared.wakeup.notify_one();
        Ok(())
    }
}

/// The worker loop.
///
/// Strict per-iteration priority: pending notifications first, then a
/// requested shutdown, then a complete drain of the operation queue; only
/// when all three are empty does the loop block on the condvar.
fn run_worker(shared: Arc<Shared>, registry: Arc<WatchKeyRegistry>, dispatcher: EventDispatcher) {
    tracing::debug!("worker thread started");
    loop {
        match next_step(&shared) {
            Step::Notifications(raw) => {
                let (batches, errors) = package_batches(raw, &registry);
                for error in errors {
                    dispatcher.dispatch_error(error);
                }
                for batch in batches {
                    dispatcher.dispatch_event(batch);
                }
            }
            Step::Shutdown => {
                registry.shutdown();
                break;
            }
            Step::Drain(operations) => {
                for operation in operations {
                    // One failing operation never stops the drain.
                    let run = AssertUnwindSafe(|| operation(&dispatcher));
                    if catch_unwind(run).is_err() {
                        tracing::error!("queued operation panicked; continuing drain");
                    }
                }
            }
        }
    }
    shared.shutdown_complete.store(true, Ordering::SeqCst);
    tracing::debug!("worker thread terminated");
}

fn next_step(shared: &Shared) -> Step {
    let mut state = shared.state.lock().expect("scheduler lock poisoned");
    loop {
        if !state.notifications.is_empty() {
            return Step::Notifications(state.notifications.drain(..).collect());
        }
        if state.shutdown {
            return Step::Shutdown;
        }
        if !state.queue.is_empty() {
            return Step::Drain(state.queue.drain(..).collect());
        }
        state = shared.wakeup.wait(state).expect("scheduler lock poisoned");
    }
}

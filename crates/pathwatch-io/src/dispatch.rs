//! Cross-thread delivery of results, events, and errors.
//!
//! The dispatcher never runs consumer code on the worker thread: every
//! delivery is marshalled onto the caller-supplied [`TaskExecutor`]. A
//! rejected or panicking delivery is logged and swallowed so it cannot take
//! down the worker loop.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use thiserror::Error;

use crate::error::WatchError;
use crate::event::DirectoryEvent;

/// A unit of work handed to an execution context.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// The target execution context has shut down and accepts no more tasks.
#[derive(Debug, Error)]
#[error("Target execution context is closed")]
pub struct ExecutorClosed;

/// A caller-supplied execution context.
///
/// Implementations must run accepted tasks in submission order; the
/// per-subscriber ordering guarantees of the dispatcher rely on it.
pub trait TaskExecutor: Send + Sync {
    /// Run `task` on this context.
    fn execute(&self, task: Task) -> Result<(), ExecutorClosed>;
}

/// An execution context backed by one dedicated consumer thread.
///
/// Tasks run strictly in submission order. The thread exits when the
/// executor is dropped and the queue has drained.
pub struct ThreadExecutor {
    tx: mpsc::Sender<Task>,
}

impl ThreadExecutor {
    /// Spawn the consumer thread and return the executor.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel::<Task>();
        thread::Builder::new()
            .name("pathwatch-consumer".into())
            .spawn(move || {
                while let Ok(task) = rx.recv() {
                    task();
                }
            })
            .expect("failed to spawn consumer thread");
        Self { tx }
    }
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskExecutor for ThreadExecutor {
    fn execute(&self, task: Task) -> Result<(), ExecutorClosed> {
        self.tx.send(task).map_err(|_| ExecutorClosed)
    }
}

/// An execution context that runs tasks on a tokio runtime.
///
/// All tasks pass through a single forwarding task, so deliveries stay FIFO
/// even on a multi-threaded runtime.
pub struct TokioExecutor {
    tx: tokio::sync::mpsc::UnboundedSender<Task>,
}

impl TokioExecutor {
    /// Create an executor that forwards onto the given runtime handle.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Task>();
        handle.spawn(async move {
            while let Some(task) = rx.recv().await {
                task();
            }
        });
        Self { tx }
    }

    /// Create an executor for the current tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

impl TaskExecutor for TokioExecutor {
    fn execute(&self, task: Task) -> Result<(), ExecutorClosed> {
        self.tx.send(task).map_err(|_| ExecutorClosed)
    }
}

type EventSubscriber = Arc<dyn Fn(DirectoryEvent) + Send + Sync>;
type ErrorSubscriber = Arc<dyn Fn(Arc<WatchError>) + Send + Sync>;

/// Relays worker output onto the consumer's execution context.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    executor: Arc<dyn TaskExecutor>,
    event_subscribers: Mutex<Vec<EventSubscriber>>,
    error_subscribers: Mutex<Vec<ErrorSubscriber>>,
}

impl EventDispatcher {
    /// Create a dispatcher targeting the given execution context.
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                executor,
                event_subscribers: Mutex::new(Vec::new()),
                error_subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Subscribe to watch-notification batches.
    pub fn subscribe_events(&self, subscriber: impl Fn(DirectoryEvent) + Send + Sync + 'static) {
        self.inner
            .event_subscribers
            .lock()
            .expect("subscriber list poisoned")
            .push(Arc::new(subscriber));
    }

    /// Subscribe to the error stream.
    pub fn subscribe_errors(&self, subscriber: impl Fn(Arc<WatchError>) + Send + Sync + 'static) {
        self.inner
            .error_subscribers
            .lock()
            .expect("subscriber list poisoned")
            .push(Arc::new(subscriber));
    }

    /// Deliver a notification batch to every event subscriber.
    pub fn dispatch_event(&self, event: DirectoryEvent) {
        let subscribers = self
            .inner
            .event_subscribers
            .lock()
            .expect("subscriber list poisoned")
            .clone();
        for subscriber in subscribers {
            let event = event.clone();
            self.run(Box::new(move || subscriber(event)));
        }
    }

    /// Deliver an error to every error subscriber.
    pub fn dispatch_error(&self, error: WatchError) {
        let error = Arc::new(error);
        let subscribers = self
            .inner
            .error_subscribers
            .lock()
            .expect("subscriber list poisoned")
            .clone();
        for subscriber in subscribers {
            let error = Arc::clone(&error);
            self.run(Box::new(move || subscriber(error)));
        }
    }

    /// Deliver an operation result continuation.
    pub fn dispatch_task(&self, task: Task) {
        self.run(task);
    }

    fn run(&self, task: Task) {
        let isolated: Task = Box::new(move || {
            if catch_unwind(AssertUnwindSafe(task)).is_err() {
                tracing::error!("consumer callback panicked; delivery isolated");
            }
        });
        if self.inner.executor.execute(isolated).is_err() {
            tracing::warn!("target execution context rejected delivery; dropping it");
        }
    }
}

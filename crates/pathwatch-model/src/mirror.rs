//! Drives a [`DirectoryModel`] from live watch-notification batches.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use pathwatch_core::{Initiator, PathElement};
use pathwatch_io::{DirectoryEvent, FsScheduler};

use crate::model::DirectoryModel;

/// Keeps a shared [`DirectoryModel`] consistent with the filesystem.
///
/// Every notification batch is answered with a fresh snapshot of the
/// signalled directory, so overflowed or coalesced notification runs
/// converge on the real filesystem state instead of being interpreted
/// change by change. A batch whose watch key failed to reset drops the
/// whole watched subtree from the model.
#[derive(Clone)]
pub struct TreeMirror {
    scheduler: FsScheduler,
    model: Arc<Mutex<DirectoryModel>>,
    initiator: Initiator,
}

impl TreeMirror {
    /// Create a mirror reconciling `model` through `scheduler`, tagging
    /// every resulting update with `initiator`.
    pub fn new(
        scheduler: FsScheduler,
        model: Arc<Mutex<DirectoryModel>>,
        initiator: Initiator,
    ) -> Self {
        Self {
            scheduler,
            model,
            initiator,
        }
    }

    /// Respond to one notification batch.
    pub fn handle_event(&self, event: &DirectoryEvent) {
        if !event.reset_succeeded {
            // The watched directory itself is gone.
            self.model
                .lock()
                .expect("model lock poisoned")
                .drop_subtree(&event.watched_path, Some(&self.initiator));
            return;
        }
        self.refresh(event.watched_path.clone());
    }

    /// Queue a snapshot of `watched` and reconcile the model with the
    /// result; a directory that vanished in the meantime is dropped from
    /// the model instead.
    pub fn refresh(&self, watched: PathBuf) {
        let model = Arc::clone(&self.model);
        let scheduler = self.scheduler.clone();
        let initiator = self.initiator.clone();
        let submitted = self.scheduler.tree_snapshot(watched.clone(), move |result| {
            let mut model = model.lock().expect("model lock poisoned");
            match result {
                Ok(snapshot) => {
                    model.sync(&snapshot, Some(&initiator));
                    watch_tree(&scheduler, &snapshot);
                }
                Err(error) if error.is_not_found() => {
                    model.drop_subtree(&watched, Some(&initiator));
                }
                Err(error) => {
                    tracing::warn!(path = %watched.display(), %error, "re-snapshot failed");
                }
            }
        });
        if submitted.is_err() {
            tracing::debug!("scheduler shut down while refreshing the mirror");
        }
    }
}

/// Register a watch for every directory in the snapshot. Already-watched
/// directories are no-ops; failures go to the scheduler's error stream.
pub fn watch_tree(scheduler: &FsScheduler, element: &PathElement) {
    if !element.is_directory {
        return;
    }
    scheduler.watch_or_stream_error(&element.path);
    for child in &element.children {
        watch_tree(scheduler, child);
    }
}

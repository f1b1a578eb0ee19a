//! The reconciliation output contract.

use std::path::Path;
use std::sync::mpsc;

use pathwatch_core::{Initiator, Update, UpdateKind};

use crate::error::ModelError;

/// Receives every mutation and inconsistency the model produces.
///
/// `initiator == None` marks a corrective mutation the reconciler performed
/// to repair a kind mismatch, as opposed to an observed or requested change.
pub trait Reporter: Send + Sync {
    fn report_creation(&self, base_dir: &Path, relative_path: &Path, initiator: Option<&Initiator>);
    fn report_deletion(&self, base_dir: &Path, relative_path: &Path, initiator: Option<&Initiator>);
    fn report_modification(
        &self,
        base_dir: &Path,
        relative_path: &Path,
        initiator: Option<&Initiator>,
    );
    fn report_error(&self, error: ModelError);
}

/// One item on a [`ChannelReporter`] stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    Update(Update),
    Error(ModelError),
}

/// A [`Reporter`] that forwards everything into an mpsc channel.
///
/// For consumers that want a stream of [`ModelEvent`]s instead of callbacks.
/// Deliveries to a disconnected receiver are silently dropped.
pub struct ChannelReporter {
    tx: mpsc::Sender<ModelEvent>,
}

impl ChannelReporter {
    /// Create the reporter and the receiving end of its stream.
    pub fn new() -> (Self, mpsc::Receiver<ModelEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: ModelEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("model event receiver disconnected; dropping event");
        }
    }

    fn send_update(
        &self,
        base_dir: &Path,
        relative_path: &Path,
        initiator: Option<&Initiator>,
        kind: UpdateKind,
    ) {
        self.send(ModelEvent::Update(Update::new(
            base_dir,
            relative_path,
            initiator.cloned(),
            kind,
        )));
    }
}

impl Reporter for ChannelReporter {
    fn report_creation(&self, base_dir: &Path, relative_path: &Path, initiator: Option<&Initiator>) {
        self.send_update(base_dir, relative_path, initiator, UpdateKind::Creation);
    }

    fn report_deletion(&self, base_dir: &Path, relative_path: &Path, initiator: Option<&Initiator>) {
        self.send_update(base_dir, relative_path, initiator, UpdateKind::Deletion);
    }

    fn report_modification(
        &self,
        base_dir: &Path,
        relative_path: &Path,
        initiator: Option<&Initiator>,
    ) {
        self.send_update(base_dir, relative_path, initiator, UpdateKind::Modification);
    }

    fn report_error(&self, error: ModelError) {
        self.send(ModelEvent::Error(error));
    }
}

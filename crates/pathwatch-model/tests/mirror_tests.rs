//! Tests driving the mirror with synthetic notification batches.

use std::fs;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pathwatch_core::{Initiator, UpdateKind};
use pathwatch_io::{ChangeKind, DirectoryChange, DirectoryEvent, FsScheduler, ThreadExecutor};
use pathwatch_model::{ChannelReporter, DirectoryModel, ModelEvent, TreeMirror};
use tempfile::TempDir;

const UPDATE_TIMEOUT: Duration = Duration::from_secs(10);

fn mirror_for(root: &Path) -> (TreeMirror, Arc<Mutex<DirectoryModel>>, Receiver<ModelEvent>) {
    let scheduler = FsScheduler::new(Arc::new(ThreadExecutor::new())).unwrap();
    let (reporter, rx) = ChannelReporter::new();
    let model = Arc::new(Mutex::new(DirectoryModel::new(root, Arc::new(reporter))));
    let mirror = TreeMirror::new(scheduler, Arc::clone(&model), Initiator::external());
    (mirror, model, rx)
}

fn overflow_batch(watched: &Path) -> DirectoryEvent {
    DirectoryEvent {
        watched_path: watched.to_path_buf(),
        changes: vec![DirectoryChange {
            kind: ChangeKind::Overflow,
            name: "".into(),
        }],
        reset_succeeded: true,
    }
}

/// Block until `count` updates arrive, returning (kind, relative path) rows.
fn next_updates(rx: &Receiver<ModelEvent>, count: usize) -> Vec<(UpdateKind, String)> {
    let deadline = Instant::now() + UPDATE_TIMEOUT;
    let mut rows = Vec::new();
    while rows.len() < count {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining).expect("timed out waiting for updates") {
            ModelEvent::Update(update) => rows.push((
                update.kind,
                update.relative_path.to_string_lossy().into_owned(),
            )),
            ModelEvent::Error(error) => panic!("unexpected model error: {error}"),
        }
    }
    rows
}

#[test]
fn overflow_batch_triggers_full_resync() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir(root.join("sub")).unwrap();
    fs::write(root.join("sub/inner.txt"), "x").unwrap();
    fs::write(root.join("seen.txt"), "x").unwrap();

    let (mirror, model, rx) = mirror_for(root);

    // An overflow carries no usable change list; the mirror must answer it
    // with a fresh snapshot of the whole watched path.
    mirror.handle_event(&overflow_batch(root));

    let rows = next_updates(&rx, 3);
    assert_eq!(
        rows,
        vec![
            (UpdateKind::Creation, "sub".into()),
            (UpdateKind::Creation, "sub/inner.txt".into()),
            (UpdateKind::Creation, "seen.txt".into()),
        ]
    );
    let model = model.lock().unwrap();
    assert!(model.contains(&root.join("sub/inner.txt")));
    assert_eq!(model.node_count(), 3);
}

#[test]
fn failed_reset_drops_the_watched_subtree() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let gone = root.join("gone");
    fs::create_dir(&gone).unwrap();
    fs::write(gone.join("f.txt"), "x").unwrap();
    fs::create_dir(root.join("kept")).unwrap();

    let (mirror, model, rx) = mirror_for(root);
    mirror.refresh(root.to_path_buf());
    next_updates(&rx, 3);

    mirror.handle_event(&DirectoryEvent {
        watched_path: gone.clone(),
        changes: Vec::new(),
        reset_succeeded: false,
    });

    assert_eq!(
        next_updates(&rx, 2),
        vec![
            (UpdateKind::Deletion, "gone/f.txt".into()),
            (UpdateKind::Deletion, "gone".into()),
        ]
    );
    let model = model.lock().unwrap();
    assert!(!model.contains(&gone));
    assert!(model.contains(&root.join("kept")));
}

#[test]
fn vanished_directory_is_dropped_on_refresh() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let sub = root.join("sub");
    fs::create_dir(&sub).unwrap();

    let (mirror, model, rx) = mirror_for(root);
    mirror.refresh(root.to_path_buf());
    next_updates(&rx, 1);

    // The directory disappears between the notification and the snapshot.
    fs::remove_dir(&sub).unwrap();
    mirror.handle_event(&DirectoryEvent {
        watched_path: sub.clone(),
        changes: vec![DirectoryChange {
            kind: ChangeKind::Modified,
            name: "x".into(),
        }],
        reset_succeeded: true,
    });

    assert_eq!(
        next_updates(&rx, 1),
        vec![(UpdateKind::Deletion, "sub".into())]
    );
    assert!(!model.lock().unwrap().contains(&sub));
}

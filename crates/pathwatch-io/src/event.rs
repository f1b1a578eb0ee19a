//! Watch-notification batches and their packaging from native events.

use std::path::{Path, PathBuf};

use compact_str::CompactString;
use indexmap::IndexMap;
use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};
use serde::{Deserialize, Serialize};

use crate::error::WatchError;
use crate::registry::WatchKeyRegistry;

/// The kind of a single observed change under a watched directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// An entry appeared.
    Created,
    /// An entry disappeared.
    Deleted,
    /// An entry's content changed.
    Modified,
    /// The native notification queue overran; some events were lost and the
    /// state of the watched directory must be treated as unknown.
    Overflow,
}

/// One observed change: a kind plus the entry name within the watched
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryChange {
    /// What happened.
    pub kind: ChangeKind,
    /// Name of the affected entry relative to the watched directory; empty
    /// for changes that concern the watched directory itself.
    pub name: CompactString,
}

/// A batch of changes observed for one watched directory in one poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEvent {
    /// The watched directory this batch belongs to.
    pub watched_path: PathBuf,

    /// Observed changes, in arrival order.
    pub changes: Vec<DirectoryChange>,

    /// False when the watch key could not be re-armed, typically because the
    /// watched directory itself was removed. Consumers must drop the
    /// corresponding model subtree instead of interpreting the changes.
    pub reset_succeeded: bool,
}

impl DirectoryEvent {
    fn new(watched_path: PathBuf) -> Self {
        Self {
            watched_path,
            changes: Vec::new(),
            reset_succeeded: true,
        }
    }

    /// Whether this batch carries an overflow indicator.
    pub fn needs_rescan(&self) -> bool {
        self.changes.iter().any(|c| c.kind == ChangeKind::Overflow)
    }
}

/// Package raw native notifications into per-key batches.
///
/// Runs on the worker thread once per poll cycle. Deletion of a watched
/// directory (observed either through its parent's key or through its own)
/// invalidates that key in the registry and marks the key's batch as failed
/// to reset.
pub(crate) fn package_batches(
    raw: Vec<notify::Result<notify::Event>>,
    registry: &WatchKeyRegistry,
) -> (Vec<DirectoryEvent>, Vec<WatchError>) {
    let mut batches: IndexMap<PathBuf, DirectoryEvent> = IndexMap::new();
    let mut errors = Vec::new();
    let mut deleted_paths: Vec<PathBuf> = Vec::new();

    for item in raw {
        let event = match item {
            Ok(event) => event,
            Err(source) => {
                errors.push(WatchError::Backend { source });
                continue;
            }
        };

        if event.need_rescan() {
            let affected: Vec<PathBuf> = if event.paths.is_empty() {
                // Overflow without attribution: every live key is suspect.
                registry.watched_paths()
            } else {
                event
                    .paths
                    .iter()
                    .filter_map(|p| attribute(p, registry).map(|(watched, _)| watched))
                    .collect()
            };
            for watched in affected {
                batches
                    .entry(watched.clone())
                    .or_insert_with(|| DirectoryEvent::new(watched))
                    .changes
                    .push(DirectoryChange {
                        kind: ChangeKind::Overflow,
                        name: CompactString::default(),
                    });
            }
            continue;
        }

        for (path, kind) in map_changes(&event) {
            let Some((watched, name)) = attribute(&path, registry) else {
                continue;
            };
            if kind == ChangeKind::Deleted {
                deleted_paths.push(path.clone());
            }
            batches
                .entry(watched.clone())
                .or_insert_with(|| DirectoryEvent::new(watched))
                .changes
                .push(DirectoryChange { kind, name });
        }
    }

    // A deleted entry that was itself a watched directory kills its key.
    for path in deleted_paths {
        if registry.is_watched(&path) {
            registry.invalidate(&path);
            batches
                .entry(path.clone())
                .or_insert_with(|| DirectoryEvent::new(path))
                .reset_succeeded = false;
        }
    }

    // Externally removed watched directories may produce no self event on
    // some platforms; verify each signalled key still points at a directory.
    for (watched, batch) in batches.iter_mut() {
        if batch.reset_succeeded && !watched.is_dir() {
            registry.invalidate(watched);
            batch.reset_succeeded = false;
        }
    }

    (batches.into_values().collect(), errors)
}

/// Map a native event onto (absolute path, change kind) pairs.
fn map_changes(event: &notify::Event) -> Vec<(PathBuf, ChangeKind)> {
    match &event.kind {
        EventKind::Create(_) => event
            .paths
            .iter()
            .map(|p| (p.clone(), ChangeKind::Created))
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .map(|p| (p.clone(), ChangeKind::Deleted))
            .collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::Both => {
                let mut changes = Vec::new();
                if let Some(from) = event.paths.first() {
                    changes.push((from.clone(), ChangeKind::Deleted));
                }
                if let Some(to) = event.paths.get(1) {
                    changes.push((to.clone(), ChangeKind::Created));
                }
                changes
            }
            RenameMode::From => event
                .paths
                .iter()
                .map(|p| (p.clone(), ChangeKind::Deleted))
                .collect(),
            RenameMode::To => event
                .paths
                .iter()
                .map(|p| (p.clone(), ChangeKind::Created))
                .collect(),
            // Ambiguous rename: treat as content change and let the consumer
            // re-snapshot.
            _ => event
                .paths
                .iter()
                .map(|p| (p.clone(), ChangeKind::Modified))
                .collect(),
        },
        EventKind::Modify(ModifyKind::Metadata(_)) | EventKind::Access(_) => Vec::new(),
        EventKind::Modify(_) => event
            .paths
            .iter()
            .map(|p| (p.clone(), ChangeKind::Modified))
            .collect(),
        _ => Vec::new(),
    }
}

/// Resolve the watched key an event path belongs to.
///
/// Events about entries inside a watched directory attribute to that
/// directory; an event about a watched directory itself (its own deletion)
/// attributes to its own key when the parent is not watched.
fn attribute(path: &Path, registry: &WatchKeyRegistry) -> Option<(PathBuf, CompactString)> {
    if let Some(parent) = path.parent() {
        if registry.is_watched(parent) {
            let name = path
                .file_name()
                .map(|n| CompactString::new(n.to_string_lossy()))
                .unwrap_or_default();
            return Some((parent.to_path_buf(), name));
        }
    }
    if registry.is_watched(path) {
        // The change concerns the watched directory itself.
        return Some((path.to_path_buf(), CompactString::default()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, RemoveKind};

    #[test]
    fn create_and_remove_map_to_changes() {
        let event = notify::Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/w/a.txt"));
        assert_eq!(
            map_changes(&event),
            vec![(PathBuf::from("/w/a.txt"), ChangeKind::Created)]
        );

        let event = notify::Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/w/a.txt"));
        assert_eq!(
            map_changes(&event),
            vec![(PathBuf::from("/w/a.txt"), ChangeKind::Deleted)]
        );
    }

    #[test]
    fn rename_maps_to_delete_plus_create() {
        let event = notify::Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/w/old.txt"))
            .add_path(PathBuf::from("/w/new.txt"));
        assert_eq!(
            map_changes(&event),
            vec![
                (PathBuf::from("/w/old.txt"), ChangeKind::Deleted),
                (PathBuf::from("/w/new.txt"), ChangeKind::Created),
            ]
        );
    }

    #[test]
    fn access_events_are_dropped() {
        let event = notify::Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/w/a.txt"));
        assert!(map_changes(&event).is_empty());
    }

    #[test]
    fn self_attributed_changes_carry_an_empty_name() {
        let registry = WatchKeyRegistry::new(|_| {}).unwrap();
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("watched");
        std::fs::create_dir(&dir).unwrap();
        registry.watch(&dir).unwrap();
        std::fs::remove_dir(&dir).unwrap();

        // The watched directory's own deletion, seen through its own key.
        let event =
            notify::Event::new(EventKind::Remove(RemoveKind::Folder)).add_path(dir.clone());
        let (batches, errors) = package_batches(vec![Ok(event)], &registry);

        assert!(errors.is_empty());
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].watched_path, dir);
        assert_eq!(batches[0].changes[0].name, "");
        assert!(!batches[0].reset_succeeded);
        assert!(!registry.is_watched(&dir));
    }

    #[test]
    fn needs_rescan_detects_overflow() {
        let mut event = DirectoryEvent::new(PathBuf::from("/w"));
        assert!(!event.needs_rescan());
        event.changes.push(DirectoryChange {
            kind: ChangeKind::Overflow,
            name: CompactString::default(),
        });
        assert!(event.needs_rescan());
    }
}

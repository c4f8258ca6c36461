/// Store file watcher using notify-debouncer-full.
///
/// Watches the directory holding a `LocalCardStore` file and hands debounced
/// events for that file to the store, which reloads and publishes a snapshot
/// unless the change was its own write.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{EventKind, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebouncedEvent, Debouncer, RecommendedCache};

use super::types::StoreFileEvent;
use crate::storage::local::LocalCardStore;

/// Debounce window for filesystem events (cloud sync folders fire in bursts).
const DEBOUNCE_DURATION: Duration = Duration::from_millis(500);

/// Keeps the watch alive; dropping it stops watching.
pub struct StoreWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher, RecommendedCache>,
    path: PathBuf,
}

impl StoreWatcher {
    /// Start watching `store`'s file.
    pub fn watch(store: Arc<LocalCardStore>) -> Result<Self, notify::Error> {
        let path = canonical(store.path());
        let target = path.clone();

        let mut debouncer = new_debouncer(
            DEBOUNCE_DURATION,
            None,
            move |result: Result<Vec<DebouncedEvent>, Vec<notify::Error>>| match result {
                Ok(events) => {
                    for event in events {
                        if let Some(store_event) = classify(&event, &target) {
                            store.handle_file_event(&store_event);
                        }
                    }
                }
                Err(errors) => {
                    for e in errors {
                        log::error!("[board.watcher.error] Watch error: {}", e);
                    }
                }
            },
        )?;

        // Watch the parent: atomic rename replaces the file's inode.
        let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        debouncer.watch(&dir, RecursiveMode::NonRecursive)?;
        log::info!("[board.watcher.store] Watching card store at {:?}", path);

        Ok(Self {
            _debouncer: debouncer,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn canonical(path: &Path) -> PathBuf {
    if let Ok(p) = std::fs::canonicalize(path) {
        return p;
    }
    // File may not exist yet; canonicalize the directory instead.
    match (path.parent(), path.file_name()) {
        (Some(dir), Some(name)) => std::fs::canonicalize(dir)
            .map(|d| d.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

/// Map a debounced event to a store event if it concerns `target`.
fn classify(event: &DebouncedEvent, target: &Path) -> Option<StoreFileEvent> {
    let path = event.paths.iter().map(|p| canonical(p)).find(|p| p == target)?;
    match event.kind {
        EventKind::Remove(_) => Some(StoreFileEvent::Deleted { path }),
        EventKind::Create(_) => Some(StoreFileEvent::Created { path }),
        EventKind::Modify(_) => Some(StoreFileEvent::Changed { path }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use notify::Event;
    use std::time::Instant;

    fn debounced(kind: EventKind, path: &Path) -> DebouncedEvent {
        DebouncedEvent::new(Event::new(kind).add_path(path.to_path_buf()), Instant::now())
    }

    #[test]
    fn test_classify_only_target_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("cards.json");
        std::fs::write(&target, "{}").unwrap();
        let target = canonical(&target);

        let other = dir.path().join("notes.txt");
        assert!(classify(&debounced(EventKind::Modify(ModifyKind::Any), &other), &target).is_none());

        assert_eq!(
            classify(&debounced(EventKind::Modify(ModifyKind::Any), &target), &target),
            Some(StoreFileEvent::Changed { path: target.clone() })
        );
        assert_eq!(
            classify(&debounced(EventKind::Create(CreateKind::File), &target), &target),
            Some(StoreFileEvent::Created { path: target.clone() })
        );
    }

    #[test]
    fn test_classify_remove_of_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = canonical(&dir.path().join("cards.json"));
        assert_eq!(
            classify(&debounced(EventKind::Remove(RemoveKind::File), &target), &target),
            Some(StoreFileEvent::Deleted { path: target.clone() })
        );
    }
}

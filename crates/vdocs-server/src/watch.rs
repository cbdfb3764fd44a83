//! Change propagation into the engine.
//!
//! Two sources feed the engine while the server runs:
//! - storage events for every location of the live registry, forwarded to
//!   [`Engine::handle_event`] from a dedicated thread
//! - the registry descriptor file, watched with `notify`; a valid new
//!   registry is swapped in and storage watches follow its locations

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use vdocs_site::Engine;
use vdocs_storage::{ContentStore, StorageError, WatchHandle};

/// Quiet period after a descriptor change before reloading.
const REGISTRY_DEBOUNCE: Duration = Duration::from_millis(200);

/// Error starting a watcher.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The content store refused to watch.
    #[error("Failed to watch storage: {0}")]
    Storage(#[from] StorageError),
    /// The descriptor file could not be watched.
    #[error("Failed to watch registry descriptor: {0}")]
    Notify(#[from] notify::Error),
    /// The event forwarding thread could not be started.
    #[error("Failed to start event thread: {0}")]
    Thread(#[from] std::io::Error),
}

/// Forwards storage events for the registry's current locations.
pub(crate) struct StorageWatch {
    engine: Arc<Engine>,
    store: Arc<dyn ContentStore>,
    state: Mutex<Option<(Vec<String>, WatchHandle)>>,
}

impl StorageWatch {
    pub(crate) fn new(engine: Arc<Engine>, store: Arc<dyn ContentStore>) -> Self {
        Self {
            engine,
            store,
            state: Mutex::new(None),
        }
    }

    /// Watch the live registry's locations, unless they are already watched.
    ///
    /// Replacing the handle stops the previous watch, which ends its
    /// forwarding thread.
    pub(crate) fn sync(&self) -> Result<(), WatchError> {
        let locations = self.engine.locations();
        let mut state = self.state.lock();
        if state.as_ref().is_some_and(|(watched, _)| *watched == locations) {
            return Ok(());
        }

        let (events, handle) = self.store.watch(&locations)?;
        let engine = Arc::clone(&self.engine);
        std::thread::Builder::new()
            .name("vdocs-storage-events".to_owned())
            .spawn(move || {
                for event in events.iter() {
                    engine.handle_event(&event);
                }
            })?;

        tracing::info!(locations = locations.len(), "Watching storage");
        *state = Some((locations, handle));
        Ok(())
    }

    /// Reload the registry descriptor and follow its locations.
    ///
    /// A descriptor that fails to load leaves the previous registry live.
    pub(crate) async fn reload_registry(&self) {
        let engine = Arc::clone(&self.engine);
        let swap = match tokio::task::spawn_blocking(move || engine.reload_registry()).await {
            Ok(Ok(swap)) => swap,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Registry reload failed, keeping previous registry");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "Registry reload task failed");
                return;
            }
        };

        tracing::info!(
            stale = swap.stale_pairs().len(),
            locations = self.engine.locations().len(),
            "Registry reloaded"
        );
        if let Err(e) = self.sync() {
            tracing::error!(error = %e, "Failed to re-establish storage watches");
        }
    }
}

/// Watch the registry descriptor at `path` and reload on change.
///
/// The returned watcher must be kept alive.
pub(crate) fn watch_registry(
    path: &Path,
    storage: Arc<StorageWatch>,
) -> Result<RecommendedWatcher, WatchError> {
    let (tx, mut rx) = mpsc::channel::<()>(1);
    let target: PathBuf = path.file_name().map(PathBuf::from).unwrap_or_default();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let Ok(event) = res else {
            return;
        };
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return;
        }
        if event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(target.as_os_str()))
        {
            // A full channel already has a reload pending.
            let _ = tx.try_send(());
        }
    })?;

    // Editors replace files on save, so watch the directory, not the file.
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    tracing::info!(path = %path.display(), "Watching registry descriptor");

    tokio::spawn(async move {
        while rx.recv().await.is_some() {
            tokio::time::sleep(REGISTRY_DEBOUNCE).await;
            while rx.try_recv().is_ok() {}
            storage.reload_registry().await;
        }
    });

    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use vdocs_registry::RegistryHandle;
    use vdocs_site::EngineConfig;
    use vdocs_storage::{MockStore, StorageEventKind};

    use super::*;

    const ACME_ONLY: &str = "tenants:\n  - tenantId: acme\n    versions:\n      - { versionId: v1, storageLocation: acme/v1 }\n";
    const WITH_GLOBEX: &str = "tenants:\n  - tenantId: acme\n    versions:\n      - { versionId: v1, storageLocation: acme/v1 }\n  - tenantId: globex\n    versions:\n      - { versionId: main, storageLocation: globex/main }\n";

    struct Fixture {
        dir: TempDir,
        store: Arc<MockStore>,
        engine: Arc<Engine>,
        watch: StorageWatch,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("registry.yaml"), ACME_ONLY).unwrap();
        let store = Arc::new(
            MockStore::new()
                .with_document("acme/v1", "guide", "# Guide")
                .with_document("globex/main", "guide", "# Globex Guide"),
        );
        let registry = RegistryHandle::load(dir.path().join("registry.yaml")).unwrap();
        let engine = Arc::new(Engine::new(
            Arc::new(registry),
            Arc::clone(&store) as Arc<dyn ContentStore>,
            EngineConfig::default(),
        ));
        let watch = StorageWatch::new(
            Arc::clone(&engine),
            Arc::clone(&store) as Arc<dyn ContentStore>,
        );
        Fixture {
            dir,
            store,
            engine,
            watch,
        }
    }

    async fn wait_for_title(engine: &Engine, tenant: &str, expected: &str) {
        for _ in 0..100 {
            let (_, doc) = engine.get_document(tenant, None, "guide").await.unwrap();
            if doc.title == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("title never became {expected}");
    }

    #[tokio::test]
    async fn test_storage_events_reach_engine() {
        let f = fixture();
        f.watch.sync().unwrap();
        f.engine.get_document("acme", None, "guide").await.unwrap();

        f.store.set_document("acme/v1", "guide", "# Guide Updated");
        f.store.emit("acme/v1", "guide", StorageEventKind::Modified);

        wait_for_title(&f.engine, "acme", "Guide Updated").await;
    }

    #[tokio::test]
    async fn test_sync_is_noop_for_same_locations() {
        let f = fixture();
        f.watch.sync().unwrap();
        f.watch.sync().unwrap();

        let watched = f.watch.state.lock().as_ref().map(|(l, _)| l.clone());
        assert_eq!(watched, Some(vec!["acme/v1".to_owned()]));
    }

    #[tokio::test]
    async fn test_registry_reload_follows_new_locations() {
        let f = fixture();
        f.watch.sync().unwrap();
        assert!(f.engine.resolve("globex", None).is_err());

        fs::write(f.dir.path().join("registry.yaml"), WITH_GLOBEX).unwrap();
        f.watch.reload_registry().await;

        assert!(f.engine.resolve("globex", None).is_ok());
        f.engine.get_document("globex", None, "guide").await.unwrap();
        f.store.set_document("globex/main", "guide", "# Globex Updated");
        f.store.emit("globex/main", "guide", StorageEventKind::Modified);

        wait_for_title(&f.engine, "globex", "Globex Updated").await;
    }

    #[tokio::test]
    async fn test_invalid_registry_keeps_previous() {
        let f = fixture();

        fs::write(f.dir.path().join("registry.yaml"), "tenants: [").unwrap();
        f.watch.reload_registry().await;

        assert!(f.engine.resolve("acme", None).is_ok());
    }
}

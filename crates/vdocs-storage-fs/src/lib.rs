//! Filesystem content store for vdocs.
//!
//! This crate provides [`FsStore`], a filesystem-based implementation of the
//! [`ContentStore`](vdocs_storage::ContentStore) trait. Each storage location
//! is a directory; relative locations resolve against a configured root.
//! It handles:
//!
//! - Slug to file mapping (`guide` -> `guide/index.md` or `guide.md`)
//! - Recursive slug discovery, skipping hidden and `_`-prefixed entries
//! - Directory metadata sidecar files (`meta.yaml` by default)
//! - File watching, debounced per `(location, slug)`
//!
//! # Example
//!
//! ```ignore
//! use std::path::PathBuf;
//! use vdocs_storage::ContentStore;
//! use vdocs_storage_fs::FsStore;
//!
//! let store = FsStore::new(PathBuf::from("content"));
//! for slug in store.list_slugs("acme/v1")? {
//!     println!("{slug}");
//! }
//! ```

mod debouncer;
mod scanner;
mod source;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::time::Duration;

use notify::{RecursiveMode, Watcher};

use debouncer::SlugDebouncer;
use scanner::Scanner;
use source::{SourceFile, is_excluded, slug_candidates};
use vdocs_storage::{
    ContentStore, StorageError, StorageErrorKind, StorageEvent, StorageEventKind,
    StorageEventReceiver, WatchHandle,
};

/// Backend identifier for error messages.
const BACKEND: &str = "Fs";

/// Default metadata sidecar filename.
pub const DEFAULT_META_FILENAME: &str = "meta.yaml";

/// Create a storage error from a notify error.
fn notify_error(e: notify::Error) -> StorageError {
    StorageError::new(StorageErrorKind::Other)
        .with_backend(BACKEND)
        .with_source(e)
}

/// Convert a `notify::EventKind` to a `StorageEventKind`.
///
/// Returns `None` for event kinds that are not relevant (e.g., Access).
fn storage_event_kind(kind: notify::EventKind) -> Option<StorageEventKind> {
    match kind {
        notify::EventKind::Create(_) => Some(StorageEventKind::Created),
        notify::EventKind::Modify(_) => Some(StorageEventKind::Modified),
        notify::EventKind::Remove(_) => Some(StorageEventKind::Removed),
        _ => None,
    }
}

/// A watched location directory.
struct WatchedRoot {
    dir: PathBuf,
    location: String,
}

/// Slugs a file path affects, one per watched location containing it.
fn classify_path<'a>(
    roots: &'a [WatchedRoot],
    meta_filename: &str,
    path: &Path,
) -> Vec<(&'a str, SourceFile)> {
    roots
        .iter()
        .filter_map(|root| {
            let rel_path = path.strip_prefix(&root.dir).ok()?;
            let source = SourceFile::classify(rel_path, meta_filename)?;
            Some((root.location.as_str(), source))
        })
        .collect()
}

/// Record the slug changes of a notify event into the debouncer.
fn record_notify_event(
    res: Result<notify::Event, notify::Error>,
    roots: &[WatchedRoot],
    meta_filename: &str,
    debouncer: &SlugDebouncer,
) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "File watcher error");
            return;
        }
    };
    let Some(kind) = storage_event_kind(event.kind) else {
        return;
    };
    for path in &event.paths {
        for (location, source) in classify_path(roots, meta_filename, path) {
            debouncer.record(location, &source, kind);
        }
    }
}

/// Report a removed slug that another file still backs (`guide.md` removed
/// while `guide/index.md` remains) as modified.
fn settle_removal(roots: &[WatchedRoot], mut event: StorageEvent) -> StorageEvent {
    if event.kind != StorageEventKind::Removed {
        return event;
    }
    let still_served = roots
        .iter()
        .filter(|root| root.location == event.location)
        .any(|root| FsStore::resolve_content(&root.dir, &event.slug).is_some());
    if still_served {
        event.kind = StorageEventKind::Modified;
    }
    event
}

/// Filesystem content store.
///
/// Slugs map to files inside the location directory:
/// - `""` -> `index.md`
/// - `"guide"` -> `guide/index.md`, falling back to `guide.md`
///
/// Directory metadata for `dir` lives in `{dir}/{meta_filename}`.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    meta_filename: String,
    debounce: Duration,
}

impl FsStore {
    /// Create a store resolving relative locations against `root`.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            meta_filename: DEFAULT_META_FILENAME.to_owned(),
            debounce: Duration::from_millis(100),
        }
    }

    /// Use a custom metadata filename.
    #[must_use]
    pub fn with_meta_filename(mut self, meta_filename: &str) -> Self {
        meta_filename.clone_into(&mut self.meta_filename);
        self
    }

    /// Use a custom debounce window for `watch()`.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Root directory for relative locations.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a storage location to its directory.
    ///
    /// Rejects locations containing a `..` segment.
    fn location_dir(&self, location: &str) -> Result<PathBuf, StorageError> {
        if location.is_empty() || location.split(['/', '\\']).any(|s| s == "..") {
            return Err(StorageError::invalid_path(location).with_backend(BACKEND));
        }
        Ok(self.root.join(location))
    }

    /// Validate a slug.
    ///
    /// Rejects `..` segments, empty segments, backslashes and a leading `/`.
    fn validate_slug(slug: &str) -> Result<(), StorageError> {
        if slug.is_empty() {
            return Ok(());
        }
        let invalid = slug.starts_with('/')
            || slug.contains('\\')
            || slug.contains('\0')
            || slug.split('/').any(|s| s.is_empty() || s == "..");
        if invalid {
            return Err(StorageError::invalid_path(slug).with_backend(BACKEND));
        }
        Ok(())
    }

    /// Whether a slug points into a hidden or `_`-prefixed path.
    fn is_hidden_slug(slug: &str) -> bool {
        slug.split('/').any(|s| !s.is_empty() && is_excluded(s))
    }

    /// Resolve a slug to its content file, if one exists.
    fn resolve_content(dir: &Path, slug: &str) -> Option<PathBuf> {
        slug_candidates(slug)
            .into_iter()
            .map(|candidate| dir.join(candidate))
            .find(|path| path.is_file())
    }
}

impl ContentStore for FsStore {
    fn read(&self, location: &str, slug: &str) -> Result<String, StorageError> {
        Self::validate_slug(slug)?;
        let dir = self.location_dir(location)?;
        if Self::is_hidden_slug(slug) {
            return Err(StorageError::not_found(slug).with_backend(BACKEND));
        }

        let full_path = Self::resolve_content(&dir, slug)
            .ok_or_else(|| StorageError::not_found(slug).with_backend(BACKEND))?;
        fs::read_to_string(&full_path)
            .map_err(|e| StorageError::io(e, Some(PathBuf::from(slug))).with_backend(BACKEND))
    }

    fn list_slugs(&self, location: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.location_dir(location)?;
        if !dir.exists() {
            tracing::warn!(location, path = %dir.display(), "Storage location does not exist");
            return Ok(Vec::new());
        }

        Scanner::new(dir)
            .scan()
            .map_err(|e| StorageError::io(e, Some(PathBuf::from(location))).with_backend(BACKEND))
    }

    fn read_meta(&self, location: &str, dir: &str) -> Result<Option<String>, StorageError> {
        Self::validate_slug(dir)?;
        let meta_path = self.location_dir(location)?.join(dir).join(&self.meta_filename);

        match fs::read_to_string(&meta_path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(e, Some(meta_path)).with_backend(BACKEND)),
        }
    }

    fn watch(
        &self,
        locations: &[String],
    ) -> Result<(StorageEventReceiver, WatchHandle), StorageError> {
        let (event_tx, event_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let mut roots = Vec::with_capacity(locations.len());
        for location in locations {
            let dir = self.location_dir(location)?;
            if !dir.is_dir() {
                tracing::warn!(location, path = %dir.display(), "Not watching missing location");
                continue;
            }
            roots.push(WatchedRoot {
                dir,
                location: location.clone(),
            });
        }
        let roots = Arc::new(roots);
        let debouncer = Arc::new(SlugDebouncer::new(self.debounce));

        let watcher_roots = Arc::clone(&roots);
        let watcher_debouncer = Arc::clone(&debouncer);
        let meta_filename = self.meta_filename.clone();
        let mut watcher = notify::recommended_watcher(move |res| {
            record_notify_event(res, &watcher_roots, &meta_filename, &watcher_debouncer);
        })
        .map_err(notify_error)?;
        for root in roots.iter() {
            watcher
                .watch(&root.dir, RecursiveMode::Recursive)
                .map_err(notify_error)?;
        }
        tracing::debug!(locations = roots.len(), "Watching storage locations");

        // Spawn drain thread. The watcher is moved in to keep it alive.
        std::thread::spawn(move || {
            let _watcher = watcher;

            loop {
                match shutdown_rx.recv_timeout(Duration::from_millis(50)) {
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                }

                for event in debouncer.drain_ready() {
                    if event_tx.send(settle_removal(&roots, event)).is_err() {
                        return;
                    }
                }
            }
        });

        // When dropped, shutdown_tx disconnects, causing the drain thread to exit
        Ok((
            StorageEventReceiver::new(event_rx),
            WatchHandle::new(shutdown_tx),
        ))
    }
}

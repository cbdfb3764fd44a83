//! Mock content store for testing.
//!
//! Provides [`MockStore`] for unit testing without filesystem access. Besides
//! serving in-memory documents it counts reads per document, can inject
//! transient failures and slow reads, and can emit change events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, mpsc};
use std::time::Duration;

use crate::event::{StorageEvent, StorageEventKind, StorageEventReceiver, WatchHandle};
use crate::storage::{ContentStore, ErrorStatus, StorageError, StorageErrorKind};

/// Backend identifier for error messages.
const BACKEND: &str = "Mock";

type Key = (String, String);

fn key(location: &str, slug: &str) -> Key {
    (location.to_owned(), slug.to_owned())
}

/// Mock store for testing.
///
/// Stores documents and directory metadata in memory. Use the builder methods
/// to configure the mock with test data and the `set_*`/`remove_*` methods to
/// change it while a test runs.
///
/// # Example
///
/// ```ignore
/// use vdocs_storage::{ContentStore, MockStore};
///
/// let store = MockStore::new()
///     .with_document("acme/v1", "guide/intro", "# Intro\n\nContent.")
///     .with_meta("acme/v1", "guide", "title: Guide");
///
/// assert_eq!(store.list_slugs("acme/v1").unwrap(), vec!["guide/intro".to_owned()]);
/// assert_eq!(store.read_count("acme/v1", "guide/intro"), 0);
/// ```
#[derive(Debug, Default)]
pub struct MockStore {
    documents: RwLock<HashMap<Key, String>>,
    metadata: RwLock<HashMap<Key, String>>,
    reads: RwLock<HashMap<Key, usize>>,
    total_reads: AtomicUsize,
    pending_failures: AtomicUsize,
    read_delay: RwLock<Option<Duration>>,
    event_sender: RwLock<Option<mpsc::Sender<StorageEvent>>>,
}

impl MockStore {
    /// Create a new empty mock store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_document(self, location: &str, slug: &str, content: impl Into<String>) -> Self {
        self.set_document(location, slug, content);
        self
    }

    /// Add directory metadata (`dir` is `""` for the location root).
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_meta(self, location: &str, dir: &str, content: impl Into<String>) -> Self {
        self.metadata
            .write()
            .unwrap()
            .insert(key(location, dir), content.into());
        self
    }

    /// Delay every `read` by `delay` (blocks the calling thread).
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_read_delay(self, delay: Duration) -> Self {
        *self.read_delay.write().unwrap() = Some(delay);
        self
    }

    /// Insert or replace a document.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn set_document(&self, location: &str, slug: &str, content: impl Into<String>) {
        self.documents
            .write()
            .unwrap()
            .insert(key(location, slug), content.into());
    }

    /// Remove a document.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn remove_document(&self, location: &str, slug: &str) {
        self.documents.write().unwrap().remove(&key(location, slug));
    }

    /// Make the next `count` reads fail with a transient `Unavailable` error.
    pub fn fail_next_reads(&self, count: usize) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Number of `read` calls made for a document (including failed ones).
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn read_count(&self, location: &str, slug: &str) -> usize {
        self.reads
            .read()
            .unwrap()
            .get(&key(location, slug))
            .copied()
            .unwrap_or(0)
    }

    /// Number of `read` calls across all documents.
    #[must_use]
    pub fn total_reads(&self) -> usize {
        self.total_reads.load(Ordering::SeqCst)
    }

    /// Emit a storage event.
    ///
    /// Only works if `watch()` has been called first.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn emit(&self, location: &str, slug: &str, kind: StorageEventKind) {
        if let Some(sender) = self.event_sender.read().unwrap().as_ref() {
            let _ = sender.send(StorageEvent {
                location: location.to_owned(),
                slug: slug.to_owned(),
                kind,
            });
        }
    }

    fn record_read(&self, location: &str, slug: &str) {
        *self
            .reads
            .write()
            .unwrap()
            .entry(key(location, slug))
            .or_insert(0) += 1;
        self.total_reads.fetch_add(1, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        self.pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl ContentStore for MockStore {
    fn read(&self, location: &str, slug: &str) -> Result<String, StorageError> {
        self.record_read(location, slug);

        if slug.split('/').any(|segment| segment == "..") {
            return Err(StorageError::invalid_path(slug).with_backend(BACKEND));
        }

        let delay = *self.read_delay.read().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        if self.take_failure() {
            return Err(StorageError::new(StorageErrorKind::Unavailable)
                .with_status(ErrorStatus::Temporary)
                .with_path(slug)
                .with_backend(BACKEND));
        }

        self.documents
            .read()
            .unwrap()
            .get(&key(location, slug))
            .cloned()
            .ok_or_else(|| StorageError::not_found(slug).with_backend(BACKEND))
    }

    fn list_slugs(&self, location: &str) -> Result<Vec<String>, StorageError> {
        let mut slugs: Vec<String> = self
            .documents
            .read()
            .unwrap()
            .keys()
            .filter(|(loc, _)| loc == location)
            .map(|(_, slug)| slug.clone())
            .collect();
        slugs.sort();
        Ok(slugs)
    }

    fn read_meta(&self, location: &str, dir: &str) -> Result<Option<String>, StorageError> {
        Ok(self.metadata.read().unwrap().get(&key(location, dir)).cloned())
    }

    fn watch(
        &self,
        _locations: &[String],
    ) -> Result<(StorageEventReceiver, WatchHandle), StorageError> {
        let (tx, rx) = mpsc::channel();
        *self.event_sender.write().unwrap() = Some(tx);
        Ok((StorageEventReceiver::new(rx), WatchHandle::no_op()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MockStore>();
    }

    #[test]
    fn test_read_counts_per_document() {
        let store = MockStore::new().with_document("acme/v1", "guide", "# Guide");

        store.read("acme/v1", "guide").unwrap();
        store.read("acme/v1", "guide").unwrap();
        let _ = store.read("acme/v1", "missing");

        assert_eq!(store.read_count("acme/v1", "guide"), 2);
        assert_eq!(store.read_count("acme/v1", "missing"), 1);
        assert_eq!(store.total_reads(), 3);
    }

    #[test]
    fn test_documents_are_scoped_by_location() {
        let store = MockStore::new()
            .with_document("acme/v1", "guide/intro", "v1")
            .with_document("acme/v2", "guide/setup", "v2");

        assert_eq!(store.list_slugs("acme/v1").unwrap(), vec!["guide/intro"]);
        assert!(store.read("acme/v2", "guide/intro").unwrap_err().is_not_found());
        assert!(store.list_slugs("other").unwrap().is_empty());
    }

    #[test]
    fn test_injected_failures_are_transient() {
        let store = MockStore::new().with_document("acme/v1", "guide", "ok");
        store.fail_next_reads(1);

        let err = store.read("acme/v1", "guide").unwrap_err();
        assert_eq!(err.kind, StorageErrorKind::Unavailable);
        assert!(err.status.is_retryable());

        assert_eq!(store.read("acme/v1", "guide").unwrap(), "ok");
    }

    #[test]
    fn test_rejects_parent_segments() {
        let store = MockStore::new();

        let err = store.read("acme/v1", "../secret").unwrap_err();

        assert_eq!(err.kind, StorageErrorKind::InvalidPath);
    }

    #[test]
    fn test_emit_after_watch() {
        let store = MockStore::new();
        let (rx, _handle) = store.watch(&["acme/v1".to_owned()]).unwrap();

        store.emit("acme/v1", "guide", StorageEventKind::Modified);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.location, "acme/v1");
        assert_eq!(event.slug, "guide");
        assert_eq!(event.kind, StorageEventKind::Modified);
    }
}

//! Storage event types for change notification.
//!
//! Provides types for subscribing to storage changes through the
//! [`ContentStore::watch`](crate::ContentStore::watch) method.

use std::sync::mpsc;

/// Kind of storage event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageEventKind {
    /// Document was created.
    Created,
    /// Document was modified.
    Modified,
    /// Document was removed.
    Removed,
}

/// A storage change event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageEvent {
    /// Storage location the change happened in, exactly as passed to `watch`.
    pub location: String,
    /// Slug of the affected document (directory slug for metadata changes).
    pub slug: String,
    /// Kind of change.
    pub kind: StorageEventKind,
}

/// Receiver for storage events.
///
/// Wraps a [`std::sync::mpsc::Receiver`] for synchronous event delivery.
/// Can be iterated with [`iter()`](Self::iter) or polled with [`recv()`](Self::recv)/[`try_recv()`](Self::try_recv).
pub struct StorageEventReceiver {
    rx: mpsc::Receiver<StorageEvent>,
}

impl StorageEventReceiver {
    /// Create a new receiver from a channel receiver.
    #[must_use]
    pub fn new(rx: mpsc::Receiver<StorageEvent>) -> Self {
        Self { rx }
    }

    /// Wait for the next event (blocking).
    ///
    /// Returns `None` when the sender is dropped.
    #[must_use]
    pub fn recv(&self) -> Option<StorageEvent> {
        self.rx.recv().ok()
    }

    /// Try to receive an event without blocking.
    ///
    /// Returns `None` if no event is available or the sender is dropped.
    #[must_use]
    pub fn try_recv(&self) -> Option<StorageEvent> {
        self.rx.try_recv().ok()
    }

    /// Returns an iterator over events.
    ///
    /// Blocks until an event is available. Stops when the sender is dropped.
    pub fn iter(&self) -> impl Iterator<Item = StorageEvent> + '_ {
        self.rx.iter()
    }

    /// Create a no-op receiver that never yields events.
    pub(crate) fn no_op() -> Self {
        let (_tx, rx) = mpsc::channel();
        Self { rx }
    }
}

/// Handle to stop watching for changes.
///
/// Dropping the handle stops watching. Shutdown is signalled by dropping the
/// internal channel sender.
pub struct WatchHandle {
    _shutdown: Option<mpsc::Sender<()>>,
}

impl WatchHandle {
    /// Create a new watch handle with a shutdown signal sender.
    ///
    /// When the handle is dropped, the sender is dropped, causing the
    /// receiver to return `Err(RecvError)` which signals shutdown.
    #[must_use]
    pub fn new(shutdown: mpsc::Sender<()>) -> Self {
        Self {
            _shutdown: Some(shutdown),
        }
    }

    /// Stop watching immediately (consumes the handle).
    pub fn stop(mut self) {
        self._shutdown.take();
    }

    /// Create a no-op handle that does nothing on drop.
    #[must_use]
    pub fn no_op() -> Self {
        Self { _shutdown: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(slug: &str, kind: StorageEventKind) -> StorageEvent {
        StorageEvent {
            location: "acme/v1".to_owned(),
            slug: slug.to_owned(),
            kind,
        }
    }

    #[test]
    fn test_receiver_recv_blocking() {
        let (tx, rx) = mpsc::channel();
        let receiver = StorageEventReceiver::new(rx);

        let sent = event("guide/intro", StorageEventKind::Created);
        tx.send(sent.clone()).unwrap();

        assert_eq!(receiver.recv(), Some(sent));
    }

    #[test]
    fn test_receiver_recv_on_closed_channel() {
        let (tx, rx) = mpsc::channel();
        let receiver = StorageEventReceiver::new(rx);

        drop(tx);

        assert!(receiver.recv().is_none());
    }

    #[test]
    fn test_receiver_try_recv_non_blocking() {
        let (_tx, rx) = mpsc::channel();
        let receiver = StorageEventReceiver::new(rx);

        assert!(receiver.try_recv().is_none());
    }

    #[test]
    fn test_receiver_iter() {
        let (tx, rx) = mpsc::channel();
        let receiver = StorageEventReceiver::new(rx);

        let events = vec![
            event("a", StorageEventKind::Created),
            event("b", StorageEventKind::Modified),
        ];

        for e in &events {
            tx.send(e.clone()).unwrap();
        }
        drop(tx);

        let received: Vec<_> = receiver.iter().collect();
        assert_eq!(received, events);
    }

    #[test]
    fn test_receiver_no_op() {
        let receiver = StorageEventReceiver::no_op();

        assert!(receiver.try_recv().is_none());
    }

    #[test]
    fn test_watch_handle_stop() {
        let (tx, rx) = mpsc::channel();
        let handle = WatchHandle::new(tx);

        handle.stop();

        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_watch_handle_drop() {
        let (tx, rx) = mpsc::channel();
        let handle = WatchHandle::new(tx);

        drop(handle);

        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_watch_handle_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WatchHandle>();
        assert_send::<StorageEventReceiver>();
    }
}

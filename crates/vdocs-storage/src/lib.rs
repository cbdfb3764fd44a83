//! Content store abstraction for the vdocs resolution engine.
//!
//! This crate provides a [`ContentStore`] trait for reading raw documents and
//! directory metadata from the storage location of a (tenant, version) pair.
//! This enables:
//!
//! - **Unit testing** without touching the real filesystem
//! - **Backend flexibility** (filesystem, object stores)
//! - **Clean separation** between content interpretation and I/O
//!
//! # Architecture
//!
//! The crate provides:
//! - [`ContentStore`] trait with `read()`, `list_slugs()`, `read_meta()` and `watch()`
//! - [`RetryingStore`] decorator retrying transient failures with exponential backoff
//! - [`MockStore`] for testing (behind `mock` feature flag)
//!
//! # Example
//!
//! ```ignore
//! use vdocs_storage::{ContentStore, RetryPolicy, RetryingStore};
//! use vdocs_storage_fs::FsStore;
//!
//! let store = RetryingStore::new(FsStore::new("content".into()), RetryPolicy::default());
//! for slug in store.list_slugs("acme/v1")? {
//!     println!("{slug}");
//! }
//! ```

mod event;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod retry;
mod storage;

pub use event::{StorageEvent, StorageEventKind, StorageEventReceiver, WatchHandle};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockStore;
pub use retry::{RetryPolicy, RetryingStore};
pub use storage::{ContentStore, ErrorStatus, StorageError, StorageErrorKind};

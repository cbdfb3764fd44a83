//! Content store trait and error types.
//!
//! Provides the core [`ContentStore`] trait for reading raw document bytes and
//! directory metadata from a storage location, along with [`StorageError`] for
//! unified error handling across backends.
//!
//! # Slug Convention
//!
//! All slug parameters are **path-like identifiers**, not file paths:
//! - `""` - root document of a location
//! - `"guide"` - standalone document
//! - `"guide/intro"` - nested document
//!
//! Store implementations handle the mapping from slugs to their internal storage format.

use std::path::PathBuf;

use crate::event::{StorageEventReceiver, WatchHandle};

/// Semantic error categories (inspired by Object Store + `OpenDAL`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageErrorKind {
    /// Resource does not exist.
    NotFound,
    /// Permission denied.
    PermissionDenied,
    /// Invalid slug or storage location.
    InvalidPath,
    /// Backend is temporarily unavailable.
    Unavailable,
    /// Too many requests.
    RateLimited,
    /// Operation timed out.
    Timeout,
    /// Other/unknown error category.
    Other,
}

/// Retry guidance (from `OpenDAL`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ErrorStatus {
    /// Don't retry (config error, not found, invalid path).
    #[default]
    Permanent,
    /// Retry immediately (timeout, connection reset).
    Temporary,
    /// Retry with backoff (rate limited, service unavailable).
    Persistent,
}

impl ErrorStatus {
    /// Whether an operation that failed with this status may be retried.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Permanent)
    }
}

/// Storage error with semantic kind and backend-specific source.
#[derive(Debug)]
pub struct StorageError {
    /// Semantic error category.
    pub kind: StorageErrorKind,
    /// Retry guidance.
    pub status: ErrorStatus,
    /// Path context (if applicable).
    pub path: Option<PathBuf>,
    /// Backend identifier (e.g., "Fs", "Mock").
    pub backend: Option<&'static str>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StorageError {
    /// Create a new storage error.
    #[must_use]
    pub fn new(kind: StorageErrorKind) -> Self {
        Self {
            kind,
            status: ErrorStatus::Permanent,
            path: None,
            backend: None,
            source: None,
        }
    }

    /// Attach path context.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach backend identifier.
    #[must_use]
    pub fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set retry status.
    #[must_use]
    pub fn with_status(mut self, status: ErrorStatus) -> Self {
        self.status = status;
        self
    }

    /// Attach the underlying error source.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Downcast the source error to a concrete type.
    #[must_use]
    pub fn downcast_source<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.source.as_ref()?.downcast_ref()
    }

    /// Create a not found error with path.
    #[must_use]
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::new(StorageErrorKind::NotFound).with_path(path)
    }

    /// Create an invalid path error.
    #[must_use]
    pub fn invalid_path(path: impl Into<PathBuf>) -> Self {
        Self::new(StorageErrorKind::InvalidPath).with_path(path)
    }

    /// Create a transient "backend unavailable" error that callers may retry.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::new(StorageErrorKind::Unavailable).with_status(ErrorStatus::Persistent)
    }

    /// Returns `true` if the error means the document does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == StorageErrorKind::NotFound
    }

    /// Create a storage error from an I/O error.
    #[must_use]
    pub fn io(err: std::io::Error, path: Option<PathBuf>) -> Self {
        use std::io::ErrorKind;

        let kind = match err.kind() {
            ErrorKind::NotFound => StorageErrorKind::NotFound,
            ErrorKind::PermissionDenied => StorageErrorKind::PermissionDenied,
            ErrorKind::TimedOut => StorageErrorKind::Timeout,
            ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::ResourceBusy => {
                StorageErrorKind::Unavailable
            }
            _ => StorageErrorKind::Other,
        };
        let status = match err.kind() {
            ErrorKind::TimedOut | ErrorKind::Interrupted | ErrorKind::WouldBlock => {
                ErrorStatus::Temporary
            }
            ErrorKind::ResourceBusy => ErrorStatus::Persistent,
            _ => ErrorStatus::Permanent,
        };
        let mut error = Self::new(kind).with_status(status).with_source(err);
        if let Some(p) = path {
            error = error.with_path(p);
        }
        error
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format: "[Backend] Kind: message (path: /foo/bar)"
        if let Some(backend) = self.backend {
            write!(f, "[{backend}] ")?;
        }

        let kind_str = match self.kind {
            StorageErrorKind::NotFound => "Not found",
            StorageErrorKind::PermissionDenied => "Permission denied",
            StorageErrorKind::InvalidPath => "Invalid path",
            StorageErrorKind::Unavailable => "Unavailable",
            StorageErrorKind::RateLimited => "Rate limited",
            StorageErrorKind::Timeout => "Timeout",
            StorageErrorKind::Other => "Error",
        };

        write!(f, "{kind_str}")?;

        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }

        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }

        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Storage abstraction for raw document and metadata retrieval.
///
/// Implementations are format-agnostic: they return document bodies and
/// metadata blobs as text and leave interpretation to the caller.
///
/// # Locations and slugs
///
/// A `location` is the opaque storage location of one (tenant, version) pair
/// as declared in the registry. A `slug` addresses one document inside it.
pub trait ContentStore: Send + Sync {
    /// Read the raw content of the document at `slug`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageErrorKind::NotFound`] if the document doesn't exist,
    /// [`StorageErrorKind::InvalidPath`] for malformed slugs, or a backend error.
    fn read(&self, location: &str, slug: &str) -> Result<String, StorageError>;

    /// List every document slug stored under `location`, sorted.
    ///
    /// A missing location yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if listing fails (e.g., permission denied,
    /// backend unavailable).
    fn list_slugs(&self, location: &str) -> Result<Vec<String>, StorageError>;

    /// Read the directory-level metadata blob for `dir` (a slug prefix, `""`
    /// for the location root).
    ///
    /// Returns `Ok(None)` when the directory has no metadata.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on I/O failure.
    fn read_meta(&self, location: &str, dir: &str) -> Result<Option<String>, StorageError>;

    /// Start watching the given locations for document changes.
    ///
    /// Returns a receiver for events and a handle to stop watching.
    /// Default implementation returns a no-op receiver for backends
    /// that don't support change notification.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if watching cannot be started.
    fn watch(
        &self,
        locations: &[String],
    ) -> Result<(StorageEventReceiver, WatchHandle), StorageError> {
        let _ = locations;
        Ok((StorageEventReceiver::no_op(), WatchHandle::no_op()))
    }
}

impl<S: ContentStore + ?Sized> ContentStore for std::sync::Arc<S> {
    fn read(&self, location: &str, slug: &str) -> Result<String, StorageError> {
        (**self).read(location, slug)
    }

    fn list_slugs(&self, location: &str) -> Result<Vec<String>, StorageError> {
        (**self).list_slugs(location)
    }

    fn read_meta(&self, location: &str, dir: &str) -> Result<Option<String>, StorageError> {
        (**self).read_meta(location, dir)
    }

    fn watch(
        &self,
        locations: &[String],
    ) -> Result<(StorageEventReceiver, WatchHandle), StorageError> {
        (**self).watch(locations)
    }
}

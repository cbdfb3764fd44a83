//! Document loading with caching.
//!
//! [`DocumentLoader`] reads raw content through a [`ContentStore`], parses it
//! into [`Document`]s and keeps them in a bounded LRU cache with a TTL.
//! Parse failures are cached for a shorter negative TTL so a broken document
//! is not re-read on every request; not-found and storage failures are never
//! cached.
//!
//! # Concurrency
//!
//! - The LRU sits behind a short `parking_lot::Mutex`; no lock is held
//!   across I/O.
//! - Storage reads run on the blocking pool.
//! - Concurrent misses for the same key share one load. The load runs as a
//!   spawned task and populates the cache even if every caller goes away.
//! - Each (tenant, version) has an invalidation generation. A load that
//!   started before its version was invalidated does not write its (possibly
//!   stale) result into the cache; loads of other versions are unaffected.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;
use vdocs_registry::ResolvedVersion;
use vdocs_storage::{ContentStore, ErrorStatus, StorageError, StorageErrorKind};

use crate::document::Document;
use crate::flight::SingleFlight;
use crate::swap_map::VersionKey;

/// Loader cache configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Maximum number of cached entries (values below 1 are treated as 1).
    pub capacity: usize,
    /// Lifetime of a successfully loaded document.
    pub ttl: Duration,
    /// Lifetime of a cached parse failure.
    pub negative_ttl: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            ttl: Duration::from_secs(300),
            negative_ttl: Duration::from_secs(30),
        }
    }
}

/// Document loading error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// No document with this slug in the requested version.
    #[error("Document not found: {tenant_id}/{version_id}/{slug}")]
    SlugNotFound {
        /// Tenant id.
        tenant_id: String,
        /// Version id.
        version_id: String,
        /// Requested slug.
        slug: String,
    },
    /// Slug is malformed.
    #[error("Invalid slug '{slug}': {reason}")]
    InvalidSlug {
        /// Requested slug.
        slug: String,
        /// What is wrong with it.
        reason: String,
    },
    /// Document exists but its frontmatter is malformed.
    #[error("Failed to parse {tenant_id}/{version_id}/{slug}: {message}")]
    Parse {
        /// Tenant id.
        tenant_id: String,
        /// Version id.
        version_id: String,
        /// Slug of the broken document.
        slug: String,
        /// Parser message.
        message: String,
    },
    /// The content store failed after retries.
    #[error("Storage unavailable: {message}")]
    StorageUnavailable {
        /// Error description.
        message: String,
    },
}

impl LoadError {
    fn from_storage(err: &StorageError, key: &DocKey) -> Self {
        match err.kind {
            StorageErrorKind::NotFound => Self::SlugNotFound {
                tenant_id: key.tenant_id.clone(),
                version_id: key.version_id.clone(),
                slug: key.slug.clone(),
            },
            StorageErrorKind::InvalidPath => Self::InvalidSlug {
                slug: key.slug.clone(),
                reason: err.to_string(),
            },
            _ => Self::StorageUnavailable {
                message: err.to_string(),
            },
        }
    }
}

/// Cache key: one document of one version of one tenant.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocKey {
    /// Tenant id.
    pub tenant_id: String,
    /// Version id.
    pub version_id: String,
    /// Normalized slug.
    pub slug: String,
}

impl DocKey {
    fn version_key(&self) -> VersionKey {
        VersionKey::new(&self.tenant_id, &self.version_id)
    }
}

/// What an invalidation drops.
enum Scope<'a> {
    Document(&'a str, &'a str, &'a str),
    Version(&'a str, &'a str),
    All,
}

impl Scope<'_> {
    fn covers_version(&self, key: &VersionKey) -> bool {
        match *self {
            Self::Document(tenant_id, version_id, _) | Self::Version(tenant_id, version_id) => {
                key.is(tenant_id, version_id)
            }
            Self::All => true,
        }
    }

    fn covers(&self, key: &DocKey) -> bool {
        match *self {
            Self::Document(tenant_id, version_id, slug) => {
                key.tenant_id == tenant_id && key.version_id == version_id && key.slug == slug
            }
            Self::Version(tenant_id, version_id) => {
                key.tenant_id == tenant_id && key.version_id == version_id
            }
            Self::All => true,
        }
    }
}

/// Normalize a requested slug: strip surrounding `/`, reject traversal and
/// malformed segments.
pub fn normalize_slug(slug: &str) -> Result<String, LoadError> {
    let invalid = |reason: &str| LoadError::InvalidSlug {
        slug: slug.to_owned(),
        reason: reason.to_owned(),
    };

    let trimmed = slug.trim_matches('/');
    if trimmed.chars().any(char::is_control) {
        return Err(invalid("contains control characters"));
    }
    if trimmed.contains('\\') {
        return Err(invalid("contains a backslash"));
    }
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    for segment in trimmed.split('/') {
        match segment {
            "" => return Err(invalid("contains an empty segment")),
            "." | ".." => return Err(invalid("contains a relative segment")),
            _ => {}
        }
    }
    Ok(trimmed.to_owned())
}

pub(crate) type LoadResult = Result<Arc<Document>, LoadError>;

/// Run a blocking storage operation on the blocking pool.
pub(crate) async fn storage_call<T, F>(f: F) -> Result<T, StorageError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap_or_else(|e| {
        Err(StorageError::new(StorageErrorKind::Other)
            .with_status(ErrorStatus::Temporary)
            .with_source(e))
    })
}

/// Callback run for every freshly loaded document that made it into the cache.
pub type LoadObserver = Arc<dyn Fn(&Arc<Document>) + Send + Sync>;

struct CacheEntry {
    value: LoadResult,
    expires_at: Instant,
}

struct LoaderState {
    entries: LruCache<DocKey, CacheEntry>,
    generations: HashMap<VersionKey, u64>,
}

struct LoaderInner {
    store: Arc<dyn ContentStore>,
    config: LoaderConfig,
    state: Mutex<LoaderState>,
    observer: Option<LoadObserver>,
}

impl LoaderInner {
    fn generation(&self, key: &DocKey) -> u64 {
        *self
            .state
            .lock()
            .generations
            .entry(key.version_key())
            .or_insert(0)
    }

    fn cached(&self, key: &DocKey) -> Option<LoadResult> {
        let mut state = self.state.lock();
        let cache = &mut state.entries;
        let expired = match cache.get(key) {
            None => return None,
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
        };
        if expired {
            cache.pop(key);
        }
        None
    }

    /// Store a result unless its version was invalidated since `generation`.
    fn populate(&self, key: DocKey, value: &LoadResult, generation: u64) -> bool {
        let ttl = match value {
            Ok(_) => self.config.ttl,
            Err(LoadError::Parse { .. }) => self.config.negative_ttl,
            Err(_) => return false,
        };

        let mut state = self.state.lock();
        if state.generations.get(&key.version_key()).copied().unwrap_or(0) != generation {
            tracing::debug!(slug = %key.slug, "Discarding load result after invalidation");
            return false;
        }
        state.entries.put(
            key,
            CacheEntry {
                value: value.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        true
    }

    async fn load(self: Arc<Self>, key: DocKey, location: String, generation: u64) -> LoadResult {
        let store = Arc::clone(&self.store);
        let read_slug = key.slug.clone();
        let raw = storage_call(move || store.read(&location, &read_slug)).await;

        let result = match raw {
            Ok(raw) => Document::parse(&key.tenant_id, &key.version_id, &key.slug, &raw)
                .map(Arc::new)
                .map_err(|e| {
                    tracing::warn!(
                        tenant = %key.tenant_id,
                        version = %key.version_id,
                        slug = %key.slug,
                        error = %e,
                        "Failed to parse document"
                    );
                    LoadError::Parse {
                        tenant_id: key.tenant_id.clone(),
                        version_id: key.version_id.clone(),
                        slug: key.slug.clone(),
                        message: e.to_string(),
                    }
                }),
            Err(e) => {
                if !e.is_not_found() {
                    tracing::warn!(slug = %key.slug, error = %e, "Storage read failed");
                }
                Err(LoadError::from_storage(&e, &key))
            }
        };

        if self.populate(key, &result, generation)
            && let (Ok(doc), Some(observer)) = (&result, &self.observer)
        {
            observer(doc);
        }
        result
    }
}

/// Loads and caches documents.
///
/// Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct DocumentLoader {
    inner: Arc<LoaderInner>,
    flights: Arc<SingleFlight<DocKey, LoadResult>>,
}

impl DocumentLoader {
    /// Create a loader reading through `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ContentStore>, config: LoaderConfig) -> Self {
        Self::build(store, config, None)
    }

    /// Create a loader that reports every cached fresh load to `observer`.
    #[must_use]
    pub fn with_observer(
        store: Arc<dyn ContentStore>,
        config: LoaderConfig,
        observer: LoadObserver,
    ) -> Self {
        Self::build(store, config, Some(observer))
    }

    fn build(
        store: Arc<dyn ContentStore>,
        config: LoaderConfig,
        observer: Option<LoadObserver>,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(LoaderInner {
                store,
                config,
                state: Mutex::new(LoaderState {
                    entries: LruCache::new(capacity),
                    generations: HashMap::new(),
                }),
                observer,
            }),
            flights: Arc::new(SingleFlight::new()),
        }
    }

    /// Loader configuration.
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    /// Get a document of a resolved version.
    ///
    /// # Errors
    ///
    /// See [`LoadError`]. Parse errors are returned again from the negative
    /// cache until it expires.
    pub async fn get(&self, version: &ResolvedVersion, slug: &str) -> LoadResult {
        let key = DocKey {
            tenant_id: version.tenant_id.clone(),
            version_id: version.version_id.clone(),
            slug: normalize_slug(slug)?,
        };

        if let Some(hit) = self.inner.cached(&key) {
            return hit;
        }

        let inner = Arc::clone(&self.inner);
        let location = version.storage_location.clone();
        let task_key = key.clone();
        self.flights
            .run(key, move || {
                let generation = inner.generation(&task_key);
                inner.load(task_key, location, generation)
            })
            .await
            .unwrap_or_else(|e| {
                Err(LoadError::StorageUnavailable {
                    message: e.to_string(),
                })
            })
    }

    /// Load several documents of one version concurrently.
    ///
    /// Results are returned in the order of `slugs`.
    pub async fn get_many(
        &self,
        version: &ResolvedVersion,
        slugs: &[String],
    ) -> Vec<(String, LoadResult)> {
        let mut tasks = JoinSet::new();
        for (idx, slug) in slugs.iter().enumerate() {
            let loader = self.clone();
            let version = version.clone();
            let slug = slug.clone();
            tasks.spawn(async move { (idx, loader.get(&version, &slug).await) });
        }

        let mut results: Vec<Option<LoadResult>> = vec![None; slugs.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, result)) => results[idx] = Some(result),
                Err(e) => tracing::warn!(error = %e, "Document load task failed"),
            }
        }

        slugs
            .iter()
            .cloned()
            .zip(results)
            .map(|(slug, result)| {
                let result = result.unwrap_or_else(|| {
                    Err(LoadError::StorageUnavailable {
                        message: format!("load task for '{slug}' did not complete"),
                    })
                });
                (slug, result)
            })
            .collect()
    }

    fn invalidate_scope(&self, scope: &Scope<'_>) -> usize {
        let removed = {
            let mut state = self.inner.state.lock();
            state
                .generations
                .iter_mut()
                .filter(|(key, _)| scope.covers_version(key))
                .for_each(|(_, generation)| *generation += 1);
            let keys: Vec<DocKey> = state
                .entries
                .iter()
                .filter(|(key, _)| scope.covers(key))
                .map(|(key, _)| key.clone())
                .collect();
            for key in &keys {
                state.entries.pop(key);
            }
            keys.len()
        };
        self.flights.forget_where(|key| scope.covers(key));
        removed
    }

    /// Drop one cached document.
    ///
    /// Loads of the same version that are running now are not cached.
    pub fn invalidate(&self, tenant_id: &str, version_id: &str, slug: &str) {
        let Ok(slug) = normalize_slug(slug) else {
            return;
        };
        self.invalidate_scope(&Scope::Document(tenant_id, version_id, &slug));
    }

    /// Drop every cached document of a (tenant, version) pair.
    pub fn invalidate_version(&self, tenant_id: &str, version_id: &str) -> usize {
        self.invalidate_scope(&Scope::Version(tenant_id, version_id))
    }

    /// Drop every cached document.
    pub fn invalidate_all(&self) -> usize {
        self.invalidate_scope(&Scope::All)
    }

    /// Remove expired entries, returning how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        let cache = &mut state.entries;
        let expired: Vec<DocKey> = cache
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            cache.pop(key);
        }
        expired.len()
    }

    /// Number of cached entries (including negative ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;
    use vdocs_storage::MockStore;

    use super::*;

    fn version(tenant: &str, version: &str) -> ResolvedVersion {
        ResolvedVersion {
            tenant_id: tenant.to_owned(),
            version_id: version.to_owned(),
            storage_location: format!("{tenant}/{version}"),
            defaulted: false,
        }
    }

    fn loader(store: &Arc<MockStore>) -> DocumentLoader {
        DocumentLoader::new(Arc::clone(store) as Arc<dyn ContentStore>, LoaderConfig::default())
    }

    #[test]
    fn test_normalize_slug() {
        assert_eq!(normalize_slug("/guide/intro/").unwrap(), "guide/intro");
        assert_eq!(normalize_slug("").unwrap(), "");
        assert_eq!(normalize_slug("/").unwrap(), "");
        assert!(normalize_slug("guide/../secret").is_err());
        assert!(normalize_slug("./guide").is_err());
        assert!(normalize_slug("a//b").is_err());
        assert!(normalize_slug("a\\b").is_err());
        assert!(normalize_slug("a\nb").is_err());
    }

    #[tokio::test]
    async fn test_loads_and_caches() {
        let store = Arc::new(MockStore::new().with_document("acme/v1", "guide/intro", "# Intro\n"));
        let loader = loader(&store);

        let first = loader.get(&version("acme", "v1"), "guide/intro").await.unwrap();
        let second = loader.get(&version("acme", "v1"), "/guide/intro").await.unwrap();

        assert_eq!(first.title, "Intro");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.read_count("acme/v1", "guide/intro"), 1);
    }

    #[tokio::test]
    async fn test_cached_document_matches_fresh_load() {
        let raw = "---\ntitle: Intro\norder: 1\n---\n# Intro\n\nBody text.\n";
        let store = Arc::new(MockStore::new().with_document("acme/v1", "guide/intro", raw));
        let cached_loader = loader(&store);
        let v1 = version("acme", "v1");

        cached_loader.get(&v1, "guide/intro").await.unwrap();
        let cached = cached_loader.get(&v1, "guide/intro").await.unwrap();
        let fresh = loader(&store).get(&v1, "guide/intro").await.unwrap();

        assert_eq!(*cached, *fresh);
        assert_eq!(cached.body, "# Intro\n\nBody text.\n");
    }

    #[tokio::test]
    async fn test_slug_only_in_other_version_is_not_found() {
        let store = Arc::new(MockStore::new().with_document("acme/v1", "guide/intro", "# v1 intro"));
        let loader = loader(&store);

        let err = loader.get(&version("acme", "v2"), "guide/intro").await.unwrap_err();

        assert_eq!(
            err,
            LoadError::SlugNotFound {
                tenant_id: "acme".to_owned(),
                version_id: "v2".to_owned(),
                slug: "guide/intro".to_owned(),
            }
        );
        assert_eq!(store.read_count("acme/v1", "guide/intro"), 0);
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let store = Arc::new(MockStore::new());
        let loader = loader(&store);
        let v1 = version("acme", "v1");

        assert!(loader.get(&v1, "new").await.is_err());
        store.set_document("acme/v1", "new", "# New");

        assert_eq!(loader.get(&v1, "new").await.unwrap().title, "New");
    }

    #[tokio::test]
    async fn test_invalid_slug_never_reaches_storage() {
        let store = Arc::new(MockStore::new());
        let loader = loader(&store);

        let err = loader.get(&version("acme", "v1"), "../v2/secret").await.unwrap_err();

        assert!(matches!(err, LoadError::InvalidSlug { .. }));
        assert_eq!(store.total_reads(), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_maps_to_unavailable() {
        let store = Arc::new(MockStore::new().with_document("acme/v1", "guide", "# Guide"));
        store.fail_next_reads(1);
        let loader = loader(&store);
        let v1 = version("acme", "v1");

        let err = loader.get(&v1, "guide").await.unwrap_err();
        assert!(matches!(err, LoadError::StorageUnavailable { .. }));

        assert!(loader.get(&v1, "guide").await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_read() {
        let store = Arc::new(
            MockStore::new()
                .with_document("acme/v1", "guide/intro", "# Intro")
                .with_read_delay(Duration::from_millis(50)),
        );
        let loader = loader(&store);
        let v1 = version("acme", "v1");

        let (a, b) = tokio::join!(loader.get(&v1, "guide/intro"), loader.get(&v1, "guide/intro"));

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(store.read_count("acme/v1", "guide/intro"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parse_error_is_negatively_cached_until_ttl() {
        let store = Arc::new(MockStore::new().with_document("acme/v1", "broken", "---\norder: [\n---\n"));
        let loader = loader(&store);
        let v1 = version("acme", "v1");

        let first = loader.get(&v1, "broken").await.unwrap_err();
        assert!(matches!(first, LoadError::Parse { .. }));

        tokio::time::advance(Duration::from_secs(10)).await;
        let second = loader.get(&v1, "broken").await.unwrap_err();
        assert_eq!(second, first);
        assert_eq!(store.read_count("acme/v1", "broken"), 1);

        store.set_document("acme/v1", "broken", "---\norder: 1\n---\n# Fixed\n");
        tokio::time::advance(Duration::from_secs(21)).await;

        let fixed = loader.get(&v1, "broken").await.unwrap();
        assert_eq!(fixed.title, "Fixed");
        assert_eq!(store.read_count("acme/v1", "broken"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_positive_ttl_expiry_and_sweep() {
        let store = Arc::new(MockStore::new().with_document("acme/v1", "a", "# A"));
        let loader = loader(&store);
        let v1 = version("acme", "v1");

        loader.get(&v1, "a").await.unwrap();
        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(loader.evict_expired(), 0);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(loader.evict_expired(), 1);
        assert!(loader.is_empty());
    }

    #[tokio::test]
    async fn test_lru_capacity_is_bounded() {
        let store = Arc::new(
            MockStore::new()
                .with_document("acme/v1", "a", "# A")
                .with_document("acme/v1", "b", "# B")
                .with_document("acme/v1", "c", "# C"),
        );
        let config = LoaderConfig {
            capacity: 2,
            ..LoaderConfig::default()
        };
        let loader = DocumentLoader::new(Arc::clone(&store) as Arc<dyn ContentStore>, config);
        let v1 = version("acme", "v1");

        for slug in ["a", "b", "c"] {
            loader.get(&v1, slug).await.unwrap();
        }
        loader.get(&v1, "a").await.unwrap();

        assert_eq!(loader.len(), 2);
        assert_eq!(store.read_count("acme/v1", "a"), 2);
    }

    #[tokio::test]
    async fn test_invalidation_scopes() {
        let store = Arc::new(
            MockStore::new()
                .with_document("acme/v1", "a", "# A")
                .with_document("acme/v1", "b", "# B")
                .with_document("acme/v2", "a", "# A2"),
        );
        let loader = loader(&store);
        let (v1, v2) = (version("acme", "v1"), version("acme", "v2"));
        for (v, slug) in [(&v1, "a"), (&v1, "b"), (&v2, "a")] {
            loader.get(v, slug).await.unwrap();
        }

        loader.invalidate("acme", "v1", "a");
        assert_eq!(loader.len(), 2);

        assert_eq!(loader.invalidate_version("acme", "v1"), 1);
        assert_eq!(loader.len(), 1);

        assert_eq!(loader.invalidate_all(), 1);
        assert!(loader.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_picks_up_new_content() {
        let store = Arc::new(MockStore::new().with_document("acme/v1", "a", "# Old"));
        let loader = loader(&store);
        let v1 = version("acme", "v1");

        loader.get(&v1, "a").await.unwrap();
        store.set_document("acme/v1", "a", "# New");
        assert_eq!(loader.get(&v1, "a").await.unwrap().title, "Old");

        loader.invalidate("acme", "v1", "a");
        assert_eq!(loader.get(&v1, "a").await.unwrap().title, "New");
    }

    #[tokio::test]
    async fn test_invalidation_discards_running_load_of_same_version() {
        let store = Arc::new(
            MockStore::new()
                .with_document("acme/v1", "a", "# A")
                .with_read_delay(Duration::from_millis(50)),
        );
        let loader = loader(&store);
        let v1 = version("acme", "v1");

        let pending = tokio::spawn({
            let loader = loader.clone();
            let v1 = v1.clone();
            async move { loader.get(&v1, "a").await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        loader.invalidate("acme", "v1", "other");
        pending.await.unwrap().unwrap();

        assert!(loader.is_empty());
    }

    #[tokio::test]
    async fn test_invalidation_keeps_running_loads_of_other_tenants() {
        let store = Arc::new(
            MockStore::new()
                .with_document("acme/v1", "a", "# A")
                .with_document("globex/main", "a", "# Globex")
                .with_read_delay(Duration::from_millis(50)),
        );
        let loader = loader(&store);
        let main = version("globex", "main");

        let pending = tokio::spawn({
            let loader = loader.clone();
            let main = main.clone();
            async move { loader.get(&main, "a").await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        loader.invalidate("acme", "v1", "a");
        loader.invalidate_version("acme", "v2");
        pending.await.unwrap().unwrap();

        assert_eq!(loader.len(), 1);
        loader.get(&main, "a").await.unwrap();
        assert_eq!(store.read_count("globex/main", "a"), 1);
    }

    #[tokio::test]
    async fn test_observer_sees_fresh_loads_only() {
        let store = Arc::new(MockStore::new().with_document("acme/v1", "a", "# A"));
        let seen = Arc::new(AtomicUsize::new(0));
        let observer_seen = Arc::clone(&seen);
        let loader = DocumentLoader::with_observer(
            Arc::clone(&store) as Arc<dyn ContentStore>,
            LoaderConfig::default(),
            Arc::new(move |_doc| {
                observer_seen.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let v1 = version("acme", "v1");

        loader.get(&v1, "a").await.unwrap();
        loader.get(&v1, "a").await.unwrap();
        let _ = loader.get(&v1, "missing").await;

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_many_keeps_slug_order() {
        let store = Arc::new(
            MockStore::new()
                .with_document("acme/v1", "b", "# B")
                .with_document("acme/v1", "a", "# A"),
        );
        let loader = loader(&store);
        let slugs = vec!["b".to_owned(), "missing".to_owned(), "a".to_owned()];

        let results = loader.get_many(&version("acme", "v1"), &slugs).await;

        let summary: Vec<(String, Option<String>)> = results
            .into_iter()
            .map(|(slug, result)| (slug, result.ok().map(|doc| doc.title.clone())))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("b".to_owned(), Some("B".to_owned())),
                ("missing".to_owned(), None),
                ("a".to_owned(), Some("A".to_owned())),
            ]
        );
    }

    #[tokio::test]
    async fn test_disconnected_caller_still_populates_cache() {
        let store = Arc::new(
            MockStore::new()
                .with_document("acme/v1", "slow", "# Slow")
                .with_read_delay(Duration::from_millis(30)),
        );
        let loader = loader(&store);
        let v1 = version("acme", "v1");

        let _ = tokio::time::timeout(Duration::from_millis(1), loader.get(&v1, "slow")).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(loader.len(), 1);
        loader.get(&v1, "slow").await.unwrap();
        assert_eq!(store.read_count("acme/v1", "slow"), 1);
    }
}

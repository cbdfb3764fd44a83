//! Per-version full-text search.
//!
//! Every (tenant, version) pair gets its own immutable [`SearchIndex`],
//! published through an atomically swapped map. Updating one document copies
//! the affected version's entry table and swaps the new index in. Building,
//! updating or invalidating one version never reads or writes the indexes of
//! other versions.
//!
//! # Scoring
//!
//! Text is lowercased, split on non-alphanumeric characters, and tokens
//! shorter than two characters are dropped. A document scores
//! `title_weight * tf(title) + tf(body)` summed over the distinct query
//! terms. Zero scores are omitted; equal scores are ordered by slug.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use vdocs_registry::ResolvedVersion;
use vdocs_storage::ContentStore;

use crate::document::Document;
use crate::flight::SingleFlight;
use crate::loader::{DocumentLoader, LoadError, storage_call};
use crate::swap_map::{SwapMap, VersionKey};

/// Minimum token length in characters.
const MIN_TOKEN_CHARS: usize = 2;

/// Search tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchConfig {
    /// Multiplier for title term frequency.
    pub title_weight: u32,
    /// Result limit when the caller gives none.
    pub default_limit: usize,
    /// Upper bound for caller-supplied limits.
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            title_weight: 3,
            default_limit: 20,
            max_limit: 100,
        }
    }
}

impl SearchConfig {
    /// Effective limit for a requested one.
    #[must_use]
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

/// Search error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    /// Listing or reading the version's content failed.
    #[error("Storage unavailable: {message}")]
    StorageUnavailable {
        /// Error description.
        message: String,
    },
}

/// One search result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    /// Tenant id.
    pub tenant_id: String,
    /// Version id.
    pub version_id: String,
    /// Document slug.
    pub slug: String,
    /// Document title.
    pub title: String,
    /// Relevance score.
    pub score: u32,
}

/// Split text into lowercase search terms.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_lowercase)
        .collect()
}

fn term_counts(text: &str) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug)]
struct IndexEntry {
    title: String,
    title_terms: HashMap<String, u32>,
    body_terms: HashMap<String, u32>,
}

impl IndexEntry {
    fn from_document(doc: &Document) -> Self {
        Self {
            title: doc.title.clone(),
            title_terms: term_counts(&doc.title),
            body_terms: term_counts(&doc.body),
        }
    }

    fn score(&self, terms: &BTreeSet<String>, title_weight: u32) -> u32 {
        terms
            .iter()
            .map(|term| {
                let title = self.title_terms.get(term).copied().unwrap_or(0);
                let body = self.body_terms.get(term).copied().unwrap_or(0);
                title_weight.saturating_mul(title).saturating_add(body)
            })
            .fold(0, u32::saturating_add)
    }
}

/// Inverted term statistics for the documents of one version.
#[derive(Debug)]
pub struct SearchIndex {
    tenant_id: String,
    version_id: String,
    entries: HashMap<String, Arc<IndexEntry>>,
}

impl SearchIndex {
    /// Create an empty index for a version.
    #[must_use]
    pub fn new(tenant_id: &str, version_id: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_owned(),
            version_id: version_id.to_owned(),
            entries: HashMap::new(),
        }
    }

    /// Build an index from documents of the version.
    ///
    /// Documents of other versions are ignored.
    #[must_use]
    pub fn from_documents<'a>(
        tenant_id: &str,
        version_id: &str,
        docs: impl IntoIterator<Item = &'a Document>,
    ) -> Self {
        let mut index = Self::new(tenant_id, version_id);
        for doc in docs {
            if index.accepts(doc) {
                index
                    .entries
                    .insert(doc.slug.clone(), Arc::new(IndexEntry::from_document(doc)));
            }
        }
        index
    }

    fn accepts(&self, doc: &Document) -> bool {
        doc.tenant_id == self.tenant_id && doc.version_id == self.version_id
    }

    /// Copy of this index with `doc` added or replaced.
    #[must_use]
    pub fn with_document(&self, doc: &Document) -> Self {
        let mut entries = self.entries.clone();
        if self.accepts(doc) {
            entries.insert(doc.slug.clone(), Arc::new(IndexEntry::from_document(doc)));
        }
        Self {
            tenant_id: self.tenant_id.clone(),
            version_id: self.version_id.clone(),
            entries,
        }
    }

    /// Number of indexed documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a slug is indexed.
    #[must_use]
    pub fn contains(&self, slug: &str) -> bool {
        self.entries.contains_key(slug)
    }

    /// Rank documents against a query.
    #[must_use]
    pub fn query(&self, query: &str, limit: usize, title_weight: u32) -> Vec<SearchHit> {
        let terms: BTreeSet<String> = tokenize(query).into_iter().collect();
        if terms.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(&String, &IndexEntry, u32)> = self
            .entries
            .iter()
            .map(|(slug, entry)| (slug, entry.as_ref(), entry.score(&terms, title_weight)))
            .filter(|(_, _, score)| *score > 0)
            .collect();
        scored.sort_by(|(a_slug, _, a), (b_slug, _, b)| b.cmp(a).then_with(|| a_slug.cmp(b_slug)));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(slug, entry, score)| SearchHit {
                tenant_id: self.tenant_id.clone(),
                version_id: self.version_id.clone(),
                slug: slug.clone(),
                title: entry.title.clone(),
                score,
            })
            .collect()
    }
}

/// Cached search indexes per (tenant, version).
pub(crate) struct SearchCache {
    store: Arc<dyn ContentStore>,
    indexes: Arc<SwapMap<VersionKey, SearchIndex>>,
    flights: SingleFlight<VersionKey, Result<Arc<SearchIndex>, SearchError>>,
}

impl SearchCache {
    pub fn new(store: Arc<dyn ContentStore>, ttl: Duration) -> Self {
        Self {
            store,
            indexes: Arc::new(SwapMap::new(ttl)),
            flights: SingleFlight::new(),
        }
    }

    /// Get the index of a resolved version, building it on a miss.
    pub async fn get(
        &self,
        loader: &DocumentLoader,
        version: &ResolvedVersion,
    ) -> Result<Arc<SearchIndex>, SearchError> {
        let key = VersionKey::new(&version.tenant_id, &version.version_id);
        if let Some(index) = self.indexes.get(&key) {
            return Ok(index);
        }

        let store = Arc::clone(&self.store);
        let indexes = Arc::clone(&self.indexes);
        let loader = loader.clone();
        let version = version.clone();
        let task_key = key.clone();
        self.flights
            .run(key, move || {
                let generation = indexes.generation(&task_key);
                async move {
                    let index = Arc::new(build(store, &loader, &version).await?);
                    indexes.insert_if_current(task_key, Arc::clone(&index), generation);
                    Ok(index)
                }
            })
            .await
            .unwrap_or_else(|e| {
                Err(SearchError::StorageUnavailable {
                    message: e.to_string(),
                })
            })
    }

    /// Add or replace a document in its version's index, if that index is built.
    pub fn upsert(&self, doc: &Document) {
        let key = VersionKey::new(&doc.tenant_id, &doc.version_id);
        if self.indexes.update(&key, |index| index.with_document(doc)) {
            tracing::debug!(
                tenant = %doc.tenant_id,
                version = %doc.version_id,
                slug = %doc.slug,
                "Refreshed search entry"
            );
        }
    }

    pub fn invalidate_version(&self, tenant_id: &str, version_id: &str) {
        self.indexes.remove_where(|key| key.is(tenant_id, version_id));
        self.flights.forget_where(|key| key.is(tenant_id, version_id));
    }

    pub fn invalidate_all(&self) {
        self.indexes.remove_where(|_| true);
        self.flights.forget_where(|_| true);
    }

    pub fn evict_expired(&self) -> usize {
        self.indexes.evict_expired()
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }
}

async fn build(
    store: Arc<dyn ContentStore>,
    loader: &DocumentLoader,
    version: &ResolvedVersion,
) -> Result<SearchIndex, SearchError> {
    let location = version.storage_location.clone();
    let slugs = storage_call(move || store.list_slugs(&location))
        .await
        .map_err(|e| SearchError::StorageUnavailable {
            message: e.to_string(),
        })?;

    let mut docs = Vec::with_capacity(slugs.len());
    for (slug, result) in loader.get_many(version, &slugs).await {
        match result {
            Ok(doc) => docs.push(doc),
            Err(LoadError::StorageUnavailable { message }) => {
                return Err(SearchError::StorageUnavailable { message });
            }
            Err(e) => {
                tracing::debug!(slug = %slug, error = %e, "Leaving document out of search index");
            }
        }
    }

    let index = SearchIndex::from_documents(
        &version.tenant_id,
        &version.version_id,
        docs.iter().map(AsRef::as_ref),
    );
    tracing::debug!(
        tenant = %version.tenant_id,
        version = %version.version_id,
        documents = index.len(),
        "Built search index"
    );
    Ok(index)
}

//! Navigation trees.
//!
//! A navigation tree mirrors the slug hierarchy of one version. Each node is
//! either a document (with a slug) or a grouping directory without its own
//! document (slug `None`). Directory titles and positions come from the
//! directory metadata file when present.
//!
//! Siblings are ordered by explicit order ascending, unordered nodes last,
//! then by case-insensitive title, then by path.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use vdocs_registry::ResolvedVersion;
use vdocs_storage::ContentStore;

use crate::document::title_from_slug;
use crate::flight::SingleFlight;
use crate::loader::{DocumentLoader, LoadError, storage_call};
use crate::meta::DirectoryMeta;
use crate::swap_map::{SwapMap, VersionKey};

/// Navigation tree node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NavigationNode {
    /// Document slug, `None` for directories without a document.
    pub slug: Option<String>,
    /// Display title.
    pub title: String,
    /// Explicit sort position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    /// Child nodes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NavigationNode>,
}

impl NavigationNode {
    /// Every document slug in the tree, depth first.
    #[must_use]
    pub fn slugs(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_slugs(&mut out);
        out
    }

    fn collect_slugs<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Some(slug) = &self.slug {
            out.push(slug);
        }
        for child in &self.children {
            child.collect_slugs(out);
        }
    }
}

/// Navigation building error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    /// Listing or reading the version's content failed.
    #[error("Storage unavailable: {message}")]
    StorageUnavailable {
        /// Error description.
        message: String,
    },
}

/// Title and order of one document as seen by navigation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavEntry {
    /// Document slug.
    pub slug: String,
    /// Document title.
    pub title: String,
    /// Document order hint.
    pub order: Option<i64>,
}

/// Directory paths (slug prefixes) that may carry metadata, including the
/// root `""`.
#[must_use]
pub fn directories<'a>(slugs: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    let mut dirs = BTreeSet::from([String::new()]);
    for slug in slugs {
        let mut end = 0;
        while let Some(pos) = slug[end..].find('/') {
            end += pos;
            dirs.insert(slug[..end].to_owned());
            end += 1;
        }
    }
    dirs
}

#[derive(Default)]
struct Builder {
    entry: Option<NavEntry>,
    children: BTreeMap<String, Builder>,
}

impl Builder {
    fn insert(&mut self, entry: NavEntry) {
        if entry.slug.is_empty() {
            self.entry = Some(entry);
            return;
        }
        let mut node = self;
        for segment in entry.slug.split('/') {
            node = node.children.entry(segment.to_owned()).or_default();
        }
        node.entry = Some(entry);
    }

    fn finish(
        self,
        path: &str,
        fallback_title: &str,
        metas: &HashMap<String, DirectoryMeta>,
    ) -> NavigationNode {
        let meta = metas.get(path);
        let title = meta
            .and_then(|m| m.title.clone())
            .or_else(|| self.entry.as_ref().map(|e| e.title.clone()))
            .unwrap_or_else(|| fallback_title.to_owned());
        let order = meta
            .and_then(|m| m.order)
            .or_else(|| self.entry.as_ref().and_then(|e| e.order));

        let mut children: Vec<(String, NavigationNode)> = self
            .children
            .into_iter()
            .map(|(segment, child)| {
                let child_path = if path.is_empty() {
                    segment
                } else {
                    format!("{path}/{segment}")
                };
                let child_title = title_from_slug(&child_path);
                let node = child.finish(&child_path, &child_title, metas);
                (child_path, node)
            })
            .collect();
        children.sort_by(|(a_path, a), (b_path, b)| compare_siblings(a, b).then_with(|| a_path.cmp(b_path)));

        NavigationNode {
            slug: self.entry.map(|e| e.slug),
            title,
            order,
            children: children.into_iter().map(|(_, node)| node).collect(),
        }
    }
}

fn compare_siblings(a: &NavigationNode, b: &NavigationNode) -> Ordering {
    let by_order = match (a.order, b.order) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_order.then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
}

/// Build a navigation tree from document entries and directory metadata.
///
/// `root_title` is used when neither the root metadata nor a root document
/// provides a title.
#[must_use]
pub fn build_tree(
    root_title: &str,
    entries: impl IntoIterator<Item = NavEntry>,
    metas: &HashMap<String, DirectoryMeta>,
) -> NavigationNode {
    let mut root = Builder::default();
    for entry in entries {
        root.insert(entry);
    }
    root.finish("", root_title, metas)
}

/// Cached navigation trees per (tenant, version).
pub(crate) struct NavigationCache {
    store: Arc<dyn ContentStore>,
    trees: Arc<SwapMap<VersionKey, NavigationNode>>,
    flights: SingleFlight<VersionKey, Result<Arc<NavigationNode>, NavigationError>>,
}

impl NavigationCache {
    pub fn new(store: Arc<dyn ContentStore>, ttl: Duration) -> Self {
        Self {
            store,
            trees: Arc::new(SwapMap::new(ttl)),
            flights: SingleFlight::new(),
        }
    }

    /// Get the tree of a resolved version, building it on a miss.
    pub async fn get(
        &self,
        loader: &DocumentLoader,
        version: &ResolvedVersion,
        root_title: &str,
    ) -> Result<Arc<NavigationNode>, NavigationError> {
        let key = VersionKey::new(&version.tenant_id, &version.version_id);
        if let Some(tree) = self.trees.get(&key) {
            return Ok(tree);
        }

        let store = Arc::clone(&self.store);
        let trees = Arc::clone(&self.trees);
        let loader = loader.clone();
        let version = version.clone();
        let root_title = root_title.to_owned();
        let task_key = key.clone();
        self.flights
            .run(key, move || {
                let generation = trees.generation(&task_key);
                async move {
                    let tree = Arc::new(build(&store, &loader, &version, &root_title).await?);
                    trees.insert_if_current(task_key, Arc::clone(&tree), generation);
                    Ok(tree)
                }
            })
            .await
            .unwrap_or_else(|e| {
                Err(NavigationError::StorageUnavailable {
                    message: e.to_string(),
                })
            })
    }

    pub fn invalidate_version(&self, tenant_id: &str, version_id: &str) {
        self.trees.remove_where(|key| key.is(tenant_id, version_id));
        self.flights.forget_where(|key| key.is(tenant_id, version_id));
    }

    pub fn invalidate_all(&self) {
        self.trees.remove_where(|_| true);
        self.flights.forget_where(|_| true);
    }

    pub fn evict_expired(&self) -> usize {
        self.trees.evict_expired()
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }
}

async fn build(
    store: &Arc<dyn ContentStore>,
    loader: &DocumentLoader,
    version: &ResolvedVersion,
    root_title: &str,
) -> Result<NavigationNode, NavigationError> {
    let unavailable = |e: &dyn std::fmt::Display| NavigationError::StorageUnavailable {
        message: e.to_string(),
    };

    let listing_store = Arc::clone(store);
    let location = version.storage_location.clone();
    let (slugs, metas) = storage_call(move || {
        let slugs = listing_store.list_slugs(&location)?;
        let mut metas = HashMap::new();
        for dir in directories(slugs.iter().map(String::as_str)) {
            if let Some(raw) = listing_store.read_meta(&location, &dir)? {
                metas.insert(dir.clone(), DirectoryMeta::from_yaml_lenient(&raw, &dir));
            }
        }
        Ok((slugs, metas))
    })
    .await
    .map_err(|e| unavailable(&e))?;

    let mut entries = Vec::with_capacity(slugs.len());
    for (slug, result) in loader.get_many(version, &slugs).await {
        match result {
            Ok(doc) => entries.push(NavEntry {
                slug,
                title: doc.title.clone(),
                order: doc.order_hint,
            }),
            Err(LoadError::Parse { message, .. }) => {
                tracing::warn!(
                    tenant = %version.tenant_id,
                    version = %version.version_id,
                    slug = %slug,
                    error = %message,
                    "Using fallback navigation title for unparsable document"
                );
                let title = title_from_slug(&slug);
                entries.push(NavEntry {
                    slug,
                    title,
                    order: None,
                });
            }
            Err(LoadError::StorageUnavailable { message }) => {
                return Err(NavigationError::StorageUnavailable { message });
            }
            Err(e) => {
                tracing::debug!(slug = %slug, error = %e, "Skipping document that disappeared");
            }
        }
    }

    tracing::debug!(
        tenant = %version.tenant_id,
        version = %version.version_id,
        documents = entries.len(),
        "Built navigation tree"
    );
    Ok(build_tree(root_title, entries, &metas))
}

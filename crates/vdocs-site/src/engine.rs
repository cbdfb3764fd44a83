//! Content resolution engine.
//!
//! [`Engine`] ties the pieces together: it resolves (tenant, version) against
//! the live registry, loads documents, builds navigation trees and search
//! indexes, and keeps every cache consistent with storage events and
//! registry reloads.
//!
//! Every operation takes the tenant explicitly; nothing is scoped through
//! ambient state.

use std::sync::Arc;

use serde::Serialize;
use vdocs_registry::{
    Registry, RegistryError, RegistryHandle, RegistrySwap, ResolveError, ResolvedVersion,
    VersionResolver,
};
use vdocs_storage::{ContentStore, StorageEvent};

use crate::document::Document;
use crate::loader::{DocumentLoader, LoadError, LoaderConfig};
use crate::navigation::{NavigationCache, NavigationError, NavigationNode};
use crate::render::{ComponentRegistry, HtmlRenderer, Renderer};
use crate::search::{SearchCache, SearchConfig, SearchError, SearchHit};

/// Engine configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Document cache settings. The positive TTL also applies to navigation
    /// trees and search indexes.
    pub loader: LoaderConfig,
    /// Search settings.
    pub search: SearchConfig,
}

/// Any error an engine operation can return.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Tenant or version resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// Document loading failed.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// Navigation building failed.
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    /// Search failed.
    #[error(transparent)]
    Search(#[from] SearchError),
}

/// A tenant's versions with the effective default flagged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionListing {
    /// Tenant id.
    pub tenant_id: String,
    /// Versions in descriptor order.
    pub versions: Vec<VersionSummary>,
}

/// One entry of a [`VersionListing`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSummary {
    /// Version id.
    pub version_id: String,
    /// Display name.
    pub display_name: String,
    /// Whether the resolver picks this version when none is requested.
    pub is_default: bool,
}

/// Number of live entries per cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Cached documents, including cached parse failures.
    pub documents: usize,
    /// Cached navigation trees.
    pub navigation_trees: usize,
    /// Cached search indexes.
    pub search_indexes: usize,
}

/// Multi-tenant, versioned content resolution.
pub struct Engine {
    registry: Arc<RegistryHandle>,
    resolver: VersionResolver,
    loader: DocumentLoader,
    navigation: NavigationCache,
    search: Arc<SearchCache>,
    search_config: SearchConfig,
    renderer: Arc<dyn Renderer>,
    components: ComponentRegistry,
}

impl Engine {
    /// Create an engine serving `registry` from `store`.
    #[must_use]
    pub fn new(
        registry: Arc<RegistryHandle>,
        store: Arc<dyn ContentStore>,
        config: EngineConfig,
    ) -> Self {
        let ttl = config.loader.ttl;
        let search = Arc::new(SearchCache::new(Arc::clone(&store), ttl));
        let observer_search = Arc::clone(&search);
        let loader = DocumentLoader::with_observer(
            Arc::clone(&store),
            config.loader,
            Arc::new(move |doc: &Arc<Document>| observer_search.upsert(doc)),
        );

        Self {
            registry,
            resolver: VersionResolver::default(),
            loader,
            navigation: NavigationCache::new(store, ttl),
            search,
            search_config: config.search,
            renderer: Arc::new(HtmlRenderer::new()),
            components: ComponentRegistry::new(),
        }
    }

    /// Use a different version resolver (e.g. another default ordering).
    #[must_use]
    pub fn with_resolver(mut self, resolver: VersionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Use a different renderer.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Set the components the renderer passes through.
    #[must_use]
    pub fn with_components(mut self, components: ComponentRegistry) -> Self {
        self.components = components;
        self
    }

    /// Snapshot of the live registry.
    #[must_use]
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.snapshot()
    }

    /// Search settings.
    #[must_use]
    pub fn search_config(&self) -> &SearchConfig {
        &self.search_config
    }

    /// Resolve a tenant and optional version against the live registry.
    pub fn resolve(
        &self,
        tenant_id: &str,
        version_id: Option<&str>,
    ) -> Result<ResolvedVersion, ResolveError> {
        self.resolver
            .resolve(&self.registry.snapshot(), tenant_id, version_id)
    }

    /// List a tenant's versions, flagging the effective default.
    pub fn list_versions(&self, tenant_id: &str) -> Result<VersionListing, ResolveError> {
        let registry = self.registry.snapshot();
        let tenant = registry
            .tenant(tenant_id)
            .ok_or_else(|| ResolveError::TenantNotFound(tenant_id.to_owned()))?;
        let default_id = self
            .resolver
            .default_version(tenant)
            .map(|v| v.version_id.as_str());

        Ok(VersionListing {
            tenant_id: tenant.tenant_id.clone(),
            versions: tenant
                .versions
                .iter()
                .map(|v| VersionSummary {
                    version_id: v.version_id.clone(),
                    display_name: v.display_name.clone(),
                    is_default: Some(v.version_id.as_str()) == default_id,
                })
                .collect(),
        })
    }

    /// Get a document.
    pub async fn get_document(
        &self,
        tenant_id: &str,
        version_id: Option<&str>,
        slug: &str,
    ) -> Result<(ResolvedVersion, Arc<Document>), EngineError> {
        let resolved = self.resolve(tenant_id, version_id)?;
        let doc = self.loader.get(&resolved, slug).await?;
        Ok((resolved, doc))
    }

    /// Get the navigation tree of a version.
    pub async fn get_navigation(
        &self,
        tenant_id: &str,
        version_id: Option<&str>,
    ) -> Result<(ResolvedVersion, Arc<NavigationNode>), EngineError> {
        let registry = self.registry.snapshot();
        let resolved = self.resolver.resolve(&registry, tenant_id, version_id)?;
        let root_title = registry
            .get_version(&resolved.tenant_id, &resolved.version_id)
            .map_or_else(|_| resolved.version_id.clone(), |v| v.display_name.clone());
        let tree = self
            .navigation
            .get(&self.loader, &resolved, &root_title)
            .await?;
        Ok((resolved, tree))
    }

    /// Search the documents of one version.
    ///
    /// `limit` defaults to the configured default and is capped at the
    /// configured maximum.
    pub async fn search(
        &self,
        tenant_id: &str,
        version_id: Option<&str>,
        query: &str,
        limit: Option<usize>,
    ) -> Result<(ResolvedVersion, Vec<SearchHit>), EngineError> {
        let resolved = self.resolve(tenant_id, version_id)?;
        let index = self.search.get(&self.loader, &resolved).await?;
        let hits = index.query(
            query,
            self.search_config.clamp_limit(limit),
            self.search_config.title_weight,
        );
        Ok((resolved, hits))
    }

    /// Render a document body to HTML.
    #[must_use]
    pub fn render_html(&self, doc: &Document) -> String {
        self.renderer.render(&doc.body, &self.components)
    }

    /// Apply a storage change to every (tenant, version) served from the
    /// event's location.
    ///
    /// The changed document, the navigation tree and the search index of each
    /// affected version are dropped; the next request rebuilds them from the
    /// documents that are still cached. Other versions keep their caches and
    /// any builds they have running.
    pub fn handle_event(&self, event: &StorageEvent) {
        let pairs = self.registry.snapshot().pairs_at(&event.location);
        if pairs.is_empty() {
            tracing::debug!(location = %event.location, "Ignoring event for unknown location");
            return;
        }

        for (tenant_id, version_id) in &pairs {
            self.loader.invalidate(tenant_id, version_id, &event.slug);
            self.navigation.invalidate_version(tenant_id, version_id);
            self.search.invalidate_version(tenant_id, version_id);
        }

        tracing::debug!(
            location = %event.location,
            slug = %event.slug,
            kind = ?event.kind,
            pairs = pairs.len(),
            "Applied storage event"
        );
    }

    /// Drop cached artifacts of pairs that a registry swap made stale.
    ///
    /// Returns the number of stale pairs.
    pub fn apply_registry_swap(&self, swap: &RegistrySwap) -> usize {
        let stale = swap.stale_pairs();
        for pair in &stale {
            let documents = self
                .loader
                .invalidate_version(&pair.tenant_id, &pair.version_id);
            self.navigation
                .invalidate_version(&pair.tenant_id, &pair.version_id);
            self.search
                .invalidate_version(&pair.tenant_id, &pair.version_id);
            tracing::info!(
                tenant = %pair.tenant_id,
                version = %pair.version_id,
                location = %pair.storage_location,
                documents,
                "Dropped cached content of stale version"
            );
        }
        stale.len()
    }

    /// Reload the registry descriptor and apply the swap.
    ///
    /// On error the previous registry stays live.
    pub fn reload_registry(&self) -> Result<RegistrySwap, RegistryError> {
        let swap = self.registry.reload()?;
        self.apply_registry_swap(&swap);
        Ok(swap)
    }

    /// Drop every cached artifact.
    pub fn invalidate_all(&self) {
        self.loader.invalidate_all();
        self.navigation.invalidate_all();
        self.search.invalidate_all();
    }

    /// Remove expired cache entries, returning how many were removed.
    pub fn evict_expired(&self) -> usize {
        self.loader.evict_expired() + self.navigation.evict_expired() + self.search.evict_expired()
    }

    /// Storage locations of the live registry.
    #[must_use]
    pub fn locations(&self) -> Vec<String> {
        self.registry.snapshot().locations()
    }

    /// Current cache sizes.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            documents: self.loader.len(),
            navigation_trees: self.navigation.len(),
            search_indexes: self.search.len(),
        }
    }
}

//! Document loading, navigation and search for vdocs.
//!
//! This crate provides:
//! - [`Engine`]: resolves (tenant, version, slug) requests against the live
//!   registry and serves documents, navigation trees and search results
//! - [`DocumentLoader`]: cached document loading with single-flight misses
//! - [`HtmlRenderer`]: markdown rendering with component pass-through
//!
//! # Quick Start
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use vdocs_registry::RegistryHandle;
//! use vdocs_site::{Engine, EngineConfig};
//! use vdocs_storage_fs::FsStore;
//!
//! let registry = Arc::new(RegistryHandle::load("registry.yaml")?);
//! let store = Arc::new(FsStore::new("content".into()));
//! let engine = Engine::new(registry, store, EngineConfig::default());
//!
//! let (version, doc) = engine.get_document("acme", None, "guide/intro").await?;
//! let (_, tree) = engine.get_navigation("acme", Some(&version.version_id)).await?;
//! # Ok(())
//! # }
//! ```

mod document;
mod engine;
mod flight;
mod frontmatter;
mod loader;
mod meta;
mod navigation;
mod render;
mod search;
mod swap_map;

pub use document::{Document, title_from_slug};
pub use engine::{CacheStats, Engine, EngineConfig, EngineError, VersionListing, VersionSummary};
pub use flight::FlightAborted;
pub use frontmatter::{Frontmatter, FrontmatterError, Scalar};
pub use loader::{DocKey, DocumentLoader, LoadError, LoadObserver, LoaderConfig, normalize_slug};
pub use meta::{DirectoryMeta, MetadataError};
pub use navigation::{NavEntry, NavigationError, NavigationNode, build_tree, directories};
pub use render::{ComponentRegistry, HtmlRenderer, Renderer};
pub use search::{SearchConfig, SearchError, SearchHit, SearchIndex, tokenize};

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Engine: Send, Sync);
    assert_impl_all!(DocumentLoader: Send, Sync, Clone);
    assert_impl_all!(SearchIndex: Send, Sync);
    assert_impl_all!(EngineError: Send, Sync, std::error::Error);
}

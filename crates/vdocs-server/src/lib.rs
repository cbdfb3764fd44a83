//! HTTP resolution API for vdocs.
//!
//! This crate serves the content engine over HTTP with axum:
//! - `GET /content/{tenant}/{*slug}`: a document, optionally rendered
//! - `GET /content/{tenant}/versions`: the tenant's versions
//! - `GET /navigation/{tenant}`: the navigation tree of a version
//! - `GET /search/{tenant}`: search within a version
//!
//! Every endpoint accepts `?version=`; without it the tenant's default
//! version is served.
//!
//! # Quick Start
//!
//! ```no_run
//! use vdocs_config::Config;
//! use vdocs_server::{ServerConfig, run_server};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(None, None)?;
//! run_server(ServerConfig::from_config(&config)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Client ──HTTP──► axum router (vdocs-server)
//!                        │
//!                        └─► Engine (vdocs-site)
//!                               ├─► Registry snapshot (vdocs-registry)
//!                               └─► RetryingStore ─► FsStore (vdocs-storage-fs)
//!
//! FsStore watcher ──events──► Engine::handle_event
//! notify (descriptor) ──────► Engine::reload_registry
//! interval ─────────────────► Engine::evict_expired
//! ```

mod app;
mod error;
mod handlers;
mod middleware;
mod state;
mod sweeper;
mod watch;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use state::AppState;
use vdocs_config::{Config, VersionOrderingKind};
use vdocs_registry::{LexicographicOrdering, RegistryHandle, SemverOrdering, VersionResolver};
use vdocs_site::{Engine, EngineConfig, LoaderConfig, SearchConfig};
use vdocs_storage::{ContentStore, RetryPolicy, RetryingStore};
use vdocs_storage_fs::FsStore;

pub use watch::WatchError;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Registry descriptor path.
    pub registry_path: PathBuf,
    /// Watch the descriptor and content for changes.
    pub watch: bool,
    /// Content store root directory.
    pub storage_root: PathBuf,
    /// Directory metadata file name.
    pub meta_filename: String,
    /// Retry policy for storage reads.
    pub retry: RetryPolicy,
    /// Cache and search settings.
    pub engine: EngineConfig,
    /// Ordering used to pick a default version.
    pub ordering: VersionOrderingKind,
    /// Interval between expired-entry sweeps.
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ServerConfig {
    /// Create server configuration from vdocs config.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let storage = &config.storage_resolved;
        Self {
            host: config.server.host.clone(),
            port: config.server.port,
            registry_path: config.registry_resolved.path.clone(),
            watch: config.registry_resolved.watch,
            storage_root: storage.root.clone(),
            meta_filename: storage.meta_filename.clone(),
            retry: RetryPolicy {
                max_attempts: storage.retry_attempts,
                base_delay: storage.retry_base_delay,
                ..RetryPolicy::default()
            },
            engine: EngineConfig {
                loader: LoaderConfig {
                    capacity: config.cache.capacity,
                    ttl: config.cache.ttl(),
                    negative_ttl: config.cache.negative_ttl(),
                },
                search: SearchConfig {
                    title_weight: config.search.title_weight,
                    default_limit: config.search.default_limit,
                    max_limit: config.search.max_limit,
                },
            },
            ordering: config.versions.ordering,
            sweep_interval: config.cache.sweep_interval(),
        }
    }

    /// Version resolver for the configured ordering.
    #[must_use]
    pub fn resolver(&self) -> VersionResolver {
        match self.ordering {
            VersionOrderingKind::Semver => VersionResolver::new(SemverOrdering),
            VersionOrderingKind::Lexicographic => VersionResolver::new(LexicographicOrdering),
        }
    }
}

/// Run the server until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the registry cannot be loaded, watching cannot be
/// started, or the server fails to bind.
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(RegistryHandle::load(config.registry_path.clone())?);
    let fs = FsStore::new(config.storage_root.clone()).with_meta_filename(&config.meta_filename);
    let store: Arc<dyn ContentStore> = Arc::new(RetryingStore::new(fs, config.retry));

    let engine = Arc::new(
        Engine::new(registry, Arc::clone(&store), config.engine).with_resolver(config.resolver()),
    );
    let tenants = engine.registry().list_tenants().len();
    tracing::info!(
        tenants,
        registry = %config.registry_path.display(),
        storage = %config.storage_root.display(),
        "Registry loaded"
    );

    let sweeper = sweeper::spawn_sweeper(Arc::clone(&engine), config.sweep_interval);

    // Keep watchers alive for the server's lifetime.
    let _watchers = if config.watch {
        let storage = Arc::new(watch::StorageWatch::new(Arc::clone(&engine), store));
        storage.sync()?;
        let registry_watcher = watch::watch_registry(&config.registry_path, Arc::clone(&storage))?;
        Some((storage, registry_watcher))
    } else {
        None
    };

    let app = app::create_router(Arc::new(AppState { engine }));

    let addr = SocketAddr::from_str(&format!("{}:{}", config.host, config.port))?;
    tracing::info!(address = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}

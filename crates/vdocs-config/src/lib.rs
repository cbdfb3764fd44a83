//! Configuration management for vdocs.
//!
//! Parses `vdocs.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `server.host`
//! - `registry.path`
//! - `storage.root`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override registry descriptor path.
    pub registry_path: Option<PathBuf>,
    /// Override content storage root.
    pub storage_root: Option<PathBuf>,
    /// Override registry and storage watching.
    pub watch: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "vdocs.toml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Registry configuration (paths are relative strings from TOML).
    registry: RegistryConfigRaw,
    /// Storage configuration (paths are relative strings from TOML).
    storage: StorageConfigRaw,
    /// Cache sizing and lifetimes.
    pub cache: CacheConfig,
    /// Default version selection.
    pub versions: VersionsConfig,
    /// Search tuning.
    pub search: SearchSettings,

    /// Resolved registry configuration (set after loading).
    #[serde(skip)]
    pub registry_resolved: RegistryConfig,
    /// Resolved storage configuration (set after loading).
    #[serde(skip)]
    pub storage_resolved: StorageConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 7979,
        }
    }
}

/// Raw registry configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RegistryConfigRaw {
    path: Option<String>,
    watch: Option<bool>,
}

/// Resolved registry configuration with an absolute path.
#[derive(Debug, Default)]
pub struct RegistryConfig {
    /// Registry descriptor file (YAML, TOML or JSON).
    pub path: PathBuf,
    /// Whether to reload the registry when the descriptor changes.
    pub watch: bool,
}

/// Raw storage configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct StorageConfigRaw {
    root: Option<String>,
    meta_filename: Option<String>,
    retry_attempts: Option<u32>,
    retry_base_delay_ms: Option<u64>,
}

/// Resolved storage configuration with an absolute root.
#[derive(Debug)]
pub struct StorageConfig {
    /// Directory that storage locations are relative to.
    pub root: PathBuf,
    /// Filename of directory metadata files.
    pub meta_filename: String,
    /// Attempts per storage operation, including the first.
    pub retry_attempts: u32,
    /// Delay before the first retry.
    pub retry_base_delay: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("content"),
            meta_filename: "meta.yaml".to_owned(),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(50),
        }
    }
}

/// Cache configuration.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Maximum number of cached documents.
    pub capacity: usize,
    /// Lifetime of cached documents, navigation trees and search indexes.
    pub ttl_secs: u64,
    /// Lifetime of cached parse failures.
    pub negative_ttl_secs: u64,
    /// Interval between expired-entry sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            ttl_secs: 300,
            negative_ttl_secs: 30,
            sweep_interval_secs: 30,
        }
    }
}

impl CacheConfig {
    /// Positive TTL.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Negative TTL.
    #[must_use]
    pub fn negative_ttl(&self) -> Duration {
        Duration::from_secs(self.negative_ttl_secs)
    }

    /// Sweep interval.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Ordering used to pick a default version when none is marked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionOrderingKind {
    /// Semantic-version-aware ordering.
    #[default]
    Semver,
    /// Plain string ordering.
    Lexicographic,
}

/// Version selection configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VersionsConfig {
    /// Ordering for default selection.
    pub ordering: VersionOrderingKind,
}

/// Search configuration.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchSettings {
    /// Result limit when a request gives none.
    pub default_limit: usize,
    /// Upper bound for requested limits.
    pub max_limit: usize,
    /// Multiplier for title matches.
    pub title_weight: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
            title_weight: 3,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`storage.root`").
        field: String,
        /// Error message (e.g., "${`DOCS_ROOT`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a numeric field to be positive.
fn require_positive(value: u64, field: &str) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Validation(format!(
            "{field} must be greater than 0"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `vdocs.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails or
    /// the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(path) = &settings.registry_path {
            self.registry_resolved.path.clone_from(path);
        }
        if let Some(root) = &settings.storage_root {
            self.storage_resolved.root.clone_from(root);
        }
        if let Some(watch) = settings.watch {
            self.registry_resolved.watch = watch;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            server: ServerConfig::default(),
            registry: RegistryConfigRaw::default(),
            storage: StorageConfigRaw::default(),
            cache: CacheConfig::default(),
            versions: VersionsConfig::default(),
            search: SearchSettings::default(),
            registry_resolved: RegistryConfig {
                path: base.join("registry.yaml"),
                watch: true,
            },
            storage_resolved: StorageConfig {
                root: base.join("content"),
                ..StorageConfig::default()
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content, path.parent().unwrap_or(Path::new(".")))
            .map(|config| Self {
                config_path: Some(path.to_path_buf()),
                ..config
            })
    }

    /// Parse, expand, resolve and validate configuration text.
    fn from_toml(content: &str, config_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;
        config.resolve_paths(config_dir);
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Checks that all required fields are properly set and contain valid values.
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_storage()?;
        self.validate_cache()?;
        self.validate_search()?;
        Ok(())
    }

    /// Validate server configuration.
    fn validate_server(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;

        // Port 0 is technically valid (OS assigns a random port), but it's
        // unlikely to be intentional in a config file
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        Ok(())
    }

    /// Validate storage configuration.
    fn validate_storage(&self) -> Result<(), ConfigError> {
        let meta = &self.storage_resolved.meta_filename;
        require_non_empty(meta, "storage.meta_filename")?;
        if meta.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "storage.meta_filename must be a plain file name".to_owned(),
            ));
        }
        require_positive(
            u64::from(self.storage_resolved.retry_attempts),
            "storage.retry_attempts",
        )
    }

    /// Validate cache configuration.
    fn validate_cache(&self) -> Result<(), ConfigError> {
        require_positive(self.cache.capacity as u64, "cache.capacity")?;
        require_positive(self.cache.ttl_secs, "cache.ttl_secs")?;
        require_positive(self.cache.negative_ttl_secs, "cache.negative_ttl_secs")?;
        require_positive(self.cache.sweep_interval_secs, "cache.sweep_interval_secs")?;
        if self.cache.negative_ttl_secs > self.cache.ttl_secs {
            return Err(ConfigError::Validation(
                "cache.negative_ttl_secs cannot exceed cache.ttl_secs".to_owned(),
            ));
        }
        Ok(())
    }

    /// Validate search configuration.
    fn validate_search(&self) -> Result<(), ConfigError> {
        require_positive(self.search.default_limit as u64, "search.default_limit")?;
        require_positive(u64::from(self.search.title_weight), "search.title_weight")?;
        if self.search.max_limit < self.search.default_limit {
            return Err(ConfigError::Validation(
                "search.max_limit cannot be less than search.default_limit".to_owned(),
            ));
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;

        if let Some(ref path) = self.registry.path {
            self.registry.path = Some(expand::expand_env(path, "registry.path")?);
        }
        if let Some(ref root) = self.storage.root {
            self.storage.root = Some(expand::expand_env(root, "storage.root")?);
        }

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));
        let defaults = StorageConfig::default();

        self.registry_resolved = RegistryConfig {
            path: resolve(self.registry.path.as_deref(), "registry.yaml"),
            watch: self.registry.watch.unwrap_or(true),
        };

        self.storage_resolved = StorageConfig {
            root: resolve(self.storage.root.as_deref(), "content"),
            meta_filename: self
                .storage
                .meta_filename
                .clone()
                .unwrap_or(defaults.meta_filename),
            retry_attempts: self
                .storage
                .retry_attempts
                .unwrap_or(defaults.retry_attempts),
            retry_base_delay: self
                .storage
                .retry_base_delay_ms
                .map_or(defaults.retry_base_delay, Duration::from_millis),
        };
    }
}

//! Registry snapshot and its atomically swapped handle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use crate::descriptor::{self, DescriptorFormat};
use crate::validate::{self, ValidationIssue};

/// Source of generation numbers, shared by every registry in the process.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// A documentation version of a tenant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Version {
    /// Identifier, unique within the tenant.
    pub version_id: String,
    /// Human-readable name (defaults to the id).
    #[serde(default)]
    pub display_name: String,
    /// Where this version's content lives in the content store.
    pub storage_location: String,
    /// Whether this is the tenant's designated default.
    #[serde(default)]
    pub is_default: bool,
}

/// An organization whose documentation is served.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Tenant {
    /// Identifier, unique across the registry.
    pub tenant_id: String,
    /// Human-readable name (defaults to the id).
    #[serde(default)]
    pub display_name: String,
    /// Versions in descriptor order.
    #[serde(default)]
    pub versions: Vec<Version>,
}

impl Tenant {
    /// Look up a version by id.
    #[must_use]
    pub fn version(&self, version_id: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.version_id == version_id)
    }

    fn fill_display_names(&mut self) {
        if self.display_name.is_empty() {
            self.display_name.clone_from(&self.tenant_id);
        }
        for version in &mut self.versions {
            if version.display_name.is_empty() {
                version.display_name.clone_from(&version.version_id);
            }
        }
    }
}

/// Registry error.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Requested tenant or version is not registered.
    #[error("{}", not_found_message(.tenant_id, .version_id.as_deref()))]
    NotFound {
        /// Requested tenant.
        tenant_id: String,
        /// Requested version (`None` when the tenant itself is missing).
        version_id: Option<String>,
    },
    /// Descriptor could not be read.
    #[error("Failed to read registry descriptor {}: {source}", .path.display())]
    Io {
        /// Descriptor path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Descriptor extension is not one of yaml/yml/toml/json.
    #[error("Unsupported registry descriptor format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
    /// Descriptor is not well-formed.
    #[error("Failed to parse registry descriptor: {0}")]
    Parse(String),
    /// Descriptor parsed but violates registry rules.
    #[error("Invalid registry descriptor:\n{}", format_issues(.0))]
    Invalid(Vec<ValidationIssue>),
}

fn not_found_message(tenant_id: &str, version_id: Option<&str>) -> String {
    match version_id {
        Some(version_id) => format!("Version not found: {tenant_id}/{version_id}"),
        None => format!("Tenant not found: {tenant_id}"),
    }
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - {issue}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Immutable, validated snapshot of all tenants and versions.
#[derive(Debug)]
pub struct Registry {
    tenants: Vec<Tenant>,
    index: HashMap<String, usize>,
    generation: u64,
}

impl Registry {
    /// Build a registry from tenant entries, validating them.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Invalid`] listing every violation.
    pub fn from_tenants(mut tenants: Vec<Tenant>) -> Result<Self, RegistryError> {
        let issues = validate::validate(&tenants);
        if !issues.is_empty() {
            return Err(RegistryError::Invalid(issues));
        }

        for tenant in &mut tenants {
            tenant.fill_display_names();
        }
        let index = tenants
            .iter()
            .enumerate()
            .map(|(i, t)| (t.tenant_id.clone(), i))
            .collect();

        Ok(Self {
            tenants,
            index,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        })
    }

    /// Empty registry (serves no tenants).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            tenants: Vec::new(),
            index: HashMap::new(),
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Parse and validate descriptor content.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Parse`] or [`RegistryError::Invalid`].
    pub fn parse(content: &str, format: DescriptorFormat) -> Result<Self, RegistryError> {
        let tenants = descriptor::parse(content, format).map_err(RegistryError::Parse)?;
        Self::from_tenants(tenants)
    }

    /// Load and validate a descriptor file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, has an unknown extension,
    /// fails to parse, or fails validation.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let format = DescriptorFormat::from_path(path)
            .ok_or_else(|| RegistryError::UnsupportedFormat(path.to_path_buf()))?;
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, format)
    }

    /// All tenants in descriptor order.
    #[must_use]
    pub fn list_tenants(&self) -> &[Tenant] {
        &self.tenants
    }

    /// Look up a tenant.
    #[must_use]
    pub fn tenant(&self, tenant_id: &str) -> Option<&Tenant> {
        self.index.get(tenant_id).map(|&i| &self.tenants[i])
    }

    /// Versions of a tenant in descriptor order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for an unknown tenant.
    pub fn list_versions(&self, tenant_id: &str) -> Result<&[Version], RegistryError> {
        self.tenant(tenant_id)
            .map(|t| t.versions.as_slice())
            .ok_or_else(|| RegistryError::NotFound {
                tenant_id: tenant_id.to_owned(),
                version_id: None,
            })
    }

    /// Look up a specific version of a tenant.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the tenant or the version is unknown.
    pub fn get_version(&self, tenant_id: &str, version_id: &str) -> Result<&Version, RegistryError> {
        self.list_versions(tenant_id)?
            .iter()
            .find(|v| v.version_id == version_id)
            .ok_or_else(|| RegistryError::NotFound {
                tenant_id: tenant_id.to_owned(),
                version_id: Some(version_id.to_owned()),
            })
    }

    /// Generation number; a later registry always has a greater one.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Every distinct storage location, sorted.
    #[must_use]
    pub fn locations(&self) -> Vec<String> {
        let mut locations: Vec<String> = self
            .tenants
            .iter()
            .flat_map(|t| t.versions.iter().map(|v| v.storage_location.clone()))
            .collect();
        locations.sort();
        locations.dedup();
        locations
    }

    /// (tenant, version) pairs served from `location`.
    #[must_use]
    pub fn pairs_at(&self, location: &str) -> Vec<(String, String)> {
        self.tenants
            .iter()
            .flat_map(|t| {
                t.versions
                    .iter()
                    .filter(|v| v.storage_location == location)
                    .map(|v| (t.tenant_id.clone(), v.version_id.clone()))
            })
            .collect()
    }

    /// Pairs of `self` that are gone or relocated in `next`.
    #[must_use]
    pub fn stale_pairs(&self, next: &Registry) -> Vec<StalePair> {
        self.tenants
            .iter()
            .flat_map(|t| t.versions.iter().map(move |v| (t, v)))
            .filter(|(t, v)| {
                next.get_version(&t.tenant_id, &v.version_id)
                    .map_or(true, |nv| nv.storage_location != v.storage_location)
            })
            .map(|(t, v)| StalePair {
                tenant_id: t.tenant_id.clone(),
                version_id: v.version_id.clone(),
                storage_location: v.storage_location.clone(),
            })
            .collect()
    }
}

/// A (tenant, version) pair whose cached artifacts no longer apply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StalePair {
    /// Tenant id.
    pub tenant_id: String,
    /// Version id.
    pub version_id: String,
    /// Storage location the pair was served from.
    pub storage_location: String,
}

/// Result of swapping in a new registry.
#[derive(Debug)]
pub struct RegistrySwap {
    /// Registry that was live before the swap.
    pub previous: Arc<Registry>,
    /// Registry that is live now.
    pub current: Arc<Registry>,
}

impl RegistrySwap {
    /// Pairs that disappeared or changed location.
    #[must_use]
    pub fn stale_pairs(&self) -> Vec<StalePair> {
        self.previous.stale_pairs(&self.current)
    }
}

/// Shared handle publishing the live registry.
///
/// Readers take cheap snapshots with [`snapshot`](Self::snapshot); a reload
/// replaces the snapshot atomically and never exposes a partially updated
/// registry.
pub struct RegistryHandle {
    current: ArcSwap<Registry>,
    path: Option<PathBuf>,
}

impl RegistryHandle {
    /// Wrap an in-memory registry (reload is not available).
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self {
            current: ArcSwap::from_pointee(registry),
            path: None,
        }
    }

    /// Load the registry from a descriptor file and remember the path for reloads.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial load fails.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let registry = Registry::load(&path)?;
        tracing::info!(
            path = %path.display(),
            tenants = registry.list_tenants().len(),
            generation = registry.generation(),
            "Registry loaded"
        );
        Ok(Self {
            current: ArcSwap::from_pointee(registry),
            path: Some(path),
        })
    }

    /// Current registry snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Registry> {
        self.current.load_full()
    }

    /// Descriptor path, if loaded from a file.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Publish a new registry.
    pub fn replace(&self, registry: Registry) -> RegistrySwap {
        let current = Arc::new(registry);
        let previous = self.current.swap(Arc::clone(&current));
        RegistrySwap { previous, current }
    }

    /// Re-read the descriptor and publish it if valid.
    ///
    /// On failure the previous registry stays live.
    ///
    /// # Errors
    ///
    /// Returns the load error; returns [`RegistryError::Io`] with kind
    /// `Unsupported` when the handle was not created from a file.
    pub fn reload(&self) -> Result<RegistrySwap, RegistryError> {
        let Some(path) = &self.path else {
            return Err(RegistryError::Io {
                path: PathBuf::new(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "registry was not loaded from a file",
                ),
            });
        };

        match Registry::load(path) {
            Ok(registry) => {
                let swap = self.replace(registry);
                tracing::info!(
                    path = %path.display(),
                    tenants = swap.current.list_tenants().len(),
                    generation = swap.current.generation(),
                    "Registry reloaded"
                );
                Ok(swap)
            }
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Registry reload failed, keeping previous registry"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;

    use super::*;

    const ACME: &str = r#"
tenants:
  - tenantId: acme
    displayName: ACME Corp
    versions:
      - { versionId: v1, displayName: "1.x", storageLocation: acme/v1, isDefault: true }
      - { versionId: v2, storageLocation: acme/v2 }
  - tenantId: globex
    versions:
      - { versionId: v1, storageLocation: shared/v1 }
"#;

    fn acme() -> Registry {
        Registry::parse(ACME, DescriptorFormat::Yaml).unwrap()
    }

    #[test]
    fn test_lookup() {
        let registry = acme();

        assert_eq!(registry.list_tenants().len(), 2);
        assert_eq!(registry.tenant("acme").unwrap().display_name, "ACME Corp");
        assert_eq!(registry.list_versions("acme").unwrap().len(), 2);
        assert_eq!(
            registry.get_version("acme", "v2").unwrap().storage_location,
            "acme/v2"
        );
        assert!(registry.tenant("initech").is_none());
    }

    #[test]
    fn test_display_names_default_to_ids() {
        let registry = acme();

        assert_eq!(registry.tenant("globex").unwrap().display_name, "globex");
        assert_eq!(registry.get_version("acme", "v2").unwrap().display_name, "v2");
        assert_eq!(registry.get_version("acme", "v1").unwrap().display_name, "1.x");
    }

    #[test]
    fn test_not_found_errors() {
        let registry = acme();

        let err = registry.get_version("acme", "v9").unwrap_err();
        assert!(matches!(
            &err,
            RegistryError::NotFound { tenant_id, version_id: Some(v) } if tenant_id == "acme" && v == "v9"
        ));
        assert_eq!(err.to_string(), "Version not found: acme/v9");

        let err = registry.list_versions("initech").unwrap_err();
        assert_eq!(err.to_string(), "Tenant not found: initech");
    }

    #[test]
    fn test_invalid_descriptor_reports_every_issue() {
        let yaml = r#"
tenants:
  - tenantId: acme
    versions:
      - { versionId: v1, storageLocation: a, isDefault: true }
      - { versionId: v2, storageLocation: b, isDefault: true }
  - tenantId: globex
    versions: []
"#;
        let err = Registry::parse(yaml, DescriptorFormat::Yaml).unwrap_err();

        let RegistryError::Invalid(issues) = &err else {
            panic!("expected Invalid, got {err:?}");
        };
        assert_eq!(issues.len(), 2);
        assert!(err.to_string().contains("tenant 'acme'"));
        assert!(err.to_string().contains("tenant 'globex': tenant has no versions"));
    }

    #[test]
    fn test_empty_registry_is_valid() {
        let registry = Registry::parse("tenants: []", DescriptorFormat::Yaml).unwrap();

        assert!(registry.list_tenants().is_empty());
        assert!(registry.locations().is_empty());
    }

    #[test]
    fn test_generation_increases() {
        let first = acme();
        let second = acme();

        assert!(second.generation() > first.generation());
    }

    #[test]
    fn test_locations_and_pairs() {
        let registry = acme();

        assert_eq!(registry.locations(), vec!["acme/v1", "acme/v2", "shared/v1"]);
        assert_eq!(
            registry.pairs_at("shared/v1"),
            vec![("globex".to_owned(), "v1".to_owned())]
        );
        assert!(registry.pairs_at("nowhere").is_empty());
    }

    #[test]
    fn test_stale_pairs_on_removal_and_relocation() {
        let before = acme();
        let after = Registry::parse(
            r#"
tenants:
  - tenantId: acme
    versions:
      - { versionId: v1, storageLocation: acme/v1, isDefault: true }
      - { versionId: v2, storageLocation: acme/v2-new }
"#,
            DescriptorFormat::Yaml,
        )
        .unwrap();

        let stale = before.stale_pairs(&after);

        assert_eq!(
            stale,
            vec![
                StalePair {
                    tenant_id: "acme".to_owned(),
                    version_id: "v2".to_owned(),
                    storage_location: "acme/v2".to_owned(),
                },
                StalePair {
                    tenant_id: "globex".to_owned(),
                    version_id: "v1".to_owned(),
                    storage_location: "shared/v1".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(
            &path,
            r#"{"tenants":[{"tenantId":"acme","versions":[{"versionId":"v1","storageLocation":"acme/v1"}]}]}"#,
        )
        .unwrap();

        let registry = Registry::load(&path).unwrap();

        assert_eq!(registry.list_tenants()[0].tenant_id, "acme");
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let err = Registry::load(Path::new("registry.ini")).unwrap_err();

        assert!(matches!(err, RegistryError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_handle_reload_swaps_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.yaml");
        fs::write(&path, ACME).unwrap();
        let handle = RegistryHandle::load(&path).unwrap();
        let before = handle.snapshot();

        fs::write(
            &path,
            "tenants:\n  - tenantId: acme\n    versions:\n      - { versionId: v3, storageLocation: acme/v3 }\n",
        )
        .unwrap();
        let swap = handle.reload().unwrap();

        assert!(Arc::ptr_eq(&swap.previous, &before));
        assert!(handle.snapshot().get_version("acme", "v3").is_ok());
        assert!(handle.snapshot().tenant("globex").is_none());
        assert!(before.tenant("globex").is_some());
        assert_eq!(swap.stale_pairs().len(), 3);
    }

    #[test]
    fn test_handle_reload_keeps_previous_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.yaml");
        fs::write(&path, ACME).unwrap();
        let handle = RegistryHandle::load(&path).unwrap();
        let generation = handle.snapshot().generation();

        fs::write(&path, "tenants:\n  - tenantId: acme\n    versions: []\n").unwrap();
        let err = handle.reload().unwrap_err();

        assert!(matches!(err, RegistryError::Invalid(_)));
        assert_eq!(handle.snapshot().generation(), generation);
        assert!(handle.snapshot().tenant("globex").is_some());
    }

    #[test]
    fn test_in_memory_handle_cannot_reload() {
        let handle = RegistryHandle::new(Registry::empty());

        assert!(handle.path().is_none());
        assert!(handle.reload().is_err());
    }
}

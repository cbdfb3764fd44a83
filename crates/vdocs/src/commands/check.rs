//! `vdocs check` command implementation.
//!
//! Loads the configuration and registry descriptor, then reports every
//! tenant version with its effective default and document count.

use std::path::PathBuf;

use clap::Args;
use vdocs_config::{CliSettings, Config};
use vdocs_registry::{Registry, VersionResolver};
use vdocs_server::ServerConfig;
use vdocs_storage::ContentStore;
use vdocs_storage_fs::FsStore;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the check command.
#[derive(Args)]
pub(crate) struct CheckArgs {
    /// Path to configuration file (default: auto-discover vdocs.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Registry descriptor (overrides config).
    #[arg(short, long, env = "VDOCS_REGISTRY")]
    registry: Option<PathBuf>,

    /// Content store root directory (overrides config).
    #[arg(short, long, env = "VDOCS_STORAGE_ROOT")]
    storage_root: Option<PathBuf>,
}

/// Check result for one version.
#[derive(Debug, PartialEq, Eq)]
struct VersionReport {
    version_id: String,
    display_name: String,
    storage_location: String,
    is_default: bool,
    /// Number of documents, or the listing error.
    documents: Result<usize, String>,
}

/// Check result for one tenant.
#[derive(Debug, PartialEq, Eq)]
struct TenantReport {
    tenant_id: String,
    display_name: String,
    versions: Vec<VersionReport>,
}

impl CheckArgs {
    /// Execute the check command.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration or registry is invalid.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            registry_path: self.registry,
            storage_root: self.storage_root,
            ..Default::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        if let Some(path) = &config.config_path {
            output.info(&format!("Config: {}", path.display()));
        }

        let registry_path = &config.registry_resolved.path;
        let registry = Registry::load(registry_path)?;
        output.success(&format!("Registry: {} (valid)", registry_path.display()));

        let store = FsStore::new(config.storage_resolved.root.clone())
            .with_meta_filename(&config.storage_resolved.meta_filename);
        let resolver = ServerConfig::from_config(&config).resolver();
        let reports = build_reports(&registry, &resolver, &store);

        output.separator();
        for tenant in &reports {
            output.highlight(&format!("{} ({})", tenant.tenant_id, tenant.display_name));
            for version in &tenant.versions {
                let marker = if version.is_default { "*" } else { " " };
                let line = format!(
                    "  {marker} {} ({}) -> {}",
                    version.version_id, version.display_name, version.storage_location
                );
                match &version.documents {
                    Ok(0) => output.warning(&format!("{line}: no documents")),
                    Ok(count) => output.info(&format!("{line}: {count} documents")),
                    Err(e) => output.warning(&format!("{line}: {e}")),
                }
            }
        }
        output.separator();
        output.info("* effective default version");
        output.success(&format!("{} tenants OK", reports.len()));

        Ok(())
    }
}

fn build_reports(
    registry: &Registry,
    resolver: &VersionResolver,
    store: &dyn ContentStore,
) -> Vec<TenantReport> {
    registry
        .list_tenants()
        .iter()
        .map(|tenant| {
            let default_id = resolver
                .default_version(tenant)
                .map(|v| v.version_id.as_str());
            TenantReport {
                tenant_id: tenant.tenant_id.clone(),
                display_name: tenant.display_name.clone(),
                versions: tenant
                    .versions
                    .iter()
                    .map(|version| VersionReport {
                        version_id: version.version_id.clone(),
                        display_name: version.display_name.clone(),
                        storage_location: version.storage_location.clone(),
                        is_default: Some(version.version_id.as_str()) == default_id,
                        documents: store
                            .list_slugs(&version.storage_location)
                            .map(|slugs| slugs.len())
                            .map_err(|e| e.to_string()),
                    })
                    .collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use vdocs_registry::{DescriptorFormat, LexicographicOrdering};

    use super::*;

    const REGISTRY: &str = r"
tenants:
  - tenantId: acme
    displayName: ACME Corp
    versions:
      - { versionId: v1.9, storageLocation: acme/v1 }
      - { versionId: v1.10, storageLocation: acme/v2 }
";

    fn content() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("acme/v1/guide")).unwrap();
        fs::write(dir.path().join("acme/v1/guide/intro.md"), "# Intro").unwrap();
        fs::write(dir.path().join("acme/v1/index.md"), "# Home").unwrap();
        dir
    }

    #[test]
    fn test_reports_default_and_document_counts() {
        let dir = content();
        let registry = Registry::parse(REGISTRY, DescriptorFormat::Yaml).unwrap();
        let store = FsStore::new(dir.path().to_path_buf());

        let reports = build_reports(&registry, &VersionResolver::default(), &store);

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].display_name, "ACME Corp");
        let versions = &reports[0].versions;
        assert_eq!(versions[0].documents, Ok(2));
        assert!(!versions[0].is_default);
        // Missing location lists as empty
        assert_eq!(versions[1].documents, Ok(0));
        assert!(versions[1].is_default);
    }

    #[test]
    fn test_reports_follow_ordering() {
        let dir = content();
        let registry = Registry::parse(REGISTRY, DescriptorFormat::Yaml).unwrap();
        let store = FsStore::new(dir.path().to_path_buf());
        let resolver = VersionResolver::new(LexicographicOrdering);

        let reports = build_reports(&registry, &resolver, &store);

        // "v1.9" > "v1.10" as plain strings
        assert!(reports[0].versions[0].is_default);
        assert!(!reports[0].versions[1].is_default);
    }
}

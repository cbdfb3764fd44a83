//! Version resolution.
//!
//! Maps `(tenant, requested version)` onto a registered version. An explicit
//! request either matches exactly or fails; it is never substituted with a
//! default.

use std::sync::Arc;

use serde::Serialize;

use crate::ordering::{SemverOrdering, VersionOrdering};
use crate::registry::{Registry, Tenant, Version};

/// A concrete version chosen by the resolver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedVersion {
    /// Tenant id.
    pub tenant_id: String,
    /// Chosen version id.
    pub version_id: String,
    /// Storage location of the chosen version.
    pub storage_location: String,
    /// Whether the version was picked as the default (no explicit request).
    pub defaulted: bool,
}

/// Resolution error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Tenant is not registered.
    #[error("Tenant not found: {0}")]
    TenantNotFound(String),
    /// Explicitly requested version is not registered for the tenant.
    #[error("Version not found: {tenant_id}/{version_id}")]
    VersionNotFound {
        /// Tenant id.
        tenant_id: String,
        /// Requested version id.
        version_id: String,
    },
}

/// Resolves requested versions against a registry snapshot.
#[derive(Clone)]
pub struct VersionResolver {
    ordering: Arc<dyn VersionOrdering>,
}

impl Default for VersionResolver {
    fn default() -> Self {
        Self::new(SemverOrdering)
    }
}

impl std::fmt::Debug for VersionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionResolver").finish_non_exhaustive()
    }
}

impl VersionResolver {
    /// Create a resolver using the given ordering for default selection.
    #[must_use]
    pub fn new(ordering: impl VersionOrdering + 'static) -> Self {
        Self {
            ordering: Arc::new(ordering),
        }
    }

    /// Resolve a tenant and optional version.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::TenantNotFound`] for an unknown tenant and
    /// [`ResolveError::VersionNotFound`] for an explicit version that does
    /// not exist.
    pub fn resolve(
        &self,
        registry: &Registry,
        tenant_id: &str,
        requested: Option<&str>,
    ) -> Result<ResolvedVersion, ResolveError> {
        let tenant = registry
            .tenant(tenant_id)
            .ok_or_else(|| ResolveError::TenantNotFound(tenant_id.to_owned()))?;

        let (version, defaulted) = match requested {
            Some(version_id) => {
                let version =
                    tenant
                        .version(version_id)
                        .ok_or_else(|| ResolveError::VersionNotFound {
                            tenant_id: tenant_id.to_owned(),
                            version_id: version_id.to_owned(),
                        })?;
                (version, false)
            }
            None => {
                let version = self
                    .default_version(tenant)
                    .ok_or_else(|| ResolveError::TenantNotFound(tenant_id.to_owned()))?;
                (version, true)
            }
        };

        Ok(ResolvedVersion {
            tenant_id: tenant.tenant_id.clone(),
            version_id: version.version_id.clone(),
            storage_location: version.storage_location.clone(),
            defaulted,
        })
    }

    /// Effective default version of a tenant.
    ///
    /// The only version if there is one; else the version marked default;
    /// else the greatest version under the configured ordering. `None` only
    /// for a tenant without versions, which a validated registry never has.
    #[must_use]
    pub fn default_version<'a>(&self, tenant: &'a Tenant) -> Option<&'a Version> {
        match tenant.versions.as_slice() {
            [] => None,
            [only] => Some(only),
            versions => versions.iter().find(|v| v.is_default).or_else(|| {
                versions
                    .iter()
                    .max_by(|a, b| self.ordering.compare(&a.version_id, &b.version_id))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{DescriptorFormat, LexicographicOrdering};

    fn registry(yaml: &str) -> Registry {
        Registry::parse(yaml, DescriptorFormat::Yaml).unwrap()
    }

    fn acme() -> Registry {
        registry(
            r#"
tenants:
  - tenantId: acme
    versions:
      - { versionId: v1, storageLocation: acme/v1, isDefault: true }
      - { versionId: v2, storageLocation: acme/v2 }
"#,
        )
    }

    #[test]
    fn test_explicit_version_uses_its_own_location() {
        let resolved = VersionResolver::default()
            .resolve(&acme(), "acme", Some("v2"))
            .unwrap();

        assert_eq!(
            resolved,
            ResolvedVersion {
                tenant_id: "acme".to_owned(),
                version_id: "v2".to_owned(),
                storage_location: "acme/v2".to_owned(),
                defaulted: false,
            }
        );
    }

    #[test]
    fn test_marked_default_wins_over_greatest() {
        let resolved = VersionResolver::default()
            .resolve(&acme(), "acme", None)
            .unwrap();

        assert_eq!(resolved.version_id, "v1");
        assert_eq!(resolved.storage_location, "acme/v1");
        assert!(resolved.defaulted);
    }

    #[test]
    fn test_unknown_explicit_version_is_not_substituted() {
        let err = VersionResolver::default()
            .resolve(&acme(), "acme", Some("v9"))
            .unwrap_err();

        assert_eq!(
            err,
            ResolveError::VersionNotFound {
                tenant_id: "acme".to_owned(),
                version_id: "v9".to_owned(),
            }
        );
    }

    #[test]
    fn test_unknown_tenant() {
        let err = VersionResolver::default()
            .resolve(&acme(), "globex", None)
            .unwrap_err();

        assert_eq!(err, ResolveError::TenantNotFound("globex".to_owned()));
    }

    #[test]
    fn test_single_version_is_default() {
        let registry = registry(
            "tenants:\n  - tenantId: solo\n    versions:\n      - { versionId: legacy, storageLocation: solo }\n",
        );

        let resolved = VersionResolver::default()
            .resolve(&registry, "solo", None)
            .unwrap();

        assert_eq!(resolved.version_id, "legacy");
    }

    #[test]
    fn test_greatest_version_without_marker() {
        let registry = registry(
            r#"
tenants:
  - tenantId: acme
    versions:
      - { versionId: v9, storageLocation: acme/v9 }
      - { versionId: v10, storageLocation: acme/v10 }
      - { versionId: v2, storageLocation: acme/v2 }
"#,
        );

        let semver = VersionResolver::default()
            .resolve(&registry, "acme", None)
            .unwrap();
        let lexicographic = VersionResolver::new(LexicographicOrdering)
            .resolve(&registry, "acme", None)
            .unwrap();

        assert_eq!(semver.version_id, "v10");
        assert_eq!(lexicographic.version_id, "v9");
    }

    #[test]
    fn test_default_resolution_is_idempotent() {
        let registry = acme();
        let resolver = VersionResolver::default();

        let first = resolver.resolve(&registry, "acme", None).unwrap();
        let second = resolver.resolve(&registry, "acme", None).unwrap();

        assert_eq!(first, second);
    }
}

//! Registry descriptor parsing.
//!
//! A descriptor is a single document with a top-level `tenants` list. The
//! serialization format is picked from the file extension.

use std::path::Path;

use serde::Deserialize;

use crate::registry::Tenant;

/// Serialization format of a registry descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescriptorFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.toml`
    Toml,
    /// `.json`
    Json,
}

impl DescriptorFormat {
    /// Detect the format from a file extension (case-insensitive).
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Descriptor {
    #[serde(default)]
    tenants: Vec<Tenant>,
}

/// Parse descriptor content into its tenant entries.
///
/// Blank content is an empty registry. The entries are not validated.
pub(crate) fn parse(content: &str, format: DescriptorFormat) -> Result<Vec<Tenant>, String> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let descriptor: Descriptor = match format {
        DescriptorFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string())?,
        DescriptorFormat::Toml => toml::from_str(content).map_err(|e| e.to_string())?,
        DescriptorFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string())?,
    };

    Ok(descriptor.tenants)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            DescriptorFormat::from_path(Path::new("registry.yaml")),
            Some(DescriptorFormat::Yaml)
        );
        assert_eq!(
            DescriptorFormat::from_path(Path::new("conf/registry.YML")),
            Some(DescriptorFormat::Yaml)
        );
        assert_eq!(
            DescriptorFormat::from_path(Path::new("registry.toml")),
            Some(DescriptorFormat::Toml)
        );
        assert_eq!(
            DescriptorFormat::from_path(Path::new("registry.json")),
            Some(DescriptorFormat::Json)
        );
        assert_eq!(DescriptorFormat::from_path(Path::new("registry.txt")), None);
        assert_eq!(DescriptorFormat::from_path(Path::new("registry")), None);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
tenants:
  - tenantId: acme
    displayName: ACME Corp
    versions:
      - { versionId: v1, displayName: "1.x", storageLocation: acme/v1, isDefault: true }
      - { versionId: v2, storageLocation: acme/v2 }
"#;
        let tenants = parse(yaml, DescriptorFormat::Yaml).unwrap();

        assert_eq!(tenants.len(), 1);
        assert_eq!(tenants[0].tenant_id, "acme");
        assert_eq!(tenants[0].display_name, "ACME Corp");
        assert_eq!(tenants[0].versions.len(), 2);
        assert!(tenants[0].versions[0].is_default);
        assert_eq!(tenants[0].versions[1].storage_location, "acme/v2");
        assert!(!tenants[0].versions[1].is_default);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[[tenants]]
tenantId = "globex"
displayName = "Globex"

[[tenants.versions]]
versionId = "2024.1"
storageLocation = "globex/2024.1"
"#;
        let tenants = parse(toml, DescriptorFormat::Toml).unwrap();

        assert_eq!(tenants.len(), 1);
        assert_eq!(tenants[0].versions[0].version_id, "2024.1");
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{"tenants":[{"tenantId":"acme","versions":[{"versionId":"v1","storageLocation":"acme/v1"}]}]}"#;
        let tenants = parse(json, DescriptorFormat::Json).unwrap();

        assert_eq!(tenants[0].tenant_id, "acme");
        assert_eq!(tenants[0].display_name, "");
    }

    #[test]
    fn test_blank_content_is_empty_registry() {
        assert!(parse("", DescriptorFormat::Yaml).unwrap().is_empty());
        assert!(parse("  \n", DescriptorFormat::Toml).unwrap().is_empty());
        assert!(parse("tenants: []", DescriptorFormat::Yaml).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let yaml = "tenants:\n  - tenantId: acme\n    versions: []\n    colour: red\n";
        let err = parse(yaml, DescriptorFormat::Yaml).unwrap_err();

        assert!(err.contains("colour"), "unexpected error: {err}");
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let yaml = "tenants:\n  - tenantId: acme\n    versions:\n      - versionId: v1\n";

        assert!(parse(yaml, DescriptorFormat::Yaml).is_err());
    }
}

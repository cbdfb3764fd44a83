//! HTTP request handlers.

use serde::Deserialize;

pub(crate) mod content;
pub(crate) mod navigation;
pub(crate) mod search;
pub(crate) mod versions;

/// Query parameters shared by version-scoped endpoints.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct VersionQuery {
    /// Explicit version; the tenant's default is used when absent.
    pub(crate) version: Option<String>,
}

/// Treat an empty `version=` parameter like an absent one.
pub(crate) fn requested_version(version: Option<&str>) -> Option<&str> {
    version.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_version_query_parsing() {
        let query: VersionQuery = serde_urlencoded::from_str("version=v2").unwrap();
        assert_eq!(query.version.as_deref(), Some("v2"));

        let query: VersionQuery = serde_urlencoded::from_str("").unwrap();
        assert_eq!(query.version, None);
    }

    #[test]
    fn test_empty_version_means_default() {
        assert_eq!(requested_version(Some("")), None);
        assert_eq!(requested_version(Some("v1")), Some("v1"));
        assert_eq!(requested_version(None), None);
    }
}

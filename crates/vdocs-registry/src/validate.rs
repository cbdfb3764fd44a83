//! Whole-registry validation.
//!
//! Every rule is checked for every entry and all violations are returned
//! together, so a broken descriptor can be fixed in one pass.

use std::collections::HashSet;
use std::fmt;

use crate::registry::Tenant;

/// Maximum identifier length.
const MAX_ID_LEN: usize = 64;

/// A single validation failure, naming the offending tenant and version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Tenant the issue belongs to (as written, possibly malformed).
    pub tenant_id: String,
    /// Version the issue belongs to, if it is version-level.
    pub version_id: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    fn tenant(tenant_id: &str, message: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.to_owned(),
            version_id: None,
            message: message.into(),
        }
    }

    fn version(tenant_id: &str, version_id: &str, message: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.to_owned(),
            version_id: Some(version_id.to_owned()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version_id {
            Some(version_id) => write!(
                f,
                "tenant '{}' version '{}': {}",
                self.tenant_id, version_id, self.message
            ),
            None => write!(f, "tenant '{}': {}", self.tenant_id, self.message),
        }
    }
}

/// Check identifier syntax: 1-64 chars of `[A-Za-z0-9._-]`, starting alphanumeric.
pub(crate) fn is_valid_id(id: &str) -> bool {
    let mut chars = id.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    id.len() <= MAX_ID_LEN
        && first.is_ascii_alphanumeric()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Describe what is wrong with a storage location, if anything.
fn location_problem(location: &str) -> Option<&'static str> {
    if location.is_empty() {
        return Some("storage location is empty");
    }
    if location.trim() != location {
        return Some("storage location has surrounding whitespace");
    }
    if location.chars().any(char::is_control) {
        return Some("storage location contains control characters");
    }
    if location.split(['/', '\\']).any(|segment| segment == "..") {
        return Some("storage location contains a '..' segment");
    }
    None
}

/// Validate a full set of tenant entries.
pub(crate) fn validate(tenants: &[Tenant]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut seen_tenants = HashSet::new();

    for tenant in tenants {
        let tid = tenant.tenant_id.as_str();

        if !is_valid_id(tid) {
            issues.push(ValidationIssue::tenant(tid, "malformed tenant id"));
        }
        if !seen_tenants.insert(tid) {
            issues.push(ValidationIssue::tenant(tid, "duplicate tenant id"));
        }
        if tenant.versions.is_empty() {
            issues.push(ValidationIssue::tenant(tid, "tenant has no versions"));
        }

        let mut seen_versions = HashSet::new();
        let mut defaults = 0usize;
        for version in &tenant.versions {
            let vid = version.version_id.as_str();

            if !is_valid_id(vid) {
                issues.push(ValidationIssue::version(tid, vid, "malformed version id"));
            }
            if !seen_versions.insert(vid) {
                issues.push(ValidationIssue::version(tid, vid, "duplicate version id"));
            }
            if let Some(problem) = location_problem(&version.storage_location) {
                issues.push(ValidationIssue::version(tid, vid, problem));
            }
            if version.is_default {
                defaults += 1;
            }
        }

        if defaults > 1 {
            issues.push(ValidationIssue::tenant(
                tid,
                format!("{defaults} versions are marked as default, at most one is allowed"),
            ));
        }
    }

    issues
}

//! Directory metadata sidecar files.
//!
//! A directory may carry a YAML file (default: `meta.yaml`) that sets the
//! title and position of the directory's navigation node:
//!
//! ```yaml
//! title: Getting Started
//! order: 1
//! ```
//!
//! Unknown keys are ignored.

use serde::{Deserialize, Serialize};

/// Typed directory metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryMeta {
    /// Navigation title of the directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Explicit sort position among siblings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

impl DirectoryMeta {
    /// Parse metadata from YAML content.
    ///
    /// Empty content yields a default instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or a field has the wrong type.
    pub fn from_yaml(content: &str) -> Result<Self, MetadataError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let mut meta: Self = serde_yaml::from_str(trimmed)
            .map_err(|e| MetadataError::Parse(format!("Invalid YAML: {e}")))?;
        meta.title = meta.title.filter(|t| !t.trim().is_empty());
        Ok(meta)
    }

    /// Parse metadata, logging and ignoring malformed content.
    #[must_use]
    pub fn from_yaml_lenient(content: &str, dir: &str) -> Self {
        Self::from_yaml(content).unwrap_or_else(|e| {
            tracing::warn!(dir, error = %e, "Ignoring malformed directory metadata");
            Self::default()
        })
    }

    /// Check if metadata has any non-default values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.order.is_none()
    }
}

/// Error type for metadata operations.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// YAML parsing error.
    #[error("{0}")]
    Parse(String),
}

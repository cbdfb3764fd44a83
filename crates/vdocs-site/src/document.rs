//! Parsed documents.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::frontmatter::{self, Frontmatter, FrontmatterError, Scalar};

static H1_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+)$").unwrap());

/// A document resolved for a specific tenant and version.
///
/// Documents are immutable once loaded and shared as `Arc<Document>`
/// between the cache, navigation and search.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Tenant the document belongs to.
    pub tenant_id: String,
    /// Version the document belongs to.
    pub version_id: String,
    /// Slug within the version (`""` for the root document).
    pub slug: String,
    /// Validated frontmatter.
    pub frontmatter: Frontmatter,
    /// Content after the frontmatter block.
    pub body: String,
    /// Explicit navigation order from the `order` key.
    pub order_hint: Option<i64>,
    /// Display title.
    pub title: String,
}

impl Document {
    /// Parse raw stored content.
    ///
    /// The title is the frontmatter `title`, else the first level-1 heading
    /// of the body, else the title-cased last slug segment.
    pub fn parse(
        tenant_id: &str,
        version_id: &str,
        slug: &str,
        raw: &str,
    ) -> Result<Self, FrontmatterError> {
        let parsed = frontmatter::parse(raw)?;

        let title = parsed
            .frontmatter
            .get("title")
            .and_then(Scalar::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .or_else(|| extract_h1(parsed.body))
            .unwrap_or_else(|| title_from_slug(slug));

        Ok(Self {
            tenant_id: tenant_id.to_owned(),
            version_id: version_id.to_owned(),
            slug: slug.to_owned(),
            frontmatter: parsed.frontmatter,
            body: parsed.body.to_owned(),
            order_hint: parsed.order,
            title,
        })
    }
}

/// First level-1 ATX heading of a markdown body.
pub(crate) fn extract_h1(body: &str) -> Option<String> {
    H1_RE
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().trim_end_matches('#').trim_end().to_owned())
        .filter(|t| !t.is_empty())
}

/// Derive a title from the last segment of a slug.
///
/// Uses "Untitled" for the root slug.
#[must_use]
pub fn title_from_slug(slug: &str) -> String {
    match slug.rsplit_once('/').map_or(slug, |(_, last)| last) {
        "" => "Untitled".to_owned(),
        segment => titlecase(segment),
    }
}

/// Convert a slug segment (kebab-case or `snake_case`) to title case.
///
/// Replaces `-` and `_` with spaces, then capitalizes the first letter of each word.
fn titlecase(segment: &str) -> String {
    let mut result = String::with_capacity(segment.len());
    for word in segment.split(['-', '_', ' ']).filter(|w| !w.is_empty()) {
        if !result.is_empty() {
            result.push(' ');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            result.extend(first.to_uppercase());
            result.push_str(chars.as_str());
        }
    }
    result
}

//! Mapping between slugs and files inside a storage location.
//!
//! - `index.md` -> `""`
//! - `guide.md` -> `"guide"`
//! - `domain/index.md` -> `"domain"`
//! - `domain/setup.md` -> `"domain/setup"`
//! - `domain/meta.yaml` -> metadata of directory `"domain"`

use std::path::Path;

/// The role a file plays for the slug it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SourceKind {
    /// Markdown document.
    Content,
    /// Directory metadata sidecar.
    Metadata,
}

/// A recognized file, expressed as the slug it affects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SourceFile {
    /// Document slug, or directory slug for metadata.
    pub slug: String,
    /// What kind of source this is.
    pub kind: SourceKind,
}

impl SourceFile {
    /// Classify a path relative to the location root.
    ///
    /// Returns `None` for files that are neither markdown nor metadata, and
    /// for anything under a hidden or `_`-prefixed component.
    pub fn classify(rel_path: &Path, meta_filename: &str) -> Option<Self> {
        if rel_path.components().any(|c| is_excluded(&c.as_os_str().to_string_lossy())) {
            return None;
        }

        let filename = rel_path.file_name()?.to_string_lossy();
        if filename == meta_filename {
            Some(Self {
                slug: parent_slug(rel_path),
                kind: SourceKind::Metadata,
            })
        } else if rel_path.extension().is_some_and(|e| e == "md") {
            Some(Self {
                slug: file_path_to_slug(rel_path),
                kind: SourceKind::Content,
            })
        } else {
            None
        }
    }
}

/// Whether a path component is skipped (hidden or `_`-prefixed).
pub(crate) fn is_excluded(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('_')
}

/// Convert a markdown path relative to the location root into a slug.
pub(crate) fn file_path_to_slug(rel_path: &Path) -> String {
    let filename = rel_path
        .file_name()
        .map(|f| f.to_string_lossy())
        .unwrap_or_default();

    if filename == "index.md" {
        return parent_slug(rel_path);
    }

    let Some(stem) = rel_path.file_stem().map(|s| s.to_string_lossy()) else {
        return String::new();
    };
    match parent_slug(rel_path) {
        parent if parent.is_empty() => stem.into_owned(),
        parent => format!("{parent}/{stem}"),
    }
}

/// Slug of the directory containing `rel_path`, with `/` separators.
fn parent_slug(rel_path: &Path) -> String {
    rel_path
        .parent()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default()
}

/// Candidate files for a slug, most preferred first.
///
/// Only files that map back to `slug` qualify, so `guide/index` never
/// resolves to `guide/index.md` (the file of slug `guide`).
pub(crate) fn slug_candidates(slug: &str) -> Vec<String> {
    let candidates = if slug.is_empty() {
        vec!["index.md".to_owned()]
    } else {
        vec![format!("{slug}/index.md"), format!("{slug}.md")]
    };
    candidates
        .into_iter()
        .filter(|candidate| file_path_to_slug(Path::new(candidate)) == slug)
        .collect()
}

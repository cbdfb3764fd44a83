//! Document discovery by filesystem walking.
//!
//! The scanner only identifies which slugs exist in a location; reading and
//! interpreting content is left to the caller.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::source::{file_path_to_slug, is_excluded};

/// Walks a location directory and collects document slugs.
pub(crate) struct Scanner {
    root: PathBuf,
}

impl Scanner {
    /// Create a scanner rooted at a location directory.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Collect all slugs, sorted.
    ///
    /// A slug backed by both `x.md` and `x/index.md` is reported once.
    /// Unreadable subdirectories are skipped with a warning; failing to read
    /// the root itself is an error.
    pub fn scan(&self) -> io::Result<Vec<String>> {
        let mut slugs = BTreeSet::new();
        let entries = fs::read_dir(&self.root)?;
        self.scan_entries(entries, Path::new(""), &mut slugs);
        Ok(slugs.into_iter().collect())
    }

    fn scan_directory(&self, rel_dir: &Path, slugs: &mut BTreeSet<String>) {
        let dir = self.root.join(rel_dir);
        match fs::read_dir(&dir) {
            Ok(entries) => self.scan_entries(entries, rel_dir, slugs),
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "Skipping unreadable directory");
            }
        }
    }

    fn scan_entries(&self, entries: fs::ReadDir, rel_dir: &Path, slugs: &mut BTreeSet<String>) {
        for entry in entries.filter_map(Result::ok) {
            let name = entry.file_name();
            if is_excluded(&name.to_string_lossy()) {
                continue;
            }

            let rel_path = rel_dir.join(&name);
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            if is_dir {
                self.scan_directory(&rel_path, slugs);
            } else if rel_path.extension().is_some_and(|e| e == "md") {
                slugs.insert(file_path_to_slug(&rel_path));
            }
        }
    }
}

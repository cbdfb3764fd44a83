//! Per-slug debouncing of file changes.
//!
//! One save can touch several files that back the same slug (`guide.md`,
//! `guide/index.md`, `guide/meta.yaml`), and editors emit several raw events
//! per file. Changes are keyed by `(location, slug)` after classification, so
//! a burst on any of those files yields one [`StorageEvent`] once the slug has
//! been quiet for the debounce window.
//!
//! The emitted kind compares whether the slug had a document before the
//! burst with whether it has one after it:
//!
//! | before | after | emitted    |
//! |--------|-------|------------|
//! | no     | yes   | `Created`  |
//! | yes    | yes   | `Modified` |
//! | yes    | no    | `Removed`  |
//! | no     | no    | nothing    |
//!
//! Metadata changes alone do not say anything about the document and are
//! emitted as `Modified`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use vdocs_storage::{StorageEvent, StorageEventKind};

use crate::source::{SourceFile, SourceKind};

type SlugKey = (String, String);

/// Changes seen for one slug since its last emission.
struct PendingSlug {
    /// Whether the slug had a document before the first content change.
    had_document: Option<bool>,
    /// Whether it has one after the latest content change.
    has_document: Option<bool>,
    deadline: Instant,
}

impl PendingSlug {
    fn apply(&mut self, kind: StorageEventKind) {
        let (before, after) = match kind {
            StorageEventKind::Created => (false, true),
            StorageEventKind::Modified => (true, true),
            StorageEventKind::Removed => (true, false),
        };
        self.had_document.get_or_insert(before);
        self.has_document = Some(after);
    }

    /// Net effect of the burst, `None` if it cancelled out.
    fn kind(&self) -> Option<StorageEventKind> {
        match (self.had_document, self.has_document) {
            (Some(false), Some(false)) => None,
            (Some(false), Some(true)) => Some(StorageEventKind::Created),
            (Some(true), Some(false)) => Some(StorageEventKind::Removed),
            _ => Some(StorageEventKind::Modified),
        }
    }
}

/// Thread-safe debouncer keyed by `(location, slug)`.
pub(crate) struct SlugDebouncer {
    pending: Mutex<HashMap<SlugKey, PendingSlug>>,
    window: Duration,
}

impl SlugDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            window,
        }
    }

    /// Record a change to a classified file of `location`.
    ///
    /// Called from the notify callback thread. Every change pushes the
    /// slug's deadline back.
    pub fn record(&self, location: &str, source: &SourceFile, kind: StorageEventKind) {
        let deadline = Instant::now() + self.window;
        let mut pending = self.pending.lock();
        let entry = pending
            .entry((location.to_owned(), source.slug.clone()))
            .or_insert(PendingSlug {
                had_document: None,
                has_document: None,
                deadline,
            });
        entry.deadline = deadline;
        if source.kind == SourceKind::Content {
            entry.apply(kind);
        }
    }

    /// Take the slugs whose deadline has passed, sorted by location and slug.
    pub fn drain_ready(&self) -> Vec<StorageEvent> {
        let now = Instant::now();
        let mut ready: Vec<(SlugKey, PendingSlug)> = self
            .pending
            .lock()
            .extract_if(|_, slug| slug.deadline <= now)
            .collect();
        ready.sort_by(|(a, _), (b, _)| a.cmp(b));

        ready
            .into_iter()
            .filter_map(|((location, slug), pending)| {
                let kind = pending.kind()?;
                Some(StorageEvent {
                    location,
                    slug,
                    kind,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use pretty_assertions::assert_eq;

    use super::*;

    const WINDOW: Duration = Duration::from_millis(10);

    fn content(slug: &str) -> SourceFile {
        SourceFile {
            slug: slug.to_owned(),
            kind: SourceKind::Content,
        }
    }

    fn metadata(slug: &str) -> SourceFile {
        SourceFile {
            slug: slug.to_owned(),
            kind: SourceKind::Metadata,
        }
    }

    fn event(location: &str, slug: &str, kind: StorageEventKind) -> StorageEvent {
        StorageEvent {
            location: location.to_owned(),
            slug: slug.to_owned(),
            kind,
        }
    }

    fn settle(debouncer: &SlugDebouncer) -> Vec<StorageEvent> {
        thread::sleep(WINDOW + Duration::from_millis(5));
        debouncer.drain_ready()
    }

    #[test]
    fn test_emits_after_quiet_window() {
        let debouncer = SlugDebouncer::new(WINDOW);

        debouncer.record("acme/v1", &content("guide"), StorageEventKind::Modified);

        assert!(debouncer.drain_ready().is_empty());
        assert_eq!(
            settle(&debouncer),
            vec![event("acme/v1", "guide", StorageEventKind::Modified)]
        );
        assert!(debouncer.drain_ready().is_empty());
    }

    #[test]
    fn test_files_of_one_slug_collapse() {
        let debouncer = SlugDebouncer::new(WINDOW);

        // guide.md, guide/index.md and guide/meta.yaml all belong to "guide"
        debouncer.record("acme/v1", &content("guide"), StorageEventKind::Modified);
        debouncer.record("acme/v1", &content("guide"), StorageEventKind::Created);
        debouncer.record("acme/v1", &metadata("guide"), StorageEventKind::Modified);

        assert_eq!(
            settle(&debouncer),
            vec![event("acme/v1", "guide", StorageEventKind::Modified)]
        );
    }

    #[test]
    fn test_metadata_alone_is_modified() {
        let debouncer = SlugDebouncer::new(WINDOW);

        debouncer.record("acme/v1", &metadata(""), StorageEventKind::Created);

        assert_eq!(
            settle(&debouncer),
            vec![event("acme/v1", "", StorageEventKind::Modified)]
        );
    }

    #[test]
    fn test_net_effect_of_a_burst() {
        use StorageEventKind::{Created, Modified, Removed};

        let cases = [
            (vec![Created, Modified], Some(Created)),
            (vec![Modified, Modified], Some(Modified)),
            (vec![Modified, Removed], Some(Removed)),
            (vec![Removed, Created], Some(Modified)),
            (vec![Created, Removed], None),
            (vec![Removed, Created, Removed], Some(Removed)),
        ];

        for (changes, expected) in cases {
            let debouncer = SlugDebouncer::new(WINDOW);
            for kind in &changes {
                debouncer.record("acme/v1", &content("doc"), *kind);
            }

            let kinds: Vec<StorageEventKind> =
                settle(&debouncer).into_iter().map(|e| e.kind).collect();
            assert_eq!(kinds, expected.into_iter().collect::<Vec<_>>(), "{changes:?}");
        }
    }

    #[test]
    fn test_locations_are_independent_and_sorted() {
        let debouncer = SlugDebouncer::new(WINDOW);

        debouncer.record("globex/main", &content("guide"), StorageEventKind::Removed);
        debouncer.record("acme/v1", &content("guide"), StorageEventKind::Created);
        debouncer.record("acme/v1", &content("faq"), StorageEventKind::Modified);

        assert_eq!(
            settle(&debouncer),
            vec![
                event("acme/v1", "faq", StorageEventKind::Modified),
                event("acme/v1", "guide", StorageEventKind::Created),
                event("globex/main", "guide", StorageEventKind::Removed),
            ]
        );
    }

    #[test]
    fn test_new_change_extends_deadline() {
        let debouncer = SlugDebouncer::new(Duration::from_millis(30));

        debouncer.record("acme/v1", &content("guide"), StorageEventKind::Modified);
        thread::sleep(Duration::from_millis(20));
        debouncer.record("acme/v1", &metadata("guide"), StorageEventKind::Modified);
        thread::sleep(Duration::from_millis(20));

        assert!(debouncer.drain_ready().is_empty());
        thread::sleep(Duration::from_millis(20));
        assert_eq!(debouncer.drain_ready().len(), 1);
    }
}

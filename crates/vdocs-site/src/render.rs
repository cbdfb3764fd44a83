//! Markdown rendering.
//!
//! Rendering is a capability behind the [`Renderer`] trait. The bundled
//! [`HtmlRenderer`] uses pulldown-cmark and treats inline HTML tags with a
//! capitalized name (`<Callout>`, `</Tabs>`) as components: registered
//! components pass through unchanged, unknown ones are escaped and shown as
//! text.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use pulldown_cmark::{Event, Options, Parser, html};
use regex::Regex;

static COMPONENT_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?([A-Z][A-Za-z0-9]*)").unwrap());

/// Names of the components a renderer may pass through.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComponentRegistry {
    names: BTreeSet<String>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component name.
    pub fn register(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    /// Builder variant of [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>) -> Self {
        self.register(name);
        self
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Whether every component tag in an HTML fragment is registered.
    fn allows(&self, fragment: &str) -> bool {
        COMPONENT_TAG_RE
            .captures_iter(fragment)
            .filter_map(|caps| caps.get(1))
            .all(|name| self.contains(name.as_str()))
    }
}

/// Converts a document body into a presentation format.
pub trait Renderer: Send + Sync {
    /// Render `body`, passing through the components in `components`.
    fn render(&self, body: &str, components: &ComponentRegistry) -> String;
}

/// Markdown to HTML renderer.
#[derive(Clone, Copy, Debug)]
pub struct HtmlRenderer {
    gfm: bool,
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self { gfm: true }
    }
}

impl HtmlRenderer {
    /// Create a renderer with GitHub Flavored Markdown extensions enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable GFM extensions (tables, strikethrough, task lists).
    #[must_use]
    pub fn with_gfm(mut self, enabled: bool) -> Self {
        self.gfm = enabled;
        self
    }

    fn parser_options(self) -> Options {
        if self.gfm {
            Options::ENABLE_TABLES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS
                | Options::ENABLE_GFM
        } else {
            Options::empty()
        }
    }
}

impl Renderer for HtmlRenderer {
    fn render(&self, body: &str, components: &ComponentRegistry) -> String {
        let parser = Parser::new_ext(body, self.parser_options()).map(|event| match event {
            Event::Html(fragment) | Event::InlineHtml(fragment) if !components.allows(&fragment) => {
                Event::Text(fragment)
            }
            other => other,
        });

        let mut out = String::with_capacity(body.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }
}

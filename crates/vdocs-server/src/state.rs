//! Application state.
//!
//! Shared state for all request handlers.

use std::sync::Arc;

use vdocs_site::Engine;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Content resolution engine.
    pub(crate) engine: Arc<Engine>,
}

//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{content, navigation, search, versions};
use crate::middleware::security;
use crate::state::AppState;

/// Create the application router.
///
/// `/content/{tenant}/versions` takes precedence over a document whose slug
/// is `versions`.
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/content/{tenant_id}/", get(content::get_root_content))
        .route(
            "/content/{tenant_id}/versions",
            get(versions::list_versions),
        )
        .route("/content/{tenant_id}/{*slug}", get(content::get_content))
        .route("/navigation/{tenant_id}", get(navigation::get_navigation))
        .route("/search/{tenant_id}", get(search::search))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(security::csp_layer())
                .layer(security::content_type_options_layer())
                .layer(security::frame_options_layer())
                .layer(security::referrer_policy_layer()),
        )
        .with_state(state)
}

//! Versions API endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use vdocs_site::VersionListing;

use crate::error::ServerError;
use crate::state::AppState;

/// Handle GET /content/{tenant}/versions.
///
/// `isDefault` marks the version the resolver picks when none is requested,
/// which is not necessarily the one flagged in the descriptor.
pub(crate) async fn list_versions(
    Path(tenant_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<VersionListing>, ServerError> {
    Ok(Json(state.engine.list_versions(&tenant_id)?))
}

//! Search API endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use vdocs_site::SearchHit;

use crate::error::ServerError;
use crate::handlers::requested_version;
use crate::state::AppState;

/// Query parameters for GET /search/{tenant}.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchQuery {
    version: Option<String>,
    #[serde(default)]
    q: String,
    limit: Option<usize>,
}

/// Response for GET /search/{tenant}.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchResponse {
    tenant_id: String,
    version_id: String,
    query: String,
    hits: Vec<SearchHit>,
}

/// Handle GET /search/{tenant}.
///
/// Hits never leave the resolved (tenant, version).
pub(crate) async fn search(
    Path(tenant_id): Path<String>,
    Query(query): Query<SearchQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<SearchResponse>, ServerError> {
    let (resolved, hits) = state
        .engine
        .search(
            &tenant_id,
            requested_version(query.version.as_deref()),
            &query.q,
            query.limit,
        )
        .await?;

    Ok(Json(SearchResponse {
        tenant_id: resolved.tenant_id,
        version_id: resolved.version_id,
        query: query.q,
        hits,
    }))
}

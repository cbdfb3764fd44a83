//! Content API endpoint.
//!
//! Returns a single document as JSON, optionally with rendered HTML.
//! Responses carry an `ETag` and honour `If-None-Match`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use vdocs_site::Frontmatter;

use crate::error::ServerError;
use crate::handlers::requested_version;
use crate::state::AppState;

/// Requested representation of the document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Format {
    /// Raw markdown body only.
    #[default]
    Markdown,
    /// Raw body plus rendered HTML.
    Html,
}

/// Query parameters for GET /content/{tenant}/{slug}.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ContentQuery {
    version: Option<String>,
    #[serde(default)]
    format: Format,
}

/// Response for GET /content/{tenant}/{slug}.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentResponse<'a> {
    tenant_id: &'a str,
    version_id: &'a str,
    slug: &'a str,
    title: &'a str,
    frontmatter: &'a Frontmatter,
    body: &'a str,
    order_hint: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<String>,
}

/// Handle GET /content/{tenant}/ (root document).
pub(crate) async fn get_root_content(
    Path(tenant_id): Path<String>,
    Query(query): Query<ContentQuery>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    get_content_impl(&state, &tenant_id, "", &query, &headers).await
}

/// Handle GET /content/{tenant}/{*slug}.
pub(crate) async fn get_content(
    Path((tenant_id, slug)): Path<(String, String)>,
    Query(query): Query<ContentQuery>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    get_content_impl(&state, &tenant_id, &slug, &query, &headers).await
}

async fn get_content_impl(
    state: &AppState,
    tenant_id: &str,
    slug: &str,
    query: &ContentQuery,
    headers: &HeaderMap,
) -> Result<Response, ServerError> {
    let (resolved, doc) = state
        .engine
        .get_document(tenant_id, requested_version(query.version.as_deref()), slug)
        .await?;

    let html = match query.format {
        Format::Html => Some(state.engine.render_html(&doc)),
        Format::Markdown => None,
    };
    let body = serde_json::to_vec(&ContentResponse {
        tenant_id: &resolved.tenant_id,
        version_id: &resolved.version_id,
        slug: &doc.slug,
        title: &doc.title,
        frontmatter: &doc.frontmatter,
        body: &doc.body,
        order_hint: doc.order_hint,
        html,
    })?;

    let etag = compute_etag(&body);
    if if_none_match(headers, &etag) {
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
    }

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            ),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("private, max-age=60"),
            ),
        ],
        [(header::ETAG, etag)],
        body,
    )
        .into_response())
}

/// Compute `ETag` from the serialized response.
///
/// Uses MD5 truncated to 64 bits (16 hex chars).
fn compute_etag(body: &[u8]) -> String {
    let hash = Md5::digest(body);
    format!("\"{}\"", &hex::encode(hash)[..16])
}

/// Whether `If-None-Match` names `etag` (or is `*`).
fn if_none_match(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|candidate| candidate.trim().trim_start_matches("W/"))
        .any(|candidate| candidate == "*" || candidate == etag)
}

//! Navigation API endpoint.
//!
//! Returns the navigation tree of one tenant version.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Serialize;
use vdocs_site::NavigationNode;

use crate::error::ServerError;
use crate::handlers::{VersionQuery, requested_version};
use crate::state::AppState;

/// Response for GET /navigation/{tenant}.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NavigationResponse {
    tenant_id: String,
    version_id: String,
    root: Arc<NavigationNode>,
}

/// Handle GET /navigation/{tenant}.
pub(crate) async fn get_navigation(
    Path(tenant_id): Path<String>,
    Query(query): Query<VersionQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<NavigationResponse>, ServerError> {
    let (resolved, root) = state
        .engine
        .get_navigation(&tenant_id, requested_version(query.version.as_deref()))
        .await?;

    Ok(Json(NavigationResponse {
        tenant_id: resolved.tenant_id,
        version_id: resolved.version_id,
        root,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_response_serialization() {
        let response = NavigationResponse {
            tenant_id: "acme".to_owned(),
            version_id: "v1".to_owned(),
            root: Arc::new(NavigationNode {
                slug: None,
                title: "1.x".to_owned(),
                order: None,
                children: vec![NavigationNode {
                    slug: Some("guide".to_owned()),
                    title: "Guide".to_owned(),
                    order: Some(1),
                    children: Vec::new(),
                }],
            }),
        };

        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["tenantId"], "acme");
        assert_eq!(json["versionId"], "v1");
        assert_eq!(json["root"]["title"], "1.x");
        assert_eq!(json["root"]["children"][0]["slug"], "guide");
        assert_eq!(json["root"]["children"][0]["order"], 1);
    }
}

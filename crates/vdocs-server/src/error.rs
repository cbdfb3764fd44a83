//! HTTP error mapping.
//!
//! Every engine failure maps to a stable error code and status. The body is
//! always `{"error": CODE, "message": text}`.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use vdocs_registry::ResolveError;
use vdocs_site::{EngineError, LoadError, NavigationError, SearchError};

/// Seconds a client should wait before retrying after a storage outage.
const RETRY_AFTER_SECS: &str = "5";

/// Stable error code carried in error bodies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    TenantNotFound,
    VersionNotFound,
    SlugNotFound,
    InvalidSlug,
    ParseError,
    StorageUnavailable,
    Internal,
}

impl ErrorCode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::TenantNotFound => "TENANT_NOT_FOUND",
            Self::VersionNotFound => "VERSION_NOT_FOUND",
            Self::SlugNotFound => "SLUG_NOT_FOUND",
            Self::InvalidSlug => "INVALID_SLUG",
            Self::ParseError => "PARSE_ERROR",
            Self::StorageUnavailable => "STORAGE_UNAVAILABLE",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    pub(crate) fn status(self) -> StatusCode {
        match self {
            Self::TenantNotFound | Self::SlugNotFound => StatusCode::NOT_FOUND,
            Self::VersionNotFound | Self::InvalidSlug => StatusCode::BAD_REQUEST,
            Self::ParseError | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Error returned by request handlers.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ServerError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<ResolveError> for ServerError {
    fn from(err: ResolveError) -> Self {
        Self::Engine(EngineError::Resolve(err))
    }
}

impl ServerError {
    pub(crate) fn code(&self) -> ErrorCode {
        let Self::Engine(err) = self else {
            return ErrorCode::Internal;
        };
        match err {
            EngineError::Resolve(ResolveError::TenantNotFound(_)) => ErrorCode::TenantNotFound,
            EngineError::Resolve(ResolveError::VersionNotFound { .. }) => {
                ErrorCode::VersionNotFound
            }
            EngineError::Load(LoadError::SlugNotFound { .. }) => ErrorCode::SlugNotFound,
            EngineError::Load(LoadError::InvalidSlug { .. }) => ErrorCode::InvalidSlug,
            EngineError::Load(LoadError::Parse { .. }) => ErrorCode::ParseError,
            EngineError::Load(LoadError::StorageUnavailable { .. })
            | EngineError::Navigation(NavigationError::StorageUnavailable { .. })
            | EngineError::Search(SearchError::StorageUnavailable { .. }) => {
                ErrorCode::StorageUnavailable
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let code = self.code();
        match code {
            ErrorCode::StorageUnavailable | ErrorCode::Internal => {
                tracing::error!(code = code.as_str(), error = %self, "Request failed");
            }
            ErrorCode::ParseError => {
                tracing::warn!(code = code.as_str(), error = %self, "Request failed");
            }
            _ => tracing::debug!(code = code.as_str(), error = %self, "Request rejected"),
        }

        let body = Json(ErrorBody {
            error: code.as_str(),
            message: self.to_string(),
        });
        let mut response = (code.status(), body).into_response();
        if code == ErrorCode::StorageUnavailable {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from_static(RETRY_AFTER_SECS),
            );
        }
        response
    }
}

//! # Query Errors and Warnings
//!
//! Two very different failure channels:
//!
//! - [`QueryError`] aborts the call. Malformed filter semantics (an unknown
//!   operator, a value the operator cannot use) are reported at clause-build
//!   time, before anything reaches the database. Storage failures are passed
//!   through unchanged.
//! - [`QueryWarning`] does not. References to relations or fields that the
//!   schema does not declare are dropped from the query and reported next to
//!   the page, so a request with a stale `includes=` still gets results.
//!
//! Over HTTP, filter errors become `400 Bad Request` with their message;
//! storage errors become a generic `500` and the details are only logged.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;

/// Fatal errors of a paginate call.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidFilterValue { field: String, reason: String },

    /// A single-record lookup named a path the schema does not declare.
    #[error("unknown lookup field: {0}")]
    UnknownLookupField(String),

    #[error(transparent)]
    Storage(#[from] DbErr),
}

impl QueryError {
    pub(crate) fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFilterValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedOperator(_) | Self::InvalidFilterValue { .. } | Self::UnknownLookupField(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::Storage(_) => "A database error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

/// Part of the request a warning was raised for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningOrigin {
    Include,
    TextSearch,
    Where,
    GlobalSearch,
    Filter,
    Sort,
}

/// Non-fatal problems found while composing a query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum QueryWarning {
    /// A segment of `path` is not a relation declared on the schema reached so far.
    InvalidRelationPath {
        path: String,
        segment: String,
        origin: WarningOrigin,
    },
    /// The relation part of `path` resolved but its last segment is not a field.
    UnknownField { path: String, origin: WarningOrigin },
    /// The requested sort column could not be resolved; `applied` was used instead.
    SortFallback { requested: String, applied: String },
}

impl QueryWarning {
    /// Emits the warning as a `tracing` event.
    pub(crate) fn log(&self) {
        match self {
            Self::InvalidRelationPath { path, segment, origin } => {
                tracing::warn!(path = %path, segment = %segment, origin = ?origin, "Invalid relation path ignored");
            }
            Self::UnknownField { path, origin } => {
                tracing::warn!(path = %path, origin = ?origin, "Unknown field ignored");
            }
            Self::SortFallback { requested, applied } => {
                tracing::warn!(requested = %requested, applied = %applied, "Sort column not resolvable, using fallback");
            }
        }
    }
}

/// Error body sent to clients.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        match &self {
            Self::Storage(internal) => {
                tracing::error!(error = ?internal, "Database error occurred");
            }
            other => {
                tracing::debug!(error = %other, "Rejected query");
            }
        }

        let body = ErrorResponse {
            error: self.user_message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_errors_are_bad_requests() {
        let err = QueryError::UnsupportedOperator("regex".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.user_message(), "unsupported operator: regex");

        let err = QueryError::invalid_value("age", "between requires exactly two values");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.user_message().contains("between requires exactly two values"));

        let err = QueryError::UnknownLookupField("emial".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.user_message(), "unknown lookup field: emial");
    }

    #[test]
    fn test_storage_errors_are_sanitized() {
        let err = QueryError::from(DbErr::Custom("password=hunter2 at 10.0.0.4".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.user_message().contains("hunter2"));
        // the wrapped error is still reachable for callers
        assert!(err.to_string().contains("hunter2"));
    }

    #[test]
    fn test_warning_serializes_with_kind_tag() {
        let warning = QueryWarning::InvalidRelationPath {
            path: "departmnt".to_string(),
            segment: "departmnt".to_string(),
            origin: WarningOrigin::Include,
        };
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "invalidRelationPath");
        assert_eq!(json["origin"], "include");
    }

    #[tokio::test]
    async fn test_into_response_status() {
        let response = QueryError::UnsupportedOperator("regex".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = QueryError::Storage(DbErr::Custom("boom".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

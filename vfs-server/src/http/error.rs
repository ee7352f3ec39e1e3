//! API error types with IntoResponse
//!
//! Every failure becomes `{"error": <kind>, "detail": <message>}`.
//! Internal and pool failures are logged; their text stays server-side.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::db::{DbError, ErrorKind};
use crate::models::ValidationError;

/// Detail returned for every name clash.
pub const CONFLICT_DETAIL: &str = "Resource name already exists";

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Request failed schema validation (422)
    Validation(ValidationError),

    /// Entity absent or hidden from this owner (404)
    NotFound { resource: &'static str, id: String },

    /// Failure reported by the database layer, status by kind
    Database(DbError),

    /// Internal error (500)
    Internal { message: String },
}

impl ApiError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Database(e) => match e {
                DbError::PoolExhausted { .. } | DbError::PoolClosed => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                _ => match e.kind() {
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Conflict => StatusCode::CONFLICT,
                    ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
                    ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                },
            },
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error, detail) = match &self {
            Self::Validation(e) => ("validation_error", e.to_string()),
            Self::NotFound { resource, id } => {
                ("not_found", format!("{} '{}' not found", resource, id))
            }
            Self::Database(e) if status == StatusCode::SERVICE_UNAVAILABLE => {
                tracing::error!(error = %e, "database unavailable");
                ("service_unavailable", "database temporarily unavailable".to_string())
            }
            Self::Database(e) => match e.kind() {
                ErrorKind::Conflict => ("conflict", CONFLICT_DETAIL.to_string()),
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    (e.kind().as_str(), e.to_string())
                }
                ErrorKind::Internal => {
                    // Log the actual error, return generic message
                    tracing::error!(error = %e, "database error");
                    ("internal_error", "an internal error occurred".to_string())
                }
            },
            Self::Internal { message } => {
                tracing::error!("Internal error: {}", message);
                ("internal_error", "an internal error occurred".to_string())
            }
        };

        (status, Json(json!({ "error": error, "detail": detail }))).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        Self::Database(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_error_is_422() {
        let err = ApiError::Validation(ValidationError::Empty { field: "name" });
        let (status, json) = body(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn conflict_detail_is_fixed() {
        let err = ApiError::from(DbError::query(None, "Directory 'Docs' already exists"));
        let (status, json) = body(err).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["detail"], CONFLICT_DETAIL);
    }

    #[tokio::test]
    async fn not_found_carries_database_message() {
        let err = ApiError::from(DbError::query(None, "Directory not found or access denied"));
        let (status, json) = body(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["detail"], "Directory not found or access denied");
    }

    #[tokio::test]
    async fn permission_denied_is_403() {
        let err = ApiError::from(DbError::query(Some("42501"), "no write access"));
        assert_eq!(body(err).await.0, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn internal_text_is_withheld() {
        let err = ApiError::from(DbError::query(None, "relation \"dirs\" does not exist"));
        let (status, json) = body(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!json["detail"].as_str().unwrap().contains("dirs"));
    }

    #[tokio::test]
    async fn pool_exhaustion_is_503() {
        let err = ApiError::from(DbError::PoolExhausted {
            attempts: 3,
            reason: "timed out".into(),
        });
        let (status, json) = body(err).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(json["detail"].is_string());
    }
}

//! Shared error handling utilities.
//!
//! Errors surface as the uniform `{success: false, status, message}` envelope.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::DbPool;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    #[schema(example = false)]
    pub success: bool,
    #[schema(example = 404)]
    pub status: u16,
    #[schema(example = "Role not found")]
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                success: false,
                status: status.as_u16(),
                message: message.into(),
            }),
        )
    }

    pub fn bad_request(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn locked(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        Self::new(StatusCode::LOCKED, message)
    }

    pub fn internal(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn db_error() -> (StatusCode, Json<Self>) {
        Self::internal("Database error")
    }
}

pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub fn get_db_conn(
    pool: &DbPool,
) -> Result<
    diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<diesel::PgConnection>>,
    (StatusCode, Json<ApiError>),
> {
    pool.get().map_err(|e| {
        error!(error = %e, "Database connection error");
        ApiError::internal("Database connection error")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_shape() {
        let (status, Json(body)) = ApiError::not_found("Role not found");
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!body.success);
        assert_eq!(body.status, 404);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["status"], 404);
        assert_eq!(json["message"], "Role not found");
    }

    #[test]
    fn test_db_error_is_internal() {
        let (status, Json(body)) = ApiError::db_error();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.status, 500);
    }
}

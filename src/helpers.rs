//! Shared helper functions for handlers.

use axum::{http::StatusCode, Json};
use uuid::Uuid;

use crate::auth::jwt::Claims;
use crate::error::ApiError;

pub fn current_user_id(claims: &Claims) -> Result<Uuid, (StatusCode, Json<ApiError>)> {
    Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::unauthorized("Invalid token subject"))
}

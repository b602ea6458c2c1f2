//! JWT authentication middleware.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::AppState;

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"success": false, "status": 401, "message": message})),
    )
        .into_response()
}

/// Validates the bearer token and stores claims in request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| unauthorized("Missing authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("Invalid authorization header format"))?;

    let claims = state
        .jwt_keys
        .verify_access_token(token)
        .map_err(|_| unauthorized("Invalid or expired token"))?;

    let token_hash = hash_token(token);
    if state.token_revocation.is_token_revoked(&token_hash).await {
        return Err(unauthorized("Token has been revoked"));
    }

    if let Ok(user_id) = Uuid::parse_str(&claims.sub) {
        if state
            .token_revocation
            .is_user_token_revoked(user_id, claims.iat)
            .await
        {
            return Err(unauthorized("Token has been revoked"));
        }
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_is_stable_hex() {
        let a = hash_token("token");
        let b = hash_token("token");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(hash_token("other"), a);
    }
}

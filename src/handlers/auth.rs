//! Authentication handlers.

use axum::{
    extract::State,
    http::{header, HeaderMap},
    Extension, Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{
        jwt::{Claims, JwtKeys},
        password,
    },
    error::{get_db_conn, ApiError, ApiResult},
    helpers::current_user_id,
    middleware::auth::hash_token,
    models::{NewRefreshToken, NewUser, User},
    response::Envelope,
    schema::{locations, refresh_tokens, roles, users},
    telemetry::{record_auth_attempt, AuthOutcome},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 120, message = "Full name must be 2-120 characters"))]
    #[schema(example = "Ramesh Patel")]
    pub full_name: String,
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "sevak@example.com")]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "securepassword123", min_length = 8)]
    pub password: String,
    #[schema(example = "+91 9876543210")]
    pub phone: Option<String>,
    pub role_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "sevak@example.com")]
    pub email: String,
    #[schema(example = "securepassword123")]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthData {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    #[schema(example = "Ramesh Patel")]
    pub full_name: String,
    #[schema(example = "sevak@example.com")]
    pub email: String,
    pub phone: Option<String>,
    pub role_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: chrono::NaiveDateTime,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name,
            email: user.email,
            phone: user.phone,
            role_id: user.role_id,
            location_id: user.location_id,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentUserData {
    pub user: UserResponse,
    #[schema(example = "coordinator")]
    pub role_name: Option<String>,
    #[schema(example = "Akshar Hall")]
    pub location_name: Option<String>,
}

fn store_refresh_token(
    conn: &mut PgConnection,
    user_id: Uuid,
    token: &str,
    expires_in_secs: i64,
) -> Result<(), diesel::result::Error> {
    let token_hash = hash_token(token);
    let expires_at = (Utc::now() + chrono::Duration::seconds(expires_in_secs)).naive_utc();

    diesel::insert_into(refresh_tokens::table)
        .values(&NewRefreshToken {
            user_id,
            token_hash,
            expires_at,
        })
        .execute(conn)?;

    Ok(())
}

fn verify_stored_token(conn: &mut PgConnection, token: &str) -> Result<Uuid, &'static str> {
    let token_hash = hash_token(token);
    let now = Utc::now().naive_utc();

    let result: Result<(Uuid, chrono::NaiveDateTime), _> = refresh_tokens::table
        .filter(refresh_tokens::token_hash.eq(&token_hash))
        .select((refresh_tokens::user_id, refresh_tokens::expires_at))
        .first(conn);

    match result {
        Ok((user_id, expires_at)) => {
            if expires_at < now {
                let _ = diesel::delete(
                    refresh_tokens::table.filter(refresh_tokens::token_hash.eq(&token_hash)),
                )
                .execute(conn);
                Err("Refresh token has expired")
            } else {
                Ok(user_id)
            }
        }
        Err(_) => Err("Invalid refresh token"),
    }
}

fn invalidate_stored_token(
    conn: &mut PgConnection,
    token: &str,
) -> Result<(), diesel::result::Error> {
    let token_hash = hash_token(token);
    diesel::delete(refresh_tokens::table.filter(refresh_tokens::token_hash.eq(&token_hash)))
        .execute(conn)?;
    Ok(())
}

fn cleanup_expired_tokens(conn: &mut PgConnection, user_id: Uuid) {
    let now = Utc::now().naive_utc();
    let result = diesel::delete(
        refresh_tokens::table
            .filter(refresh_tokens::user_id.eq(user_id))
            .filter(refresh_tokens::expires_at.lt(now)),
    )
    .execute(conn);

    if let Ok(count) = result {
        if count > 0 {
            info!(user_id = %user_id, deleted_count = count, "Cleaned up expired refresh tokens");
        }
    }
}

fn generate_tokens(
    jwt_keys: &Arc<JwtKeys>,
    conn: &mut PgConnection,
    user: &User,
) -> ApiResult<(String, String)> {
    let access_token = jwt_keys
        .generate_access_token(user.id, &user.email, user.role_id)
        .map_err(|e| {
            error!(error = %e, "Token generation failed");
            ApiError::internal("Token generation failed")
        })?;

    let refresh_token = jwt_keys.generate_refresh_token(user.id).map_err(|e| {
        error!(error = %e, "Token generation failed");
        ApiError::internal("Token generation failed")
    })?;

    store_refresh_token(conn, user.id, &refresh_token, jwt_keys.refresh_token_expiry).map_err(
        |e| {
            error!(error = %e, "Failed to store refresh token");
            ApiError::internal("Token storage failed")
        },
    )?;

    Ok((access_token, refresh_token))
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registration successful", body = Envelope<AuthData>),
        (status = 400, description = "Validation error", body = crate::error::ApiError),
        (status = 409, description = "User already exists", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<Json<Envelope<AuthData>>> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(format!("Validation error: {}", e)));
    }

    if let Err(e) = state.password_policy.validate(&payload.password) {
        return Err(ApiError::bad_request(e.to_string()));
    }

    let password_hash =
        password::hash_password(&payload.password, state.password_hash_cost).map_err(|e| {
            error!(error = %e, "Password hashing failed");
            ApiError::internal("Failed to process password")
        })?;

    let new_user = NewUser {
        full_name: payload.full_name,
        email: payload.email.to_lowercase(),
        password_hash,
        phone: payload.phone,
        role_id: payload.role_id,
        location_id: payload.location_id,
    };

    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = diesel::insert_into(users::table)
        .values(&new_user)
        .get_result(&mut conn)
        .map_err(|e| {
            warn!(error = %e, email = %new_user.email, "Failed to register user");
            ApiError::conflict("User with this email already exists")
        })?;

    let (access_token, refresh_token) = generate_tokens(&state.jwt_keys, &mut conn, &user)?;

    info!(user_id = %user.id, email = %user.email, "User registered");

    Ok(Envelope::ok(AuthData {
        user: user.into(),
        access_token,
        refresh_token,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = Envelope<AuthData>),
        (status = 400, description = "Validation error", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 423, description = "Account locked", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<Envelope<AuthData>>> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(format!("Validation error: {}", e)));
    }

    if state.lockout.is_locked(&payload.email).await {
        let remaining = state
            .lockout
            .lockout_remaining_secs(&payload.email)
            .await
            .unwrap_or(0);
        warn!(email = %payload.email, "Login attempt for locked account");
        record_auth_attempt("login", AuthOutcome::AccountLocked);
        return Err(ApiError::locked(format!(
            "Account is locked. Try again in {} seconds",
            remaining
        )));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = users::table
        .filter(users::email.eq(payload.email.to_lowercase()))
        .select(User::as_select())
        .first(&mut conn)
        .map_err(|_| {
            warn!(email = %payload.email, "Login attempt for non-existent user");
            ApiError::unauthorized("Invalid credentials")
        })?;

    if !user.is_active {
        warn!(user_id = %user.id, "Login attempt for inactive user");
        record_auth_attempt("login", AuthOutcome::AccountInactive);
        return Err(ApiError::forbidden("Account is inactive"));
    }

    let is_valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|e| {
            error!(error = %e, "Password verification error");
            ApiError::internal("Password verification error")
        })?;

    if !is_valid {
        warn!(user_id = %user.id, "Failed login attempt - invalid password");
        record_auth_attempt("login", AuthOutcome::InvalidCredentials);
        let _ = state.lockout.record_failed_attempt(&payload.email).await;
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let _ = state.lockout.clear_failed_attempts(&payload.email).await;

    cleanup_expired_tokens(&mut conn, user.id);

    let (access_token, refresh_token) = generate_tokens(&state.jwt_keys, &mut conn, &user)?;

    record_auth_attempt("login", AuthOutcome::Success);
    info!(user_id = %user.id, "User logged in");

    Ok(Envelope::ok(AuthData {
        user: user.into(),
        access_token,
        refresh_token,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "Authentication",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed", body = Envelope<TokenPair>),
        (status = 401, description = "Invalid refresh token", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<Json<Envelope<TokenPair>>> {
    state
        .jwt_keys
        .verify_refresh_token(&payload.refresh_token)
        .map_err(|_| ApiError::unauthorized("Invalid refresh token"))?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let user_id = verify_stored_token(&mut conn, &payload.refresh_token)
        .map_err(ApiError::unauthorized)?;

    let user: User = users::table
        .filter(users::id.eq(user_id))
        .select(User::as_select())
        .first(&mut conn)
        .map_err(|_| ApiError::unauthorized("User no longer exists"))?;

    if !user.is_active {
        return Err(ApiError::forbidden("Account is inactive"));
    }

    // Rotate: the presented token is single-use.
    invalidate_stored_token(&mut conn, &payload.refresh_token).map_err(|e| {
        error!(error = %e, "Failed to invalidate refresh token");
        ApiError::internal("Token rotation failed")
    })?;

    let (access_token, refresh_token) = generate_tokens(&state.jwt_keys, &mut conn, &user)?;

    Ok(Envelope::ok(TokenPair {
        access_token,
        refresh_token,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Authentication",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Logged out", body = crate::response::MessageEnvelope),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    let user_id = current_user_id(&claims)?;
    let mut conn = get_db_conn(&state.db_pool)?;

    invalidate_stored_token(&mut conn, &payload.refresh_token).map_err(|e| {
        error!(error = %e, "Failed to invalidate refresh token");
        ApiError::internal("Logout failed")
    })?;

    // Revoke the presenting access token for the rest of its lifetime.
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        let remaining = (claims.exp - Utc::now().timestamp()).max(1) as u64;
        let _ = state
            .token_revocation
            .revoke_token(&hash_token(token), remaining)
            .await;
    }

    info!(user_id = %user_id, "User logged out");
    Ok(Envelope::message("Logged out"))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Authentication",
    responses(
        (status = 200, description = "Current user", body = Envelope<CurrentUserData>),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Envelope<CurrentUserData>>> {
    let user_id = current_user_id(&claims)?;
    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = users::table
        .filter(users::id.eq(user_id))
        .select(User::as_select())
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("User not found"))?;

    let role_name: Option<String> = match user.role_id {
        Some(role_id) => roles::table
            .filter(roles::id.eq(role_id))
            .select(roles::name)
            .first(&mut conn)
            .optional()
            .map_err(|_| ApiError::db_error())?,
        None => None,
    };

    let location_name: Option<String> = match user.location_id {
        Some(location_id) => locations::table
            .filter(locations::id.eq(location_id))
            .select(locations::name)
            .first(&mut conn)
            .optional()
            .map_err(|_| ApiError::db_error())?,
        None => None,
    };

    Ok(Envelope::ok(CurrentUserData {
        user: user.into(),
        role_name,
        location_name,
    }))
}

#[utoipa::path(
    get,
    path = "/auth/permissions",
    tag = "Authentication",
    responses(
        (status = 200, description = "Permission matrix for the current user's role", body = Envelope<Vec<crate::authz::ActivityPermissions>>),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_own_permissions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Envelope<Vec<crate::authz::ActivityPermissions>>>> {
    let user_id = current_user_id(&claims)?;
    let mut conn = get_db_conn(&state.db_pool)?;

    let role_id: Option<Uuid> = users::table
        .filter(users::id.eq(user_id))
        .select(users::role_id)
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("User not found"))?;

    let permissions = match role_id {
        Some(role_id) => crate::authz::resolve_role_permissions(&mut conn, role_id)
            .map_err(|_| ApiError::db_error())?,
        None => Vec::new(),
    };

    Ok(Envelope::ok(permissions))
}

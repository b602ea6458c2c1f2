//! Sevak (user) administration handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::password,
    error::{get_db_conn, ApiError, ApiResult},
    models::{NewUser, User},
    pagination::ListParams,
    response::{Envelope, Paginated},
    schema::{locations, roles, users},
    AppState,
};

use super::auth::UserResponse;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 2, max = 120, message = "Full name must be 2-120 characters"))]
    pub full_name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub phone: Option<String>,
    pub role_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, AsChangeset, ToSchema)]
#[diesel(table_name = crate::schema::users)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserFilter {
    /// Restrict to active or inactive sevaks.
    pub is_active: Option<bool>,
    /// Restrict to one role.
    pub role_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListItem {
    #[serde(flatten)]
    pub user: UserResponse,
    #[schema(example = "coordinator")]
    pub role_name: Option<String>,
    #[schema(example = "Akshar Hall")]
    pub location_name: Option<String>,
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Sevak created", body = Envelope<UserResponse>),
        (status = 400, description = "Validation error", body = crate::error::ApiError),
        (status = 409, description = "Email already registered", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<(axum::http::StatusCode, Json<Envelope<UserResponse>>)> {
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

    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = diesel::insert_into(users::table)
        .values(&NewUser {
            full_name: payload.full_name,
            email: payload.email.to_lowercase(),
            password_hash,
            phone: payload.phone,
            role_id: payload.role_id,
            location_id: payload.location_id,
        })
        .get_result(&mut conn)
        .map_err(|_| ApiError::conflict("User with this email already exists"))?;

    info!(user_id = %user.id, "Created sevak");
    Ok(Envelope::created(user.into()))
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    params(ListParams, UserFilter),
    responses(
        (status = 200, description = "Paginated list of sevaks", body = Envelope<Paginated<UserListItem>>),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    Query(filter): Query<UserFilter>,
) -> ApiResult<Json<Envelope<Paginated<UserListItem>>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let mut count_query = users::table.count().into_boxed();
    let mut list_query = users::table
        .left_join(roles::table)
        .left_join(locations::table)
        .select((
            User::as_select(),
            roles::name.nullable(),
            locations::name.nullable(),
        ))
        .into_boxed();

    if let Some(is_active) = filter.is_active {
        count_query = count_query.filter(users::is_active.eq(is_active));
        list_query = list_query.filter(users::is_active.eq(is_active));
    }
    if let Some(role_id) = filter.role_id {
        count_query = count_query.filter(users::role_id.eq(role_id));
        list_query = list_query.filter(users::role_id.eq(role_id));
    }
    if let Some(pattern) = params.search_pattern() {
        count_query = count_query.filter(
            users::full_name
                .ilike(pattern.clone())
                .or(users::email.ilike(pattern.clone())),
        );
        list_query = list_query.filter(
            users::full_name
                .ilike(pattern.clone())
                .or(users::email.ilike(pattern)),
        );
    }

    let total_count: i64 = count_query
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let (limit, offset) = params.limit_offset();
    let rows: Vec<(User, Option<String>, Option<String>)> = list_query
        .order(users::full_name.asc())
        .limit(limit)
        .offset(offset)
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let items = rows
        .into_iter()
        .map(|(user, role_name, location_name)| UserListItem {
            user: user.into(),
            role_name,
            location_name,
        })
        .collect();

    Ok(Envelope::ok(Paginated::new(
        items,
        params.into_metadata(total_count),
    )))
}

#[utoipa::path(
    get,
    path = "/users/{user_id}",
    tag = "Users",
    params(("user_id" = Uuid, Path, description = "Sevak ID")),
    responses(
        (status = 200, description = "Sevak detail", body = Envelope<UserListItem>),
        (status = 404, description = "Sevak not found", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<UserListItem>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let row: Option<(User, Option<String>, Option<String>)> = users::table
        .left_join(roles::table)
        .left_join(locations::table)
        .filter(users::id.eq(user_id))
        .select((
            User::as_select(),
            roles::name.nullable(),
            locations::name.nullable(),
        ))
        .first(&mut conn)
        .optional()
        .map_err(|_| ApiError::db_error())?;

    let (user, role_name, location_name) =
        row.ok_or_else(|| ApiError::not_found("Sevak not found"))?;

    Ok(Envelope::ok(UserListItem {
        user: user.into(),
        role_name,
        location_name,
    }))
}

#[utoipa::path(
    put,
    path = "/users/{user_id}",
    tag = "Users",
    params(("user_id" = Uuid, Path, description = "Sevak ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Sevak updated", body = Envelope<UserResponse>),
        (status = 400, description = "No fields to update", body = crate::error::ApiError),
        (status = 404, description = "Sevak not found", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<Envelope<UserResponse>>> {
    if payload.full_name.is_none()
        && payload.phone.is_none()
        && payload.role_id.is_none()
        && payload.location_id.is_none()
        && payload.is_active.is_none()
    {
        return Err(ApiError::bad_request(
            "At least one field must be provided",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = diesel::update(users::table.filter(users::id.eq(user_id)))
        .set(&payload)
        .get_result(&mut conn)
        .map_err(|_| ApiError::not_found("Sevak not found"))?;

    info!(user_id = %user_id, "Updated sevak");
    Ok(Envelope::ok(user.into()))
}

#[utoipa::path(
    delete,
    path = "/users/{user_id}",
    tag = "Users",
    params(("user_id" = Uuid, Path, description = "Sevak ID")),
    responses(
        (status = 200, description = "Sevak deleted", body = crate::response::MessageEnvelope),
        (status = 404, description = "Sevak not found", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<()>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let deleted = diesel::delete(users::table.filter(users::id.eq(user_id)))
        .execute(&mut conn)
        .map_err(|_| ApiError::internal("Failed to delete sevak"))?;

    if deleted == 0 {
        return Err(ApiError::not_found("Sevak not found"));
    }

    info!(user_id = %user_id, "Deleted sevak");
    Ok(Envelope::message("Sevak deleted"))
}

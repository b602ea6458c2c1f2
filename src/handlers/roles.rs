//! Role management handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use diesel::prelude::*;
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{get_db_conn, ApiError, ApiResult},
    models::{NewRole, Role},
    pagination::ListParams,
    response::{Envelope, Paginated},
    schema::{role_activity_permissions, roles, users},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRoleRequest {
    #[validate(length(min = 2, max = 60, message = "Role name must be 2-60 characters"))]
    #[schema(example = "coordinator")]
    pub name: String,
    #[schema(example = "Manages sevaks and locations")]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, AsChangeset, ToSchema)]
#[diesel(table_name = crate::schema::roles)]
pub struct UpdateRoleRequest {
    #[schema(example = "senior-coordinator")]
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[utoipa::path(
    post,
    path = "/roles",
    tag = "Roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created", body = Envelope<Role>),
        (status = 400, description = "Validation error", body = crate::error::ApiError),
        (status = 409, description = "Role already exists", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    Json(payload): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Role>>)> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(format!("Validation error: {}", e)));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let role: Role = diesel::insert_into(roles::table)
        .values(&NewRole {
            name: payload.name,
            description: payload.description,
        })
        .get_result(&mut conn)
        .map_err(|_| ApiError::conflict("Role with this name already exists"))?;

    info!(role_id = %role.id, role_name = %role.name, "Created role");
    Ok(Envelope::created(role))
}

#[utoipa::path(
    get,
    path = "/roles",
    tag = "Roles",
    params(ListParams),
    responses(
        (status = 200, description = "Paginated list of roles", body = Envelope<Paginated<Role>>),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_roles(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Envelope<Paginated<Role>>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let mut count_query = roles::table.count().into_boxed();
    let mut list_query = roles::table.into_boxed();

    if let Some(pattern) = params.search_pattern() {
        count_query = count_query.filter(roles::name.ilike(pattern.clone()));
        list_query = list_query.filter(roles::name.ilike(pattern));
    }

    let total_count: i64 = count_query
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let (limit, offset) = params.limit_offset();
    let items: Vec<Role> = list_query
        .order(roles::name.asc())
        .limit(limit)
        .offset(offset)
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Envelope::ok(Paginated::new(
        items,
        params.into_metadata(total_count),
    )))
}

#[utoipa::path(
    put,
    path = "/roles/{role_id}",
    tag = "Roles",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = Envelope<Role>),
        (status = 400, description = "No fields to update", body = crate::error::ApiError),
        (status = 404, description = "Role not found", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_role(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<Json<Envelope<Role>>> {
    if payload.name.is_none() && payload.description.is_none() && payload.is_active.is_none() {
        return Err(ApiError::bad_request("At least one field must be provided"));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let role: Role = diesel::update(roles::table.filter(roles::id.eq(role_id)))
        .set(&payload)
        .get_result(&mut conn)
        .map_err(|_| ApiError::not_found("Role not found"))?;

    info!(role_id = %role_id, "Updated role");
    Ok(Envelope::ok(role))
}

#[utoipa::path(
    delete,
    path = "/roles/{role_id}",
    tag = "Roles",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role deleted", body = crate::response::MessageEnvelope),
        (status = 404, description = "Role not found", body = crate::error::ApiError),
        (status = 409, description = "Role still in use", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_role(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<()>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let assigned_users: i64 = users::table
        .filter(users::role_id.eq(role_id))
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    if assigned_users > 0 {
        return Err(ApiError::conflict(
            "Role is still assigned to one or more sevaks",
        ));
    }

    // Mapping rows go with the role.
    diesel::delete(
        role_activity_permissions::table.filter(role_activity_permissions::role_id.eq(role_id)),
    )
    .execute(&mut conn)
    .map_err(|_| ApiError::db_error())?;

    let deleted = diesel::delete(roles::table.filter(roles::id.eq(role_id)))
        .execute(&mut conn)
        .map_err(|_| ApiError::internal("Failed to delete role"))?;

    if deleted == 0 {
        return Err(ApiError::not_found("Role not found"));
    }

    info!(role_id = %role_id, "Deleted role");
    Ok(Envelope::message("Role deleted"))
}

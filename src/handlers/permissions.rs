//! Permission management handlers.

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
    models::{NewPermission, Permission},
    pagination::ListParams,
    response::{Envelope, Paginated},
    schema::permissions,
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePermissionRequest {
    #[validate(length(min = 2, max = 60, message = "Permission name must be 2-60 characters"))]
    #[schema(example = "VIEW")]
    pub name: String,
    /// Active flag; defaults to true.
    pub status: Option<bool>,
}

#[derive(Debug, Deserialize, AsChangeset, ToSchema)]
#[diesel(table_name = crate::schema::permissions)]
pub struct UpdatePermissionRequest {
    pub name: Option<String>,
    pub status: Option<bool>,
}

#[utoipa::path(
    post,
    path = "/permissions",
    tag = "Permissions",
    request_body = CreatePermissionRequest,
    responses(
        (status = 201, description = "Permission created", body = Envelope<Permission>),
        (status = 400, description = "Validation error", body = crate::error::ApiError),
        (status = 409, description = "Permission already exists", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_permission(
    State(state): State<AppState>,
    Json(payload): Json<CreatePermissionRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Permission>>)> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(format!("Validation error: {}", e)));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let permission: Permission = diesel::insert_into(permissions::table)
        .values(&NewPermission {
            name: payload.name.to_uppercase(),
            status: payload.status.unwrap_or(true),
        })
        .get_result(&mut conn)
        .map_err(|_| ApiError::conflict("Permission with this name already exists"))?;

    info!(permission_id = %permission.id, name = %permission.name, "Created permission");
    Ok(Envelope::created(permission))
}

#[utoipa::path(
    get,
    path = "/permissions",
    tag = "Permissions",
    params(ListParams),
    responses(
        (status = 200, description = "Paginated list of permissions", body = Envelope<Paginated<Permission>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_permissions(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Envelope<Paginated<Permission>>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let mut count_query = permissions::table.count().into_boxed();
    let mut list_query = permissions::table.into_boxed();

    if let Some(pattern) = params.search_pattern() {
        count_query = count_query.filter(permissions::name.ilike(pattern.clone()));
        list_query = list_query.filter(permissions::name.ilike(pattern));
    }

    let total_count: i64 = count_query
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let (limit, offset) = params.limit_offset();
    let items: Vec<Permission> = list_query
        .order(permissions::name.asc())
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
    path = "/permissions/{permission_id}",
    tag = "Permissions",
    params(("permission_id" = Uuid, Path, description = "Permission ID")),
    request_body = UpdatePermissionRequest,
    responses(
        (status = 200, description = "Permission updated", body = Envelope<Permission>),
        (status = 400, description = "No fields to update", body = crate::error::ApiError),
        (status = 404, description = "Permission not found", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_permission(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
    Json(mut payload): Json<UpdatePermissionRequest>,
) -> ApiResult<Json<Envelope<Permission>>> {
    if payload.name.is_none() && payload.status.is_none() {
        return Err(ApiError::bad_request("At least one field must be provided"));
    }

    payload.name = payload.name.map(|name| name.to_uppercase());

    let mut conn = get_db_conn(&state.db_pool)?;

    let permission: Permission =
        diesel::update(permissions::table.filter(permissions::id.eq(permission_id)))
            .set(&payload)
            .get_result(&mut conn)
            .map_err(|_| ApiError::not_found("Permission not found"))?;

    info!(permission_id = %permission_id, "Updated permission");
    Ok(Envelope::ok(permission))
}

#[utoipa::path(
    delete,
    path = "/permissions/{permission_id}",
    tag = "Permissions",
    params(("permission_id" = Uuid, Path, description = "Permission ID")),
    responses(
        (status = 200, description = "Permission deleted", body = crate::response::MessageEnvelope),
        (status = 404, description = "Permission not found", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_permission(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<()>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    // Mapping rows referencing this id become dangling and are dropped
    // silently by the resolver, matching the denormalized design.
    let deleted = diesel::delete(permissions::table.filter(permissions::id.eq(permission_id)))
        .execute(&mut conn)
        .map_err(|_| ApiError::internal("Failed to delete permission"))?;

    if deleted == 0 {
        return Err(ApiError::not_found("Permission not found"));
    }

    info!(permission_id = %permission_id, "Deleted permission");
    Ok(Envelope::message("Permission deleted"))
}

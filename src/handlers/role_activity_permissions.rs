//! Role↔activity↔permission mapping handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    authz::{self, ActivityPermissions},
    error::{get_db_conn, ApiError, ApiResult},
    models::{NewRoleActivityPermission, RoleActivityPermission},
    pagination::ListParams,
    response::{Envelope, Paginated},
    schema::{activities, permissions, role_activity_permissions, roles},
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetMappingRequest {
    pub role_id: Uuid,
    pub activity_id: Uuid,
    /// Permission ids granted to the role for this activity.
    pub permission_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MappingResponse {
    pub id: Uuid,
    pub role_id: Uuid,
    #[schema(example = "coordinator")]
    pub role_name: String,
    pub activity_id: Uuid,
    #[schema(example = "USERS")]
    pub activity_name: String,
    pub permission_ids: Vec<String>,
}

/// Creates the mapping row for (role, activity), or replaces its permission
/// set if one already exists.
#[utoipa::path(
    post,
    path = "/roleActivityPermissions",
    tag = "Role Permissions",
    request_body = SetMappingRequest,
    responses(
        (status = 201, description = "Mapping stored", body = Envelope<MappingResponse>),
        (status = 400, description = "Unknown permission id", body = crate::error::ApiError),
        (status = 404, description = "Role or activity not found", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_mapping(
    State(state): State<AppState>,
    Json(payload): Json<SetMappingRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<MappingResponse>>)> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let role_name: String = roles::table
        .filter(roles::id.eq(payload.role_id))
        .select(roles::name)
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("Role not found"))?;

    let activity_name: String = activities::table
        .filter(activities::id.eq(payload.activity_id))
        .select(activities::name)
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("Activity not found"))?;

    let known: i64 = permissions::table
        .filter(permissions::id.eq_any(&payload.permission_ids))
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    if known != payload.permission_ids.len() as i64 {
        return Err(ApiError::bad_request(
            "One or more permission ids do not exist",
        ));
    }

    // Stored as a JSON array of id strings; legacy rows may still hold a
    // comma-joined string, which the resolver accepts transparently.
    let id_strings: Vec<String> = payload
        .permission_ids
        .iter()
        .map(|id| id.to_string())
        .collect();
    let permission_ids_json = serde_json::json!(id_strings);

    let existing: Option<Uuid> = role_activity_permissions::table
        .filter(role_activity_permissions::role_id.eq(payload.role_id))
        .filter(role_activity_permissions::activity_id.eq(payload.activity_id))
        .select(role_activity_permissions::id)
        .first(&mut conn)
        .optional()
        .map_err(|_| ApiError::db_error())?;

    let mapping: RoleActivityPermission = match existing {
        Some(id) => diesel::update(
            role_activity_permissions::table.filter(role_activity_permissions::id.eq(id)),
        )
        .set(role_activity_permissions::permission_ids.eq(&permission_ids_json))
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?,
        None => diesel::insert_into(role_activity_permissions::table)
            .values(&NewRoleActivityPermission {
                role_id: payload.role_id,
                activity_id: payload.activity_id,
                permission_ids: permission_ids_json,
            })
            .get_result(&mut conn)
            .map_err(|_| ApiError::db_error())?,
    };

    info!(
        role_id = %payload.role_id,
        activity_id = %payload.activity_id,
        permissions = id_strings.len(),
        "Stored role activity mapping"
    );

    Ok(Envelope::created(MappingResponse {
        id: mapping.id,
        role_id: mapping.role_id,
        role_name,
        activity_id: mapping.activity_id,
        activity_name,
        permission_ids: authz::permission_id_list(&mapping.permission_ids),
    }))
}

#[utoipa::path(
    get,
    path = "/roleActivityPermissions",
    tag = "Role Permissions",
    params(ListParams),
    responses(
        (status = 200, description = "Paginated list of mappings", body = Envelope<Paginated<MappingResponse>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_mappings(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Envelope<Paginated<MappingResponse>>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let total_count: i64 = role_activity_permissions::table
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let (limit, offset) = params.limit_offset();
    let rows: Vec<(RoleActivityPermission, String, String)> = role_activity_permissions::table
        .inner_join(roles::table)
        .inner_join(activities::table)
        .order((roles::name.asc(), activities::name.asc()))
        .limit(limit)
        .offset(offset)
        .select((
            RoleActivityPermission::as_select(),
            roles::name,
            activities::name,
        ))
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let items = rows
        .into_iter()
        .map(|(mapping, role_name, activity_name)| MappingResponse {
            id: mapping.id,
            role_id: mapping.role_id,
            role_name,
            activity_id: mapping.activity_id,
            activity_name,
            permission_ids: authz::permission_id_list(&mapping.permission_ids),
        })
        .collect();

    Ok(Envelope::ok(Paginated::new(
        items,
        params.into_metadata(total_count),
    )))
}

#[utoipa::path(
    delete,
    path = "/roleActivityPermissions/{mapping_id}",
    tag = "Role Permissions",
    params(("mapping_id" = Uuid, Path, description = "Mapping ID")),
    responses(
        (status = 200, description = "Mapping deleted", body = crate::response::MessageEnvelope),
        (status = 404, description = "Mapping not found", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_mapping(
    State(state): State<AppState>,
    Path(mapping_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<()>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let deleted = diesel::delete(
        role_activity_permissions::table.filter(role_activity_permissions::id.eq(mapping_id)),
    )
    .execute(&mut conn)
    .map_err(|_| ApiError::internal("Failed to delete mapping"))?;

    if deleted == 0 {
        return Err(ApiError::not_found("Mapping not found"));
    }

    info!(mapping_id = %mapping_id, "Deleted role activity mapping");
    Ok(Envelope::message("Mapping deleted"))
}

/// Aggregate permission view for one role: per activity, the granted
/// permission names. The admin UI bootstraps its menu from this.
#[utoipa::path(
    get,
    path = "/amavasyaUserLocation/permission/{role_id}",
    tag = "Role Permissions",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Permission names per activity", body = Envelope<Vec<ActivityPermissions>>),
        (status = 404, description = "Role not found", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn role_permission_view(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<Vec<ActivityPermissions>>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let role_exists: i64 = roles::table
        .filter(roles::id.eq(role_id))
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    if role_exists == 0 {
        return Err(ApiError::not_found("Role not found"));
    }

    let view = authz::resolve_role_permissions(&mut conn, role_id)
        .map_err(|_| ApiError::db_error())?;

    Ok(Envelope::ok(view))
}

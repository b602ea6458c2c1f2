//! Activity management handlers.
//!
//! Activities are the named application modules ("USERS", "REPORTS", ...)
//! that permissions are scoped to.

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
    models::{Activity, NewActivity},
    pagination::ListParams,
    response::{Envelope, Paginated},
    schema::{activities, role_activity_permissions},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateActivityRequest {
    #[validate(length(min = 2, max = 60, message = "Activity name must be 2-60 characters"))]
    #[schema(example = "REPORTS")]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, AsChangeset, ToSchema)]
#[diesel(table_name = crate::schema::activities)]
pub struct UpdateActivityRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[utoipa::path(
    post,
    path = "/activities",
    tag = "Activities",
    request_body = CreateActivityRequest,
    responses(
        (status = 201, description = "Activity created", body = Envelope<Activity>),
        (status = 400, description = "Validation error", body = crate::error::ApiError),
        (status = 409, description = "Activity already exists", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_activity(
    State(state): State<AppState>,
    Json(payload): Json<CreateActivityRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Activity>>)> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(format!("Validation error: {}", e)));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    // Activity names are matched literally by the ABAC gate.
    let activity: Activity = diesel::insert_into(activities::table)
        .values(&NewActivity {
            name: payload.name.to_uppercase(),
            description: payload.description,
        })
        .get_result(&mut conn)
        .map_err(|_| ApiError::conflict("Activity with this name already exists"))?;

    info!(activity_id = %activity.id, activity_name = %activity.name, "Created activity");
    Ok(Envelope::created(activity))
}

#[utoipa::path(
    get,
    path = "/activities",
    tag = "Activities",
    params(ListParams),
    responses(
        (status = 200, description = "Paginated list of activities", body = Envelope<Paginated<Activity>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_activities(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Envelope<Paginated<Activity>>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let mut count_query = activities::table.count().into_boxed();
    let mut list_query = activities::table.into_boxed();

    if let Some(pattern) = params.search_pattern() {
        count_query = count_query.filter(activities::name.ilike(pattern.clone()));
        list_query = list_query.filter(activities::name.ilike(pattern));
    }

    let total_count: i64 = count_query
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let (limit, offset) = params.limit_offset();
    let items: Vec<Activity> = list_query
        .order(activities::name.asc())
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
    path = "/activities/{activity_id}",
    tag = "Activities",
    params(("activity_id" = Uuid, Path, description = "Activity ID")),
    request_body = UpdateActivityRequest,
    responses(
        (status = 200, description = "Activity updated", body = Envelope<Activity>),
        (status = 400, description = "No fields to update", body = crate::error::ApiError),
        (status = 404, description = "Activity not found", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_activity(
    State(state): State<AppState>,
    Path(activity_id): Path<Uuid>,
    Json(mut payload): Json<UpdateActivityRequest>,
) -> ApiResult<Json<Envelope<Activity>>> {
    if payload.name.is_none() && payload.description.is_none() && payload.is_active.is_none() {
        return Err(ApiError::bad_request("At least one field must be provided"));
    }

    payload.name = payload.name.map(|name| name.to_uppercase());

    let mut conn = get_db_conn(&state.db_pool)?;

    let activity: Activity =
        diesel::update(activities::table.filter(activities::id.eq(activity_id)))
            .set(&payload)
            .get_result(&mut conn)
            .map_err(|_| ApiError::not_found("Activity not found"))?;

    info!(activity_id = %activity_id, "Updated activity");
    Ok(Envelope::ok(activity))
}

#[utoipa::path(
    delete,
    path = "/activities/{activity_id}",
    tag = "Activities",
    params(("activity_id" = Uuid, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "Activity deleted", body = crate::response::MessageEnvelope),
        (status = 404, description = "Activity not found", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_activity(
    State(state): State<AppState>,
    Path(activity_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<()>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    diesel::delete(
        role_activity_permissions::table
            .filter(role_activity_permissions::activity_id.eq(activity_id)),
    )
    .execute(&mut conn)
    .map_err(|_| ApiError::db_error())?;

    let deleted = diesel::delete(activities::table.filter(activities::id.eq(activity_id)))
        .execute(&mut conn)
        .map_err(|_| ApiError::internal("Failed to delete activity"))?;

    if deleted == 0 {
        return Err(ApiError::not_found("Activity not found"));
    }

    info!(activity_id = %activity_id, "Deleted activity");
    Ok(Envelope::message("Activity deleted"))
}

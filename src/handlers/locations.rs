//! Location management handlers.

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
    models::{Location, NewLocation},
    pagination::ListParams,
    response::{Envelope, Paginated},
    schema::{amavasya_user_locations, locations},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateLocationRequest {
    #[validate(length(min = 2, max = 120, message = "Location name must be 2-120 characters"))]
    #[schema(example = "Akshar Hall")]
    pub name: String,
    #[schema(example = "12 Mandir Road, Ahmedabad")]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, AsChangeset, ToSchema)]
#[diesel(table_name = crate::schema::locations)]
pub struct UpdateLocationRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

#[utoipa::path(
    post,
    path = "/locations",
    tag = "Locations",
    request_body = CreateLocationRequest,
    responses(
        (status = 201, description = "Location created", body = Envelope<Location>),
        (status = 400, description = "Validation error", body = crate::error::ApiError),
        (status = 409, description = "Location already exists", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_location(
    State(state): State<AppState>,
    Json(payload): Json<CreateLocationRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Location>>)> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(format!("Validation error: {}", e)));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let location: Location = diesel::insert_into(locations::table)
        .values(&NewLocation {
            name: payload.name,
            address: payload.address,
        })
        .get_result(&mut conn)
        .map_err(|_| ApiError::conflict("Location with this name already exists"))?;

    info!(location_id = %location.id, location_name = %location.name, "Created location");
    Ok(Envelope::created(location))
}

#[utoipa::path(
    get,
    path = "/locations",
    tag = "Locations",
    params(ListParams),
    responses(
        (status = 200, description = "Paginated list of locations", body = Envelope<Paginated<Location>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_locations(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Envelope<Paginated<Location>>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let mut count_query = locations::table.count().into_boxed();
    let mut list_query = locations::table.into_boxed();

    if let Some(pattern) = params.search_pattern() {
        count_query = count_query.filter(locations::name.ilike(pattern.clone()));
        list_query = list_query.filter(locations::name.ilike(pattern));
    }

    let total_count: i64 = count_query
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let (limit, offset) = params.limit_offset();
    let items: Vec<Location> = list_query
        .order(locations::name.asc())
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
    path = "/locations/{location_id}",
    tag = "Locations",
    params(("location_id" = Uuid, Path, description = "Location ID")),
    request_body = UpdateLocationRequest,
    responses(
        (status = 200, description = "Location updated", body = Envelope<Location>),
        (status = 400, description = "No fields to update", body = crate::error::ApiError),
        (status = 404, description = "Location not found", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_location(
    State(state): State<AppState>,
    Path(location_id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> ApiResult<Json<Envelope<Location>>> {
    if payload.name.is_none() && payload.address.is_none() && payload.is_active.is_none() {
        return Err(ApiError::bad_request("At least one field must be provided"));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let location: Location =
        diesel::update(locations::table.filter(locations::id.eq(location_id)))
            .set(&payload)
            .get_result(&mut conn)
            .map_err(|_| ApiError::not_found("Location not found"))?;

    info!(location_id = %location_id, "Updated location");
    Ok(Envelope::ok(location))
}

#[utoipa::path(
    delete,
    path = "/locations/{location_id}",
    tag = "Locations",
    params(("location_id" = Uuid, Path, description = "Location ID")),
    responses(
        (status = 200, description = "Location deleted", body = crate::response::MessageEnvelope),
        (status = 404, description = "Location not found", body = crate::error::ApiError),
        (status = 409, description = "Location still in use", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_location(
    State(state): State<AppState>,
    Path(location_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<()>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let assignments: i64 = amavasya_user_locations::table
        .filter(amavasya_user_locations::location_id.eq(location_id))
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    if assignments > 0 {
        return Err(ApiError::conflict(
            "Location has attendance records and cannot be deleted",
        ));
    }

    let deleted = diesel::delete(locations::table.filter(locations::id.eq(location_id)))
        .execute(&mut conn)
        .map_err(|_| ApiError::internal("Failed to delete location"))?;

    if deleted == 0 {
        return Err(ApiError::not_found("Location not found"));
    }

    info!(location_id = %location_id, "Deleted location");
    Ok(Envelope::message("Location deleted"))
}

//! Amavasya (event) management handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Deserialize;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{get_db_conn, ApiError, ApiResult},
    models::{Amavasya, NewAmavasya},
    pagination::{ListParams, SortOrder},
    response::{Envelope, Paginated},
    schema::{amavasya_user_locations, amavasyas},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAmavasyaRequest {
    #[validate(range(min = 1, max = 12, message = "Month must be between 1 and 12"))]
    #[schema(example = 3)]
    pub month: i32,
    #[validate(range(min = 1900, max = 2200, message = "Year is out of range"))]
    #[schema(example = 2025)]
    pub year: i32,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    #[schema(example = "06:00")]
    pub start_time: Option<String>,
    #[schema(example = "20:00")]
    pub end_time: Option<String>,
}

#[derive(Debug, Deserialize, AsChangeset, ToSchema)]
#[diesel(table_name = crate::schema::amavasyas)]
pub struct UpdateAmavasyaRequest {
    pub month: Option<i32>,
    pub year: Option<i32>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdateAmavasyaRequest {
    fn is_empty(&self) -> bool {
        self.month.is_none()
            && self.year.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.is_active.is_none()
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AmavasyaFilter {
    /// Restrict to one calendar year.
    pub year: Option<i32>,
    /// Restrict to active or inactive events.
    pub is_active: Option<bool>,
}

#[utoipa::path(
    post,
    path = "/amavasyas",
    tag = "Amavasyas",
    request_body = CreateAmavasyaRequest,
    responses(
        (status = 201, description = "Event created", body = Envelope<Amavasya>),
        (status = 400, description = "Validation error", body = crate::error::ApiError),
        (status = 409, description = "Event already exists for this month", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_amavasya(
    State(state): State<AppState>,
    Json(payload): Json<CreateAmavasyaRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Amavasya>>)> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(format!("Validation error: {}", e)));
    }

    if let Some(end_date) = payload.end_date {
        if end_date < payload.start_date {
            return Err(ApiError::bad_request("End date must not precede start date"));
        }
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let amavasya: Amavasya = diesel::insert_into(amavasyas::table)
        .values(&NewAmavasya {
            month: payload.month,
            year: payload.year,
            start_date: payload.start_date,
            end_date: payload.end_date,
            start_time: payload.start_time,
            end_time: payload.end_time,
        })
        .get_result(&mut conn)
        .map_err(|_| ApiError::conflict("An event already exists for this month and year"))?;

    info!(
        amavasya_id = %amavasya.id,
        month = amavasya.month,
        year = amavasya.year,
        "Created amavasya"
    );
    Ok(Envelope::created(amavasya))
}

#[utoipa::path(
    get,
    path = "/amavasyas",
    tag = "Amavasyas",
    params(ListParams, AmavasyaFilter),
    responses(
        (status = 200, description = "Paginated list of events ordered by start date", body = Envelope<Paginated<Amavasya>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_amavasyas(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    Query(filter): Query<AmavasyaFilter>,
) -> ApiResult<Json<Envelope<Paginated<Amavasya>>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let mut count_query = amavasyas::table.count().into_boxed();
    let mut list_query = amavasyas::table.into_boxed();

    if let Some(year) = filter.year {
        count_query = count_query.filter(amavasyas::year.eq(year));
        list_query = list_query.filter(amavasyas::year.eq(year));
    }
    if let Some(is_active) = filter.is_active {
        count_query = count_query.filter(amavasyas::is_active.eq(is_active));
        list_query = list_query.filter(amavasyas::is_active.eq(is_active));
    }

    let total_count: i64 = count_query
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    list_query = match params.order {
        SortOrder::Asc => list_query.order(amavasyas::start_date.asc()),
        SortOrder::Desc => list_query.order(amavasyas::start_date.desc()),
    };

    let (limit, offset) = params.limit_offset();
    let items: Vec<Amavasya> = list_query
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
    path = "/amavasyas/{amavasya_id}",
    tag = "Amavasyas",
    params(("amavasya_id" = Uuid, Path, description = "Event ID")),
    request_body = UpdateAmavasyaRequest,
    responses(
        (status = 200, description = "Event updated", body = Envelope<Amavasya>),
        (status = 400, description = "No fields to update", body = crate::error::ApiError),
        (status = 404, description = "Event not found", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_amavasya(
    State(state): State<AppState>,
    Path(amavasya_id): Path<Uuid>,
    Json(payload): Json<UpdateAmavasyaRequest>,
) -> ApiResult<Json<Envelope<Amavasya>>> {
    if payload.is_empty() {
        return Err(ApiError::bad_request("At least one field must be provided"));
    }

    if let Some(month) = payload.month {
        if !(1..=12).contains(&month) {
            return Err(ApiError::bad_request("Month must be between 1 and 12"));
        }
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let amavasya: Amavasya =
        diesel::update(amavasyas::table.filter(amavasyas::id.eq(amavasya_id)))
            .set(&payload)
            .get_result(&mut conn)
            .map_err(|_| ApiError::not_found("Event not found"))?;

    info!(amavasya_id = %amavasya_id, "Updated amavasya");
    Ok(Envelope::ok(amavasya))
}

#[utoipa::path(
    delete,
    path = "/amavasyas/{amavasya_id}",
    tag = "Amavasyas",
    params(("amavasya_id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event deleted", body = crate::response::MessageEnvelope),
        (status = 404, description = "Event not found", body = crate::error::ApiError),
        (status = 409, description = "Event has attendance records", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_amavasya(
    State(state): State<AppState>,
    Path(amavasya_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<()>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    // Events with computed attendance are immutable history.
    let assignments: i64 = amavasya_user_locations::table
        .filter(amavasya_user_locations::amavasya_id.eq(amavasya_id))
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    if assignments > 0 {
        return Err(ApiError::conflict(
            "Event has attendance records and cannot be deleted",
        ));
    }

    let deleted = diesel::delete(amavasyas::table.filter(amavasyas::id.eq(amavasya_id)))
        .execute(&mut conn)
        .map_err(|_| ApiError::internal("Failed to delete event"))?;

    if deleted == 0 {
        return Err(ApiError::not_found("Event not found"));
    }

    info!(amavasya_id = %amavasya_id, "Deleted amavasya");
    Ok(Envelope::message("Event deleted"))
}

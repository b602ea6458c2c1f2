//! Attendance record (AmavasyaUserLocation) handlers.
//!
//! A record's existence is the sole signal of presence; deleting it marks
//! the sevak absent again.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    attendance::{compute_attendance, AttendanceReport, PresenceRecord},
    error::{get_db_conn, ApiError, ApiResult},
    models::{Amavasya, AmavasyaUserLocation, NewAmavasyaUserLocation},
    pagination::ListParams,
    response::{Envelope, Paginated},
    schema::{amavasya_user_locations, amavasyas, locations, users},
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRequest {
    pub amavasya_id: Uuid,
    pub user_id: Uuid,
    pub location_id: Uuid,
    #[schema(example = "kitchen seva")]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkAssignRequest {
    pub amavasya_id: Uuid,
    pub location_id: Uuid,
    pub user_ids: Vec<Uuid>,
    pub note: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkAssignData {
    pub assigned: usize,
    /// User ids skipped because they are unknown or already assigned.
    pub skipped: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentListItem {
    pub id: Uuid,
    pub amavasya_id: Uuid,
    pub month: i32,
    pub year: i32,
    pub user_id: Uuid,
    #[schema(example = "Ramesh Patel")]
    pub user_name: String,
    pub location_id: Uuid,
    #[schema(example = "Akshar Hall")]
    pub location_name: String,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AssignmentFilter {
    /// Restrict to one event.
    pub amavasya_id: Option<Uuid>,
    /// Restrict to one location.
    pub location_id: Option<Uuid>,
}

fn verify_event_and_location(
    conn: &mut PgConnection,
    amavasya_id: Uuid,
    location_id: Uuid,
) -> ApiResult<()> {
    let event_exists: i64 = amavasyas::table
        .filter(amavasyas::id.eq(amavasya_id))
        .filter(amavasyas::is_active.eq(true))
        .count()
        .get_result(conn)
        .map_err(|_| ApiError::db_error())?;
    if event_exists == 0 {
        return Err(ApiError::not_found("Event not found"));
    }

    let location_exists: i64 = locations::table
        .filter(locations::id.eq(location_id))
        .filter(locations::is_active.eq(true))
        .count()
        .get_result(conn)
        .map_err(|_| ApiError::db_error())?;
    if location_exists == 0 {
        return Err(ApiError::not_found("Location not found"));
    }

    Ok(())
}

fn already_assigned(
    conn: &mut PgConnection,
    amavasya_id: Uuid,
    user_id: Uuid,
) -> Result<bool, diesel::result::Error> {
    let count: i64 = amavasya_user_locations::table
        .filter(amavasya_user_locations::amavasya_id.eq(amavasya_id))
        .filter(amavasya_user_locations::user_id.eq(user_id))
        .filter(amavasya_user_locations::is_active.eq(true))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

/// Assigns one sevak to a location for an event. One record per
/// (event, user): a second assignment answers 409 rather than creating the
/// duplicate the resolver would then collapse.
#[utoipa::path(
    post,
    path = "/amavasyaUserLocation",
    tag = "Attendance",
    request_body = AssignRequest,
    responses(
        (status = 201, description = "Sevak assigned", body = Envelope<crate::models::AmavasyaUserLocation>),
        (status = 404, description = "Event, sevak or location not found", body = crate::error::ApiError),
        (status = 409, description = "Sevak already assigned for this event", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn assign(
    State(state): State<AppState>,
    Json(payload): Json<AssignRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<AmavasyaUserLocation>>)> {
    let mut conn = get_db_conn(&state.db_pool)?;

    verify_event_and_location(&mut conn, payload.amavasya_id, payload.location_id)?;

    let user_exists: i64 = users::table
        .filter(users::id.eq(payload.user_id))
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;
    if user_exists == 0 {
        return Err(ApiError::not_found("Sevak not found"));
    }

    if already_assigned(&mut conn, payload.amavasya_id, payload.user_id)
        .map_err(|_| ApiError::db_error())?
    {
        return Err(ApiError::conflict(
            "Sevak is already assigned for this event",
        ));
    }

    let record: AmavasyaUserLocation = diesel::insert_into(amavasya_user_locations::table)
        .values(&NewAmavasyaUserLocation {
            amavasya_id: payload.amavasya_id,
            user_id: payload.user_id,
            location_id: payload.location_id,
            note: payload.note,
        })
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(
        amavasya_id = %payload.amavasya_id,
        user_id = %payload.user_id,
        location_id = %payload.location_id,
        "Assigned sevak to event"
    );
    Ok(Envelope::created(record))
}

#[utoipa::path(
    post,
    path = "/amavasyaUserLocation/bulk",
    tag = "Attendance",
    request_body = BulkAssignRequest,
    responses(
        (status = 200, description = "Bulk assignment result", body = Envelope<BulkAssignData>),
        (status = 400, description = "Empty user list", body = crate::error::ApiError),
        (status = 404, description = "Event or location not found", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn bulk_assign(
    State(state): State<AppState>,
    Json(payload): Json<BulkAssignRequest>,
) -> ApiResult<Json<Envelope<BulkAssignData>>> {
    if payload.user_ids.is_empty() {
        return Err(ApiError::bad_request("At least one sevak must be provided"));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    verify_event_and_location(&mut conn, payload.amavasya_id, payload.location_id)?;

    let mut assigned = 0usize;
    let mut skipped = Vec::new();

    for user_id in payload.user_ids {
        let user_exists: i64 = users::table
            .filter(users::id.eq(user_id))
            .count()
            .get_result(&mut conn)
            .map_err(|_| ApiError::db_error())?;

        let duplicate = already_assigned(&mut conn, payload.amavasya_id, user_id)
            .map_err(|_| ApiError::db_error())?;

        if user_exists == 0 || duplicate {
            skipped.push(user_id);
            continue;
        }

        diesel::insert_into(amavasya_user_locations::table)
            .values(&NewAmavasyaUserLocation {
                amavasya_id: payload.amavasya_id,
                user_id,
                location_id: payload.location_id,
                note: payload.note.clone(),
            })
            .execute(&mut conn)
            .map_err(|_| ApiError::db_error())?;
        assigned += 1;
    }

    info!(
        amavasya_id = %payload.amavasya_id,
        assigned = assigned,
        skipped = skipped.len(),
        "Bulk assigned sevaks"
    );

    Ok(Envelope::ok(BulkAssignData { assigned, skipped }))
}

#[utoipa::path(
    get,
    path = "/amavasyaUserLocation",
    tag = "Attendance",
    params(ListParams, AssignmentFilter),
    responses(
        (status = 200, description = "Paginated list of assignments", body = Envelope<Paginated<AssignmentListItem>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_assignments(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    Query(filter): Query<AssignmentFilter>,
) -> ApiResult<Json<Envelope<Paginated<AssignmentListItem>>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let mut count_query = amavasya_user_locations::table.count().into_boxed();
    let mut list_query = amavasya_user_locations::table
        .inner_join(amavasyas::table)
        .inner_join(users::table)
        .inner_join(locations::table)
        .select((
            AmavasyaUserLocation::as_select(),
            Amavasya::as_select(),
            users::full_name,
            locations::name,
        ))
        .into_boxed();

    if let Some(amavasya_id) = filter.amavasya_id {
        count_query = count_query.filter(amavasya_user_locations::amavasya_id.eq(amavasya_id));
        list_query = list_query.filter(amavasya_user_locations::amavasya_id.eq(amavasya_id));
    }
    if let Some(location_id) = filter.location_id {
        count_query = count_query.filter(amavasya_user_locations::location_id.eq(location_id));
        list_query = list_query.filter(amavasya_user_locations::location_id.eq(location_id));
    }

    let total_count: i64 = count_query
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let (limit, offset) = params.limit_offset();
    let rows: Vec<(AmavasyaUserLocation, Amavasya, String, String)> = list_query
        .order(amavasya_user_locations::created_at.desc())
        .limit(limit)
        .offset(offset)
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let items = rows
        .into_iter()
        .map(|(record, event, user_name, location_name)| AssignmentListItem {
            id: record.id,
            amavasya_id: event.id,
            month: event.month,
            year: event.year,
            user_id: record.user_id,
            user_name,
            location_id: record.location_id,
            location_name,
            note: record.note,
        })
        .collect();

    Ok(Envelope::ok(Paginated::new(
        items,
        params.into_metadata(total_count),
    )))
}

#[utoipa::path(
    delete,
    path = "/amavasyaUserLocation/{record_id}",
    tag = "Attendance",
    params(("record_id" = Uuid, Path, description = "Attendance record ID")),
    responses(
        (status = 200, description = "Assignment removed", body = crate::response::MessageEnvelope),
        (status = 404, description = "Record not found", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_assignment(
    State(state): State<AppState>,
    Path(record_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<()>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let deleted = diesel::delete(
        amavasya_user_locations::table.filter(amavasya_user_locations::id.eq(record_id)),
    )
    .execute(&mut conn)
    .map_err(|_| ApiError::internal("Failed to remove assignment"))?;

    if deleted == 0 {
        return Err(ApiError::not_found("Record not found"));
    }

    info!(record_id = %record_id, "Removed assignment");
    Ok(Envelope::message("Assignment removed"))
}

/// Per-event presence and the continuous-presence streak for one sevak,
/// computed over every active event. Items come back oldest first.
#[utoipa::path(
    get,
    path = "/amavasyaUserLocation/userAttendance/{user_id}",
    tag = "Attendance",
    params(("user_id" = Uuid, Path, description = "Sevak ID")),
    responses(
        (status = 200, description = "Attendance report", body = Envelope<AttendanceReport>),
        (status = 404, description = "Sevak not found", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn user_attendance(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<AttendanceReport>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let user_exists: i64 = users::table
        .filter(users::id.eq(user_id))
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;
    if user_exists == 0 {
        return Err(ApiError::not_found("Sevak not found"));
    }

    // The streak is counted from the most recent event backward, so the
    // resolver requires this descending order.
    let events: Vec<Amavasya> = amavasyas::table
        .filter(amavasyas::is_active.eq(true))
        .order(amavasyas::start_date.desc())
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let rows: Vec<(Uuid, String, Option<String>)> = amavasya_user_locations::table
        .inner_join(locations::table)
        .filter(amavasya_user_locations::user_id.eq(user_id))
        .filter(amavasya_user_locations::is_active.eq(true))
        .select((
            amavasya_user_locations::amavasya_id,
            locations::name,
            amavasya_user_locations::note,
        ))
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let records: Vec<PresenceRecord> = rows
        .into_iter()
        .map(|(amavasya_id, location_name, note)| PresenceRecord {
            amavasya_id,
            location_name,
            note,
        })
        .collect();

    Ok(Envelope::ok(compute_attendance(&events, &records)))
}

//! Dashboard counters and month-bucketed attendance aggregation.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Datelike;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::{get_db_conn, ApiError, ApiResult},
    response::Envelope,
    schema::{amavasya_user_locations, amavasyas, locations, users},
    AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DashboardParams {
    /// Calendar year for the monthly series; defaults to the current year.
    pub year: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyAttendance {
    #[schema(example = 3)]
    pub month: i32,
    #[schema(example = 42)]
    pub attendance_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub year: i32,
    pub total_sevaks: i64,
    pub total_locations: i64,
    pub total_amavasyas: i64,
    pub total_attendance: i64,
    /// Twelve entries, January through December.
    pub monthly_attendance: Vec<MonthlyAttendance>,
}

#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "Dashboard",
    params(DashboardParams),
    responses(
        (status = 200, description = "Dashboard counters and monthly series", body = Envelope<DashboardData>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn dashboard(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> ApiResult<Json<Envelope<DashboardData>>> {
    let year = params.year.unwrap_or_else(|| chrono::Utc::now().year());
    let mut conn = get_db_conn(&state.db_pool)?;

    let total_sevaks: i64 = users::table
        .filter(users::is_active.eq(true))
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let total_locations: i64 = locations::table
        .filter(locations::is_active.eq(true))
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let total_amavasyas: i64 = amavasyas::table
        .filter(amavasyas::is_active.eq(true))
        .filter(amavasyas::year.eq(year))
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    // One month value per attendance record of the year; bucketed below in
    // a single pass.
    let record_months: Vec<i32> = amavasya_user_locations::table
        .inner_join(amavasyas::table)
        .filter(amavasya_user_locations::is_active.eq(true))
        .filter(amavasyas::is_active.eq(true))
        .filter(amavasyas::year.eq(year))
        .select(amavasyas::month)
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let monthly_attendance = bucket_by_month(&record_months);
    let total_attendance = record_months.len() as i64;

    Ok(Envelope::ok(DashboardData {
        year,
        total_sevaks,
        total_locations,
        total_amavasyas,
        total_attendance,
        monthly_attendance,
    }))
}

fn bucket_by_month(record_months: &[i32]) -> Vec<MonthlyAttendance> {
    let mut buckets = [0i64; 12];
    for &month in record_months {
        if (1..=12).contains(&month) {
            buckets[(month - 1) as usize] += 1;
        }
    }

    buckets
        .iter()
        .enumerate()
        .map(|(i, &count)| MonthlyAttendance {
            month: i as i32 + 1,
            attendance_count: count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_by_month() {
        let months = vec![1, 1, 3, 12, 3, 3];
        let buckets = bucket_by_month(&months);

        assert_eq!(buckets.len(), 12);
        assert_eq!(buckets[0].month, 1);
        assert_eq!(buckets[0].attendance_count, 2);
        assert_eq!(buckets[2].attendance_count, 3);
        assert_eq!(buckets[11].attendance_count, 1);
        assert_eq!(buckets[1].attendance_count, 0);
    }

    #[test]
    fn test_bucket_ignores_out_of_range_months() {
        let buckets = bucket_by_month(&[0, 13, -4, 6]);
        let total: i64 = buckets.iter().map(|b| b.attendance_count).sum();
        assert_eq!(total, 1);
        assert_eq!(buckets[5].attendance_count, 1);
    }

    #[test]
    fn test_bucket_empty_input() {
        let buckets = bucket_by_month(&[]);
        assert_eq!(buckets.len(), 12);
        assert!(buckets.iter().all(|b| b.attendance_count == 0));
    }
}

//! Role/activity-based authorization middleware.
//!
//! Wraps protected routes with a single-action permission check. Must run
//! inside [`super::auth::auth_middleware`] so the claims extension is
//! present. Denials answer 403; like the resolver itself, every ambiguous
//! state denies rather than erroring.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use diesel::prelude::*;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::jwt::Claims,
    authz::has_permission,
    models::User,
    schema::users,
    telemetry::record_permission_check,
    AppState,
};

/// Well-known permission (action) names seeded with the system.
pub mod actions {
    pub const VIEW: &str = "VIEW";
    pub const ADD: &str = "ADD";
    pub const EDIT: &str = "EDIT";
    pub const DELETE: &str = "DELETE";
}

/// Well-known activity names; one per administrative module.
pub mod activities {
    pub const USERS: &str = "USERS";
    pub const ROLES: &str = "ROLES";
    pub const ACTIVITIES: &str = "ACTIVITIES";
    pub const PERMISSIONS: &str = "PERMISSIONS";
    pub const LOCATIONS: &str = "LOCATIONS";
    pub const AMAVASYA: &str = "AMAVASYA";
    pub const REPORTS: &str = "REPORTS";
    pub const DASHBOARD: &str = "DASHBOARD";
}

#[derive(Debug, Clone, Copy)]
pub struct RequiredPermission {
    pub action: &'static str,
    pub activity: &'static str,
}

impl RequiredPermission {
    pub fn new(action: &'static str, activity: &'static str) -> Self {
        Self { action, activity }
    }
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "success": false,
            "status": 403,
            "message": "You do not have permission to perform this action"
        })),
    )
        .into_response()
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"success": false, "status": 401, "message": message})),
    )
        .into_response()
}

/// Gate requiring `required.action` on `required.activity` for the
/// authenticated user. The user row is re-read per request so role changes
/// take effect without re-login.
pub async fn authorize_user(
    State((state, required)): State<(AppState, RequiredPermission)>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let start = std::time::Instant::now();

    let claims = req
        .extensions()
        .get::<Claims>()
        .cloned()
        .ok_or_else(|| unauthorized("Authentication required"))?;

    let user_id =
        Uuid::parse_str(&claims.sub).map_err(|_| unauthorized("Invalid token subject"))?;

    let granted = {
        let mut conn = state.db_pool.get().map_err(|_| forbidden())?;

        let user: Option<User> = users::table
            .filter(users::id.eq(user_id))
            .select(User::as_select())
            .first(&mut conn)
            .optional()
            .unwrap_or(None);

        match user {
            Some(user) => has_permission(&mut conn, &user, required.action, required.activity),
            None => false,
        }
    };

    record_permission_check(granted, start.elapsed());

    if !granted {
        debug!(
            user_id = %user_id,
            action = required.action,
            activity = required.activity,
            "Permission denied"
        );
        return Err(forbidden());
    }

    Ok(next.run(req).await)
}

//! OpenAPI documentation served via Swagger UI.

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::pagination::PaginationMeta;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sevak API",
        version = "1.0.0",
        description = "Administrative back office for Sevak attendance at Amavasya events.\n\n\
        ## Features\n\
        - JWT authentication with access and refresh tokens\n\
        - Role/activity/permission matrix gating every administrative module\n\
        - Sevak, role, activity, permission, location and event CRUD\n\
        - Attendance assignment with a continuous-presence report\n\
        - Month-bucketed dashboard aggregation\n\n\
        ## Authentication\n\
        Login to get an access token, then send it as\n\
        `Authorization: Bearer <token>`. Protected endpoints additionally\n\
        require the matching permission (VIEW/ADD/EDIT/DELETE) on the\n\
        endpoint's activity for your role.",
        contact(
            name = "Sevak API Support"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Authentication", description = "Login, token and session management"),
        (name = "Users", description = "Sevak administration"),
        (name = "Roles", description = "Role administration"),
        (name = "Activities", description = "Application module administration"),
        (name = "Permissions", description = "Permission administration"),
        (name = "Role Permissions", description = "Role/activity/permission matrix"),
        (name = "Locations", description = "Location administration"),
        (name = "Amavasyas", description = "Event administration"),
        (name = "Attendance", description = "Assignment records and attendance reports"),
        (name = "Dashboard", description = "Aggregated counters")
    ),
    paths(
        crate::handlers::health::health_check_simple,
        crate::handlers::health::health_check,
        crate::handlers::health::ready_check,
        crate::handlers::health::live_check,

        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::refresh_token,
        crate::handlers::auth::logout,
        crate::handlers::auth::get_current_user,
        crate::handlers::auth::get_own_permissions,

        crate::handlers::users::create_user,
        crate::handlers::users::list_users,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,

        crate::handlers::roles::create_role,
        crate::handlers::roles::list_roles,
        crate::handlers::roles::update_role,
        crate::handlers::roles::delete_role,

        crate::handlers::activities::create_activity,
        crate::handlers::activities::list_activities,
        crate::handlers::activities::update_activity,
        crate::handlers::activities::delete_activity,

        crate::handlers::permissions::create_permission,
        crate::handlers::permissions::list_permissions,
        crate::handlers::permissions::update_permission,
        crate::handlers::permissions::delete_permission,

        crate::handlers::role_activity_permissions::set_mapping,
        crate::handlers::role_activity_permissions::list_mappings,
        crate::handlers::role_activity_permissions::delete_mapping,
        crate::handlers::role_activity_permissions::role_permission_view,

        crate::handlers::locations::create_location,
        crate::handlers::locations::list_locations,
        crate::handlers::locations::update_location,
        crate::handlers::locations::delete_location,

        crate::handlers::amavasyas::create_amavasya,
        crate::handlers::amavasyas::list_amavasyas,
        crate::handlers::amavasyas::update_amavasya,
        crate::handlers::amavasyas::delete_amavasya,

        crate::handlers::attendance::assign,
        crate::handlers::attendance::bulk_assign,
        crate::handlers::attendance::list_assignments,
        crate::handlers::attendance::remove_assignment,
        crate::handlers::attendance::user_attendance,

        crate::handlers::dashboard::dashboard,
    ),
    components(
        schemas(
            crate::error::ApiError,
            crate::response::MessageEnvelope,
            PaginationMeta,

            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::RefreshRequest,
            crate::handlers::auth::AuthData,
            crate::handlers::auth::TokenPair,
            crate::handlers::auth::UserResponse,
            crate::handlers::auth::CurrentUserData,

            crate::handlers::users::CreateUserRequest,
            crate::handlers::users::UpdateUserRequest,
            crate::handlers::users::UserListItem,

            crate::models::Role,
            crate::handlers::roles::CreateRoleRequest,
            crate::handlers::roles::UpdateRoleRequest,

            crate::models::Activity,
            crate::handlers::activities::CreateActivityRequest,
            crate::handlers::activities::UpdateActivityRequest,

            crate::models::Permission,
            crate::handlers::permissions::CreatePermissionRequest,
            crate::handlers::permissions::UpdatePermissionRequest,

            crate::authz::ActivityPermissions,
            crate::handlers::role_activity_permissions::SetMappingRequest,
            crate::handlers::role_activity_permissions::MappingResponse,

            crate::models::Location,
            crate::handlers::locations::CreateLocationRequest,
            crate::handlers::locations::UpdateLocationRequest,

            crate::models::Amavasya,
            crate::handlers::amavasyas::CreateAmavasyaRequest,
            crate::handlers::amavasyas::UpdateAmavasyaRequest,

            crate::models::AmavasyaUserLocation,
            crate::attendance::AttendanceStatus,
            crate::attendance::EventAttendance,
            crate::attendance::AttendanceReport,
            crate::handlers::attendance::AssignRequest,
            crate::handlers::attendance::BulkAssignRequest,
            crate::handlers::attendance::BulkAssignData,
            crate::handlers::attendance::AssignmentListItem,

            crate::handlers::dashboard::MonthlyAttendance,
            crate::handlers::dashboard::DashboardData,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "JWT access token obtained from /auth/login.\n\
                            Include in requests as: `Authorization: Bearer <token>`",
                        ))
                        .build(),
                ),
            );
        }

        openapi.security = Some(vec![]);
    }
}

pub fn swagger_router() -> Router {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Sevak API");
        assert_eq!(spec.info.version, "1.0.0");
    }

    #[test]
    fn test_openapi_has_security_scheme() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("components should exist");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn test_openapi_has_tags() {
        let spec = ApiDoc::openapi();
        let tags = spec.tags.expect("tags should exist");
        assert!(tags.iter().any(|t| t.name == "Attendance"));
        assert!(tags.iter().any(|t| t.name == "Role Permissions"));
    }
}

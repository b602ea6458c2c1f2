//! Sevak - role-based back office for Amavasya attendance tracking.

pub mod attendance;
pub mod auth;
pub mod authz;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod helpers;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod pagination;
pub mod response;
pub mod schema;
pub mod telemetry;

use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};

use diesel::r2d2::{self, ConnectionManager};
use diesel::PgConnection;
use std::sync::Arc;
use std::time::Duration;

use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use auth::jwt::JwtKeys;
use auth::lockout::LockoutManager;
use auth::password::PasswordPolicy;
use cache::{create_redis_pool, TokenRevocationList};
use middleware::{
    abac::{actions, activities, RequiredPermission},
    metrics::metrics_middleware,
    rate_limit::{
        auth_rate_limit_middleware, rate_limit_middleware, RateLimitConfig, RateLimitState,
    },
    request_id::request_id_middleware,
};
use telemetry::MetricsState;

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub rate_limit: RateLimitState,
    pub jwt_keys: Arc<JwtKeys>,
    pub token_revocation: Arc<TokenRevocationList>,
    pub lockout: Arc<LockoutManager>,
    pub password_policy: PasswordPolicy,
    pub password_hash_cost: u32,
    pub metrics: MetricsState,
}

impl AppState {
    pub fn new(db_pool: DbPool, redis_pool: Option<deadpool_redis::Pool>, config: &Config) -> Self {
        let rate_limit = if config.security.rate_limiting_enabled {
            RateLimitState::with_config(
                RateLimitConfig::new(config.security.rate_limit_requests_per_minute, 60),
                RateLimitConfig::strict(),
            )
        } else {
            RateLimitState::disabled()
        };

        let jwt_keys = JwtKeys::from_env_with_expiry(
            config.jwt.access_token_expiry_secs,
            config.jwt.refresh_token_expiry_secs,
            config.jwt.issuer.clone(),
            config.jwt.audience.clone(),
        );

        let redis_pool = redis_pool.or_else(|| create_redis_pool(&config.redis));
        let token_revocation = Arc::new(TokenRevocationList::new(redis_pool.clone()));
        let lockout = Arc::new(LockoutManager::new(
            redis_pool,
            config.security.max_failed_login_attempts,
            config.security.lockout_duration_mins,
        ));

        let password_policy = PasswordPolicy::new(
            config.security.min_password_length,
            config.security.require_password_complexity,
        );

        let metrics = MetricsState::new(config.telemetry.metrics_enabled);

        Self {
            db_pool,
            rate_limit,
            jwt_keys: Arc::new(jwt_keys),
            token_revocation,
            lockout,
            password_policy,
            password_hash_cost: config.security.password_hash_cost,
            metrics,
        }
    }
}

pub fn create_router(state: AppState, config: &config::Config) -> Router {
    let cors = build_cors_layer(config);
    let body_limit = RequestBodyLimitLayer::new(config.server.max_body_size);

    #[allow(deprecated)]
    let timeout = TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let rate_limit_state = state.rate_limit.clone();
    let metrics_state = state.metrics.clone();

    // Gate a route group behind a single-action permission check.
    let guard = |router: Router<AppState>, action: &'static str, activity: &'static str| {
        router.route_layer(axum_middleware::from_fn_with_state(
            (state.clone(), RequiredPermission::new(action, activity)),
            middleware::abac::authorize_user,
        ))
    };

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check_simple))
        .route("/health/status", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::ready_check))
        .route("/health/live", get(handlers::health::live_check))
        .route(
            "/metrics",
            get(telemetry::metrics_handler).with_state(metrics_state),
        )
        .with_state(state.clone());

    let auth_routes = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh_token))
        .layer(axum_middleware::from_fn(auth_rate_limit_middleware))
        .with_state(state.clone());

    // Authenticated but not permission-gated: session management plus the
    // permission matrix the UI bootstraps from.
    let session_routes = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::get_current_user))
        .route("/auth/permissions", get(handlers::auth::get_own_permissions))
        .route(
            "/amavasyaUserLocation/permission/{role_id}",
            get(handlers::role_activity_permissions::role_permission_view),
        );

    let users_routes = guard(
        Router::new()
            .route("/users", get(handlers::users::list_users))
            .route("/users/{user_id}", get(handlers::users::get_user)),
        actions::VIEW,
        activities::USERS,
    )
    .merge(guard(
        Router::new().route("/users", post(handlers::users::create_user)),
        actions::ADD,
        activities::USERS,
    ))
    .merge(guard(
        Router::new().route("/users/{user_id}", put(handlers::users::update_user)),
        actions::EDIT,
        activities::USERS,
    ))
    .merge(guard(
        Router::new().route("/users/{user_id}", delete(handlers::users::delete_user)),
        actions::DELETE,
        activities::USERS,
    ));

    let roles_routes = guard(
        Router::new().route("/roles", get(handlers::roles::list_roles)),
        actions::VIEW,
        activities::ROLES,
    )
    .merge(guard(
        Router::new().route("/roles", post(handlers::roles::create_role)),
        actions::ADD,
        activities::ROLES,
    ))
    .merge(guard(
        Router::new().route("/roles/{role_id}", put(handlers::roles::update_role)),
        actions::EDIT,
        activities::ROLES,
    ))
    .merge(guard(
        Router::new().route("/roles/{role_id}", delete(handlers::roles::delete_role)),
        actions::DELETE,
        activities::ROLES,
    ));

    let activities_routes = guard(
        Router::new().route("/activities", get(handlers::activities::list_activities)),
        actions::VIEW,
        activities::ACTIVITIES,
    )
    .merge(guard(
        Router::new().route("/activities", post(handlers::activities::create_activity)),
        actions::ADD,
        activities::ACTIVITIES,
    ))
    .merge(guard(
        Router::new().route(
            "/activities/{activity_id}",
            put(handlers::activities::update_activity),
        ),
        actions::EDIT,
        activities::ACTIVITIES,
    ))
    .merge(guard(
        Router::new().route(
            "/activities/{activity_id}",
            delete(handlers::activities::delete_activity),
        ),
        actions::DELETE,
        activities::ACTIVITIES,
    ));

    let permissions_routes = guard(
        Router::new().route("/permissions", get(handlers::permissions::list_permissions)),
        actions::VIEW,
        activities::PERMISSIONS,
    )
    .merge(guard(
        Router::new().route(
            "/permissions",
            post(handlers::permissions::create_permission),
        ),
        actions::ADD,
        activities::PERMISSIONS,
    ))
    .merge(guard(
        Router::new().route(
            "/permissions/{permission_id}",
            put(handlers::permissions::update_permission),
        ),
        actions::EDIT,
        activities::PERMISSIONS,
    ))
    .merge(guard(
        Router::new().route(
            "/permissions/{permission_id}",
            delete(handlers::permissions::delete_permission),
        ),
        actions::DELETE,
        activities::PERMISSIONS,
    ));

    let mapping_routes = guard(
        Router::new().route(
            "/roleActivityPermissions",
            get(handlers::role_activity_permissions::list_mappings),
        ),
        actions::VIEW,
        activities::ROLES,
    )
    .merge(guard(
        Router::new().route(
            "/roleActivityPermissions",
            post(handlers::role_activity_permissions::set_mapping),
        ),
        actions::EDIT,
        activities::ROLES,
    ))
    .merge(guard(
        Router::new().route(
            "/roleActivityPermissions/{mapping_id}",
            delete(handlers::role_activity_permissions::delete_mapping),
        ),
        actions::DELETE,
        activities::ROLES,
    ));

    let locations_routes = guard(
        Router::new().route("/locations", get(handlers::locations::list_locations)),
        actions::VIEW,
        activities::LOCATIONS,
    )
    .merge(guard(
        Router::new().route("/locations", post(handlers::locations::create_location)),
        actions::ADD,
        activities::LOCATIONS,
    ))
    .merge(guard(
        Router::new().route(
            "/locations/{location_id}",
            put(handlers::locations::update_location),
        ),
        actions::EDIT,
        activities::LOCATIONS,
    ))
    .merge(guard(
        Router::new().route(
            "/locations/{location_id}",
            delete(handlers::locations::delete_location),
        ),
        actions::DELETE,
        activities::LOCATIONS,
    ));

    let amavasya_routes = guard(
        Router::new().route("/amavasyas", get(handlers::amavasyas::list_amavasyas)),
        actions::VIEW,
        activities::AMAVASYA,
    )
    .merge(guard(
        Router::new().route("/amavasyas", post(handlers::amavasyas::create_amavasya)),
        actions::ADD,
        activities::AMAVASYA,
    ))
    .merge(guard(
        Router::new().route(
            "/amavasyas/{amavasya_id}",
            put(handlers::amavasyas::update_amavasya),
        ),
        actions::EDIT,
        activities::AMAVASYA,
    ))
    .merge(guard(
        Router::new().route(
            "/amavasyas/{amavasya_id}",
            delete(handlers::amavasyas::delete_amavasya),
        ),
        actions::DELETE,
        activities::AMAVASYA,
    ));

    let attendance_routes = guard(
        Router::new().route(
            "/amavasyaUserLocation",
            get(handlers::attendance::list_assignments),
        ),
        actions::VIEW,
        activities::AMAVASYA,
    )
    .merge(guard(
        Router::new()
            .route("/amavasyaUserLocation", post(handlers::attendance::assign))
            .route(
                "/amavasyaUserLocation/bulk",
                post(handlers::attendance::bulk_assign),
            ),
        actions::ADD,
        activities::AMAVASYA,
    ))
    .merge(guard(
        Router::new().route(
            "/amavasyaUserLocation/{record_id}",
            delete(handlers::attendance::remove_assignment),
        ),
        actions::DELETE,
        activities::AMAVASYA,
    ))
    .merge(guard(
        Router::new().route(
            "/amavasyaUserLocation/userAttendance/{user_id}",
            get(handlers::attendance::user_attendance),
        ),
        actions::VIEW,
        activities::REPORTS,
    ));

    let dashboard_routes = guard(
        Router::new().route("/dashboard", get(handlers::dashboard::dashboard)),
        actions::VIEW,
        activities::DASHBOARD,
    );

    let protected_routes = session_routes
        .merge(users_routes)
        .merge(roles_routes)
        .merge(activities_routes)
        .merge(permissions_routes)
        .merge(mapping_routes)
        .merge(locations_routes)
        .merge(amavasya_routes)
        .merge(attendance_routes)
        .merge(dashboard_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ))
        .with_state(state.clone());

    let docs_routes = openapi::swagger_router();

    Router::new()
        .merge(docs_routes)
        .merge(public_routes)
        .merge(auth_routes)
        .merge(protected_routes)
        .fallback(fallback_handler)
        .layer(axum_middleware::from_fn(metrics_middleware))
        .layer(axum_middleware::from_fn(rate_limit_middleware))
        .layer(axum::Extension(rate_limit_state))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(timeout)
        .layer(body_limit)
        .layer(cors)
}

async fn fallback_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"success": false, "status": 404, "message": "Not found"})),
    )
}

fn build_cors_layer(config: &config::Config) -> CorsLayer {
    use axum::http::header::HeaderName;
    use axum::http::Method;

    let is_wildcard_origin = config.cors.allowed_origins.contains(&"*".to_string())
        || config.cors.allowed_origins.is_empty();

    let methods: Vec<Method> = config
        .cors
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();

    let headers: Vec<HeaderName> = config
        .cors
        .allowed_headers
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();

    if config.cors.allow_credentials && is_wildcard_origin {
        CorsLayer::new()
            .allow_origin(tower_http::cors::AllowOrigin::mirror_request())
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true)
            .max_age(Duration::from_secs(config.cors.max_age_secs))
    } else if config.cors.allow_credentials {
        let origins: Vec<_> = config
            .cors
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true)
            .max_age(Duration::from_secs(config.cors.max_age_secs))
    } else {
        let cors = if is_wildcard_origin {
            CorsLayer::new().allow_origin(Any)
        } else {
            let origins: Vec<_> = config
                .cors
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new().allow_origin(origins)
        };

        cors.allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(false)
            .max_age(Duration::from_secs(config.cors.max_age_secs))
    }
}

pub fn create_db_pool(config: &config::Config) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(&config.database.url);
    r2d2::Pool::builder()
        .max_size(config.database.max_connections)
        .min_idle(Some(config.database.min_connections))
        .connection_timeout(Duration::from_secs(config.database.connection_timeout_secs))
        .idle_timeout(Some(Duration::from_secs(config.database.idle_timeout_secs)))
        .build(manager)
        .expect("Failed to create database pool")
}

pub fn create_db_pool_with_url(database_url: &str) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder()
        .max_size(10)
        .min_idle(Some(2))
        .connection_timeout(Duration::from_secs(30))
        .idle_timeout(Some(Duration::from_secs(600)))
        .build(manager)
        .expect("Failed to create database pool")
}

/// Pool that connects on first use; lets the router be exercised without a
/// live database.
pub fn create_db_pool_lazy(database_url: &str) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder()
        .max_size(10)
        .min_idle(Some(0))
        .connection_timeout(Duration::from_secs(5))
        .build_unchecked(manager)
}

pub fn init_tracing(config: &config::Config) {
    telemetry::init_telemetry(config);
}

pub use config::Config;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_build_cors_layer_wildcard() {
        let mut config = Config::default_for_testing();
        config.cors.allowed_origins = vec!["*".to_string()];
        let _ = build_cors_layer(&config);
    }

    #[test]
    fn test_build_cors_layer_specific_origins() {
        let mut config = Config::default_for_testing();
        config.cors.allowed_origins = vec![
            "http://localhost:3000".to_string(),
            "https://example.com".to_string(),
        ];
        let _ = build_cors_layer(&config);
    }
}

//! Router-level checks that need no live database: health endpoints, the
//! error envelope, and the authentication gate in front of protected routes.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use tower::ServiceExt;

use sevak::{auth::jwt::JwtKeys, create_db_pool_lazy, create_router, AppState, Config};

static TEST_JWT_PRIVATE_KEY: Lazy<String> = Lazy::new(|| {
    let (private_key, _) = JwtKeys::generate_key_pair();
    private_key
});

fn test_app() -> axum::Router {
    std::env::set_var("JWT_PRIVATE_KEY", TEST_JWT_PRIVATE_KEY.as_str());

    let config = Config::default_for_testing();
    let db_pool = create_db_pool_lazy(&config.database.url);
    let state = AppState::new(db_pool, None, &config);
    create_router(state, &config)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check_answers_ok() {
    let app = test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_status_reports_service_name() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["service"], "sevak");
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn metrics_endpoint_reports_unavailable_when_disabled() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn unknown_route_answers_envelope_404() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/no-such-route")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn protected_route_requires_token() {
    let app = test_app();

    let response = app
        .oneshot(Request::builder().uri("/users").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Missing authorization header");
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/amavasyaUserLocation")
                .header("Authorization", "Bearer not.a.token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Invalid or expired token");
}

#[tokio::test]
async fn malformed_auth_header_is_rejected() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/dashboard")
                .header("Authorization", "Token abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn response_carries_request_id() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "trace-me-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "trace-me-42"
    );
}

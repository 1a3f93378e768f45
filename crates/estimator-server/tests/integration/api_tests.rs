use axum::body::Body;
use axum::http::{Method, StatusCode};
use tower::ServiceExt;

use estimator_server::{Config, Modules};

use crate::integration::common::{
    body_json, get_request, request, setup_test_app, setup_test_app_with, test_modules,
};

#[tokio::test]
async fn root_returns_service_info() {
    let app = setup_test_app();

    let response = app.oneshot(get_request("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Backend API is running 🚀");
    assert_eq!(json["environment"], "development");
    let timestamp = json["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn root_reports_configured_environment() {
    let config = Config {
        environment: "production".to_string(),
        ..Config::default()
    };
    let app = setup_test_app_with(config, Modules::new());

    let response = app.oneshot(get_request("/")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["environment"], "production");
}

#[tokio::test]
async fn health_returns_uptime() {
    let app = setup_test_app();

    let response = app.oneshot(get_request("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "OK");
    let uptime = json["uptime"].as_f64().unwrap();
    assert!(uptime >= 0.0);
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = setup_test_app();

    let response = app.oneshot(get_request("/api/nonexistent")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(
        json,
        serde_json::json!({
            "success": false,
            "error": "Route not found",
            "path": "/api/nonexistent"
        })
    );
}

#[tokio::test]
async fn not_found_path_keeps_query_string() {
    let app = setup_test_app();

    let response = app
        .oneshot(request(Method::DELETE, "/nope?page=2").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["path"], "/nope?page=2");
}

#[tokio::test]
async fn unmatched_path_inside_module_returns_404() {
    let app = setup_test_app();

    let response = app
        .oneshot(get_request("/api/vendors/7/contacts"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["path"], "/api/vendors/7/contacts");
}

#[tokio::test]
async fn unmounted_module_prefix_returns_404() {
    let app = setup_test_app_with(Config::default(), Modules::new());

    let response = app.oneshot(get_request("/api/audit/logs")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wrong_method_on_system_route_returns_404() {
    let app = setup_test_app();

    let response = app
        .oneshot(request(Method::POST, "/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(
        json,
        serde_json::json!({
            "success": false,
            "error": "Route not found",
            "path": "/api/health",
        })
    );
}

#[tokio::test]
async fn wrong_method_on_root_returns_404() {
    let app = setup_test_app();

    let response = app
        .oneshot(request(Method::DELETE, "/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], "Route not found");
}

#[tokio::test]
async fn wrong_method_inside_module_returns_404() {
    let app = setup_test_app();

    let response = app
        .oneshot(request(Method::DELETE, "/api/vendors/42").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Route not found");
    assert_eq!(json["path"], "/api/vendors/42");
}

#[tokio::test]
async fn trailing_slash_reaches_route() {
    let app = setup_test_app();

    let response = app.oneshot(get_request("/api/health/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "OK");
}

#[tokio::test]
async fn trailing_slash_reaches_module_route() {
    let app = setup_test_app();

    let response = app.oneshot(get_request("/api/vendors/42/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["id"], "42");
}

#[tokio::test]
async fn module_receives_remaining_path() {
    let app = setup_test_app();

    let response = app.oneshot(get_request("/api/vendors/42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["id"], "42");
    assert_eq!(json["original"], "/api/vendors/42");
}

#[tokio::test]
async fn handler_error_status_is_propagated() {
    let app = setup_test_app();

    let response = app
        .oneshot(get_request("/api/auth/forbidden"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let json = body_json(response).await;
    assert_eq!(
        json,
        serde_json::json!({ "success": false, "error": "Access denied" })
    );
}

#[tokio::test]
async fn handler_error_without_status_is_500() {
    let app = setup_test_app();

    let response = app.oneshot(get_request("/api/estimations/fail")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "calculation failed");
}

#[tokio::test]
async fn handler_panic_is_rendered_as_500() {
    let app = setup_test_app();

    let response = app.oneshot(get_request("/api/products/panic")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Internal Server Error");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup_test_app_with(Config::default(), test_modules());

    let response = app.oneshot(get_request("/api/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["paths"]["/api/health"].is_object());
}

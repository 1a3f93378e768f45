use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{ConnectInfo, OriginalUri, Path};
use axum::http::{Method, Request, Response};
use axum::routing::{get, post};
use http_body_util::BodyExt;
use serde::Deserialize;
use serde_json::{Value, json};

use estimator_server::{
    ApiError, App, AppError, AppState, Config, Cookies, Module, Modules, ParsedBody, app,
};

pub const CLIENT: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7)), 50_000);

/// Full application with default config and the fake route modules mounted.
pub fn setup_test_app() -> App {
    setup_test_app_with(Config::default(), test_modules())
}

pub fn setup_test_app_with(config: Config, modules: Modules) -> App {
    app(Arc::new(AppState::new(config)), modules)
}

/// Request builder carrying connection info for `CLIENT`, as `axum::serve`
/// would attach it.
pub fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    request_from(CLIENT, method, uri)
}

pub fn request_from(
    client: SocketAddr,
    method: Method,
    uri: &str,
) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(client))
}

pub fn get_request(uri: &str) -> Request<Body> {
    request(Method::GET, uri).body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(body.to_vec()).unwrap()
}

async fn explode() -> &'static str {
    panic!("handler blew up")
}

#[derive(Debug, Deserialize)]
struct NewVendor {
    name: String,
}

/// Stand-ins for the external route modules.
pub fn test_modules() -> Modules {
    let auth = Router::new().route(
        "/forbidden",
        get(|| async { Err::<(), _>(ApiError::forbidden("Access denied")) }),
    );

    let vendors = Router::new()
        .route("/", post(|ParsedBody(body): ParsedBody| async move { axum::Json(body) }))
        .route(
            "/typed",
            post(|ParsedBody(vendor): ParsedBody<NewVendor>| async move {
                axum::Json(json!({ "name": vendor.name }))
            }),
        )
        .route(
            "/raw",
            post(|axum::Json(body): axum::Json<Value>| async move { axum::Json(body) }),
        )
        .route(
            "/{id}",
            get(
                |Path(id): Path<String>, OriginalUri(uri): OriginalUri| async move {
                    axum::Json(json!({ "id": id, "original": uri.to_string() }))
                },
            ),
        );

    let dashboard = Router::new().route(
        "/cookies",
        get(|cookies: Cookies| async move {
            let map: BTreeMap<String, String> = cookies
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            axum::Json(map)
        }),
    );

    let products = Router::new().route("/panic", get(explode));

    let estimations = Router::new().route(
        "/fail",
        get(|| async {
            Err::<(), _>(ApiError::from(AppError::Generic(
                "calculation failed".into(),
            )))
        }),
    );

    Modules::new()
        .mount(Module::Auth, auth)
        .mount(Module::Vendors, vendors)
        .mount(Module::Dashboard, dashboard)
        .mount(Module::Products, products)
        .mount(Module::Estimations, estimations)
}

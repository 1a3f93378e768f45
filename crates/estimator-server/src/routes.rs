use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use axum::Router;
use axum::extract::{OriginalUri, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;
use chrono::{SecondsFormat, Utc};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::NormalizePath;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::body::{BodyLimit, parse_body};
use crate::cookies::parse_cookies;
use crate::dto::{HealthResponse, NotFoundResponse, RootResponse};
use crate::error::handle_panic;
use crate::logging::{log_request, path_and_query};
use crate::openapi::ApiDoc;
use crate::rate_limit::{RateLimiter, rate_limit};
use crate::state::AppState;

const ROOT_MESSAGE: &str = "Backend API is running 🚀";

/// The fully layered application, ready for `axum::serve`.
pub type App = NormalizePath<Router>;

// ---------------------------------------------------------------------------
// Route modules
// ---------------------------------------------------------------------------

/// The route modules mounted under `/api`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Module {
    Auth,
    Dashboard,
    Vendors,
    Products,
    Components,
    Estimations,
    /// Estimation history.
    Riwayat,
    /// Currency exchange rates.
    Kurs,
    Audit,
}

impl Module {
    /// Every module, in mount order.
    pub const ALL: [Module; 9] = [
        Module::Auth,
        Module::Dashboard,
        Module::Vendors,
        Module::Products,
        Module::Components,
        Module::Estimations,
        Module::Riwayat,
        Module::Kurs,
        Module::Audit,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            Module::Auth => "/api/auth",
            Module::Dashboard => "/api/dashboard",
            Module::Vendors => "/api/vendors",
            Module::Products => "/api/products",
            Module::Components => "/api/components",
            Module::Estimations => "/api/estimations",
            Module::Riwayat => "/api/riwayat",
            Module::Kurs => "/api/kurs",
            Module::Audit => "/api/audit",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_start_matches("/api/"))
    }
}

/// Routers supplied by the route modules, keyed by the module they implement.
///
/// Each router sees paths relative to its prefix (`/api/vendors/42` reaches
/// the vendors router as `/42`); handlers that need the full URL can use
/// `OriginalUri`.
///
/// Errors only get the `{ "success": false, "error": ... }` envelope when they
/// go through [`ApiError`](crate::error::ApiError). Handlers should read
/// bodies with [`ParsedBody`](crate::body::ParsedBody) rather than
/// `axum::Json`, and map `Path`/`Query` rejections into `ApiError` (e.g. by
/// taking `Result<Path<T>, PathRejection>`), otherwise axum answers with its
/// own plain-text rejection.
#[derive(Default)]
pub struct Modules {
    routers: BTreeMap<Module, Router<Arc<AppState>>>,
}

impl Modules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `router` for `module`, replacing any router mounted before.
    pub fn mount(mut self, module: Module, router: Router<Arc<AppState>>) -> Self {
        self.routers.insert(module, router);
        self
    }

    pub fn is_mounted(&self, module: Module) -> bool {
        self.routers.contains_key(&module)
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the router: static routes, API docs, mounted modules and the 404 fallback.
pub fn router(state: Arc<AppState>, mut modules: Modules) -> Router {
    let mut api = Router::new()
        .route("/", get(root))
        .route("/api/health", get(health))
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()));

    for module in Module::ALL {
        if let Some(routes) = modules.routers.remove(&module) {
            tracing::debug!(module = %module, prefix = module.prefix(), "Mounting route module");
            api = api.nest(module.prefix(), routes.method_not_allowed_fallback(not_found));
        }
    }

    // A known path with the wrong method is still "no route".
    api.method_not_allowed_fallback(not_found)
        .fallback(not_found)
        .with_state(state)
}

/// Build the full application: [`router`] wrapped in the middleware stack.
///
/// Outermost first: trailing-slash normalization, CORS, panic capture, body
/// parsing, cookie parsing, rate limiting, request logging. Normalization
/// wraps the router from outside since it has to run before routing.
pub fn app(state: Arc<AppState>, modules: Modules) -> App {
    let limiter = RateLimiter::new(state.config.rate_limit.clone());
    let body_limit = BodyLimit(state.config.body_limit);

    let router = router(state, modules)
        .layer(middleware::from_fn(log_request))
        .layer(middleware::from_fn_with_state(limiter, rate_limit))
        .layer(middleware::from_fn(parse_cookies))
        .layer(middleware::from_fn_with_state(body_limit, parse_body))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::very_permissive());

    NormalizePath::trim_trailing_slash(router)
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = RootResponse),
    ),
    tag = "system"
)]
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(RootResponse {
        success: true,
        message: ROOT_MESSAGE.to_string(),
        environment: state.config.environment.clone(),
        timestamp: timestamp(),
    })
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "OK".to_string(),
        uptime: state.uptime(),
        timestamp: timestamp(),
    })
}

pub async fn not_found(OriginalUri(uri): OriginalUri) -> impl IntoResponse {
    let body = NotFoundResponse {
        success: false,
        error: "Route not found".to_string(),
        path: path_and_query(&uri).to_string(),
    };
    (StatusCode::NOT_FOUND, axum::Json(body))
}

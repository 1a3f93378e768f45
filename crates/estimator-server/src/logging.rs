use axum::body::Body;
use axum::extract::OriginalUri;
use axum::http::{Request, Uri};
use axum::middleware::Next;
use axum::response::Response;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// Directives from `RUST_LOG` apply on top of `estimator_server=info`, so
/// request logs show up without any configuration.
pub fn init() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("estimator_server=info".parse()?))
        .with_target(false)
        .init();
    Ok(())
}

/// Path and query of `uri`, as the client sent it.
pub fn path_and_query(uri: &Uri) -> &str {
    uri.path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path())
}

/// Middleware logging the method and original URL of every request.
pub async fn log_request(request: Request<Body>, next: Next) -> Response {
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map(|OriginalUri(uri)| uri)
        .unwrap_or_else(|| request.uri());

    tracing::info!(
        method = %request.method(),
        url = %path_and_query(uri),
        "Request"
    );

    next.run(request).await
}

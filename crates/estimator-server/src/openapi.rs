use utoipa::OpenApi;

/// OpenAPI document for the endpoints served by the bootstrap itself.
///
/// Route modules are mounted from outside and document their own paths.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Estimator API",
        version = "0.1.0",
        description = "Vendor, product and component cost estimation backend."
    ),
    paths(crate::routes::root, crate::routes::health),
    components(schemas(
        crate::dto::RootResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
        crate::dto::NotFoundResponse,
    )),
    tags(
        (name = "system", description = "Service information and health"),
    )
)]
pub struct ApiDoc;

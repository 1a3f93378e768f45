use serde::Serialize;

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RootResponse {
    pub success: bool,
    pub message: String,
    pub environment: String,
    /// ISO-8601 UTC timestamp with millisecond precision.
    pub timestamp: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// Seconds since the process started.
    pub uptime: f64,
    pub timestamp: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct NotFoundResponse {
    pub success: bool,
    pub error: String,
    /// Original request path, including the query string.
    pub path: String,
}

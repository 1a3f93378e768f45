//! REST API bootstrap: middleware stack, system routes and route-module mounting.

pub mod body;
pub mod config;
pub mod cookies;
pub mod dto;
pub mod error;
pub mod logging;
pub mod openapi;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use body::ParsedBody;
pub use config::Config;
pub use cookies::Cookies;
pub use error::{ApiError, AppError};
pub use routes::{App, Module, Modules, app};
pub use state::AppState;

pub mod config;
pub mod models;
pub mod service;

pub use config::{ConfigError, LogFormat, ServiceConfig};
pub use service::{AppState, ApiError, build_router, create_app};
pub use models::*;

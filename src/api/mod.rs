//! HTTP API handlers

pub mod analyze;
pub mod error;
pub mod health;

pub use analyze::analyze_routes;
pub use error::{ApiError, ApiResult};
pub use health::health_routes;

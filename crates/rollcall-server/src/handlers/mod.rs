//! HTTP handlers, one module per resource.

pub mod attendance;
pub mod classes;
pub mod dashboard;
pub mod devices;
pub mod error;
pub mod extract;
pub mod health;
pub mod students;

pub use error::{ApiError, OptionExt, ResultExt};
pub use extract::{JsonBody, PathParam, QueryParams};

use axum::http::Uri;
use serde::Serialize;

/// Acknowledgement with no entity attached
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Fallback for unknown routes
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("No route for {}", uri.path()))
}

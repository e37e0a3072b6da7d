//! HTTP error mapping for the API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::AvalancheError;

/// Wrapper that turns crate errors into JSON error responses
#[derive(Debug)]
pub struct ApiError(pub AvalancheError);

impl From<AvalancheError> for ApiError {
    fn from(err: AvalancheError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AvalancheError::UnknownModel(_)
            | AvalancheError::Validation(_)
            | AvalancheError::Shape { .. }
            | AvalancheError::MissingColumn(_) => StatusCode::BAD_REQUEST,
            AvalancheError::DataUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(detail = %self.0, "internal server error");
            "An internal error occurred".to_string()
        } else {
            self.0.to_string()
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

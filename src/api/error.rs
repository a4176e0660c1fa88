use crate::catalog::CatalogError;
use crate::session::ACCESS_DENIED;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
}

#[derive(Debug, PartialEq)]
pub enum ApiError {
    /// No valid ID token
    Unauthorized,
    /// Signed in, but not an admin
    Forbidden,
    NotFound(String),
    Validation(String),
    /// Firestore rejected or failed the call; carries the user-facing message
    Database(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => codes::UNAUTHORIZED,
            ApiError::Forbidden => codes::FORBIDDEN,
            ApiError::NotFound(_) => codes::NOT_FOUND,
            ApiError::Validation(_) => codes::VALIDATION_ERROR,
            ApiError::Database(_) => codes::DATABASE_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Unauthorized => "Anmeldung erforderlich.".to_string(),
            ApiError::Forbidden => ACCESS_DENIED.to_string(),
            ApiError::NotFound(msg) | ApiError::Validation(msg) | ApiError::Database(msg) => {
                msg.clone()
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for ApiError {}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Database { .. } => ApiError::Database(err.to_string()),
            CatalogError::Invalid(msg) => ApiError::Validation(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(format!("Ungültige Anfrage: {}", rejection.body_text()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: ErrorDetails {
                code: self.error_code().to_string(),
                message: self.message(),
            },
        };
        (self.status_code(), Json(body)).into_response()
    }
}

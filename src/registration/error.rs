//! Error types for the symposium registration service

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::registration::auth::AuthFailure;

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Authentication failed: {0}")]
    AuthError(AuthFailure),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("You do not have admin access.")]
    NotAdmin,

    #[error("Failed to read credentials file: {0}")]
    CredentialsFileError(#[from] std::io::Error),

    #[error("Failed to parse document: {0}")]
    DocumentParseError(#[from] serde_json::Error),

    #[error("Firebase Storage API error: {0}")]
    FirebaseApiError(String),

    #[error("Identity provider error: {0}")]
    ProviderError(String),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Registration is closed for this event")]
    RegistrationClosed,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Upload rejected: {0}")]
    UploadRejected(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),
}

impl RegistrationError {
    pub fn status(&self) -> StatusCode {
        match self {
            RegistrationError::ValidationError(_) | RegistrationError::UploadRejected(_) => {
                StatusCode::BAD_REQUEST
            }
            RegistrationError::AuthError(_) | RegistrationError::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            RegistrationError::NotAdmin => StatusCode::FORBIDDEN,
            RegistrationError::EventNotFound(_) | RegistrationError::MessageNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            RegistrationError::RegistrationClosed => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text shown to the visitor. Store and provider failures stay generic.
    pub fn public_message(&self) -> String {
        match self {
            RegistrationError::AuthError(failure) => failure.to_string(),
            RegistrationError::EventNotFound(_) => "Event not found".to_string(),
            RegistrationError::MessageNotFound(_) => "Message not found".to_string(),
            RegistrationError::ValidationError(msg)
            | RegistrationError::UploadRejected(msg)
            | RegistrationError::UploadFailed(msg) => msg.clone(),
            RegistrationError::Unauthenticated
            | RegistrationError::NotAdmin
            | RegistrationError::RegistrationClosed => self.to_string(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

// Malformed bodies and query strings are reported like any other invalid form
impl From<JsonRejection> for RegistrationError {
    fn from(rejection: JsonRejection) -> Self {
        RegistrationError::ValidationError(rejection.body_text())
    }
}

impl From<QueryRejection> for RegistrationError {
    fn from(rejection: QueryRejection) -> Self {
        RegistrationError::ValidationError(rejection.body_text())
    }
}

impl IntoResponse for RegistrationError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

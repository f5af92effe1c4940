//! Failure classes of a relay call and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::models::ErrorBody;

#[derive(Error, Debug)]
pub enum RelayError {
    /// Role or message missing or empty
    #[error("Role and message are required")]
    MissingInput,

    #[error("Invalid role selected")]
    InvalidRole,

    /// Upstream credential not present in the environment
    #[error("GROQ_API_KEY not configured")]
    MissingCredential,

    /// Non-success answer from the completions endpoint
    #[error("Groq API error: {status_text}")]
    Upstream { status: u16, status_text: String },

    /// The upstream call could not be made or its body could not be read
    #[error("Internal server error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MissingInput | RelayError::InvalidRole => StatusCode::BAD_REQUEST,
            RelayError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            RelayError::MissingCredential
            | RelayError::Transport(_)
            | RelayError::Config(_)
            | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Caller-side problem, never worth retrying unchanged.
    pub fn is_client_error(&self) -> bool {
        matches!(self, RelayError::MissingInput | RelayError::InvalidRole)
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::io;
use thiserror::Error;

use crate::telephony::TelephonyError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: Environment variable '{0}' not found")]
    MissingEnvVar(String),

    #[error("Configuration error: invalid value for '{key}': {reason}")]
    InvalidEnvVar { key: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Telephony error: {0}")]
    Telephony(#[from] TelephonyError),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Network error binding server: {0}")]
    ServerBind(io::Error),

    #[error("Other I/O error: {0}")]
    Io(#[from] io::Error),
}

impl AppError {
    pub fn invalid_env(key: &str, reason: impl ToString) -> Self {
        Self::InvalidEnvVar {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::MissingField(_) => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
            AppError::Telephony(ref e) => {
                tracing::error!(error = %e, "telephony request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "message": "Error sending notification",
                        "error": e.to_string(),
                    })),
                )
                    .into_response()
            }
            _ => {
                tracing::error!(error = %self, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_is_a_client_error() {
        let response = AppError::MissingField("phone").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn telephony_fault_is_a_server_error() {
        let err = TelephonyError::Provider {
            status: 400,
            message: "Invalid 'To' Phone Number".into(),
        };
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn internal_fault_body_hides_the_cause() {
        let err = AppError::Database(sqlx::Error::Protocol("no such table: feedback".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Internal server error");
    }
}

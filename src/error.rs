use std::path::PathBuf;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::AcquireError;

/// Message returned to clients for every failure after validation.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to generate PDF";

#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("URL is required")]
    Validation,

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Page did not reach network idle within {0:?}")]
    RenderTimeout(Duration),

    #[error("Internal fault: {0}")]
    InternalFault(String),
}

impl RenderError {
    /// Stable label used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::Validation => "validation",
            RenderError::InvalidBody(_) => "invalid_body",
            RenderError::Navigation(_) => "navigation",
            RenderError::RenderTimeout(_) => "timeout",
            RenderError::InternalFault(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RenderError::Validation | RenderError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// What the caller is allowed to see. Server-side detail stays in the logs.
    pub fn client_message(&self) -> &'static str {
        match self {
            RenderError::Validation => "URL is required",
            RenderError::InvalidBody(_) => "Invalid request body",
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
}

impl IntoResponse for RenderError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.client_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<AcquireError> for RenderError {
    fn from(err: AcquireError) -> Self {
        RenderError::InternalFault(format!("render permit unavailable: {err}"))
    }
}

impl From<tokio::task::JoinError> for RenderError {
    fn from(err: tokio::task::JoinError) -> Self {
        RenderError::InternalFault(format!("render task failed: {err}"))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_client_errors() {
        assert_eq!(RenderError::Validation.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RenderError::InvalidBody("eof".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert!(RenderError::Validation.is_client_error());
    }

    #[test]
    fn test_render_failures_hide_detail() {
        let failures = [
            RenderError::Navigation("net::ERR_NAME_NOT_RESOLVED".to_string()),
            RenderError::RenderTimeout(Duration::from_secs(60)),
            RenderError::InternalFault("chrome exited".to_string()),
        ];

        for err in failures {
            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(err.client_message(), GENERIC_FAILURE_MESSAGE);
            assert!(!err.is_client_error());
        }
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(RenderError::Validation.kind(), "validation");
        assert_eq!(RenderError::Navigation(String::new()).kind(), "navigation");
        assert_eq!(
            RenderError::RenderTimeout(Duration::from_secs(1)).kind(),
            "timeout"
        );
        assert_eq!(RenderError::InternalFault(String::new()).kind(), "internal");
    }

    #[test]
    fn test_display_keeps_detail_for_logs() {
        let err = RenderError::Navigation("net::ERR_CONNECTION_REFUSED".to_string());
        assert!(err.to_string().contains("ERR_CONNECTION_REFUSED"));
    }
}

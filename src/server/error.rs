//! HTTP error mapping for the analysis service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::{error, warn};
use serde::Serialize;
use thiserror::Error;

use crate::error::AnalystError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Analysis(#[from] AnalystError),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    violations: Option<Vec<String>>,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        let err = match self {
            ApiError::InvalidRequest(_) => return (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ApiError::Analysis(err) => err,
        };

        let status = match err {
            _ if err.is_contract_violation() => StatusCode::BAD_REQUEST,
            AnalystError::UnsupportedMediaType(_) | AnalystError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            AnalystError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, error_code(err))
    }
}

fn error_code(err: &AnalystError) -> &'static str {
    match err {
        AnalystError::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
        AnalystError::Validation(_) => "VALIDATION_ERROR",
        AnalystError::MalformedOutput(_) => "MALFORMED_OUTPUT",
        AnalystError::InvalidOutput(_) => "INVALID_OUTPUT",
        AnalystError::UnexpectedAction(_) => "UNEXPECTED_ACTION",
        AnalystError::RunFailed { .. } => "RUN_FAILED",
        AnalystError::Transport(_) => "TRANSPORT_ERROR",
        AnalystError::Timeout(_) => "TIMEOUT",
        _ => "INTERNAL_ERROR",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            error!("Analysis request failed ({}): {}", code, self);
        } else {
            warn!("Analysis request rejected ({}): {}", code, self);
        }

        let violations = match &self {
            ApiError::Analysis(AnalystError::InvalidOutput(violations)) => Some(violations.clone()),
            ApiError::Analysis(AnalystError::Validation(err)) => Some(err.violations.clone()),
            _ => None,
        };

        let body = ErrorResponse {
            detail: self.to_string(),
            code,
            violations,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::types::RunStatus;
    use std::time::Duration;

    #[test]
    fn test_contract_violations_are_client_errors() {
        for err in [
            AnalystError::MalformedOutput("eof".into()),
            AnalystError::InvalidOutput(vec!["missing".into()]),
            AnalystError::UnexpectedAction("none".into()),
            AnalystError::UnsupportedMediaType("report.docx".into()),
        ] {
            let api_error = ApiError::from(err);
            let (status, code) = api_error.status_and_code();
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_ne!(code, "INTERNAL_ERROR");
        }
    }

    #[test]
    fn test_remote_failures_are_server_errors() {
        let run_failed = ApiError::from(AnalystError::RunFailed {
            status: RunStatus::Failed,
            detail: "rate limit exceeded".into(),
        });
        assert_eq!(run_failed.status_and_code().0, StatusCode::INTERNAL_SERVER_ERROR);

        let transport = ApiError::from(AnalystError::Transport("connection reset".into()));
        assert_eq!(transport.status_and_code().0, StatusCode::INTERNAL_SERVER_ERROR);

        let timeout = ApiError::from(AnalystError::Timeout(Duration::from_secs(120)));
        assert_eq!(timeout.status_and_code().0, StatusCode::GATEWAY_TIMEOUT);

        let config = ApiError::from(AnalystError::Config("no assistant".into()));
        assert_eq!(config.status_and_code(), (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"));
    }
}

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::month::MonthKey;

/// Failure raised by any stage of the activity pipeline.
///
/// Every stage returns this as a typed result; a report is either complete
/// or not produced at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivityError {
    /// A structural field is present but has the wrong shape.
    #[error("malformed activity report: {0}")]
    MalformedReport(String),

    /// A timestamp is unparseable or is not the first instant of a UTC month.
    #[error("invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("empty range: start {start} is after end {end}")]
    EmptyRange { start: MonthKey, end: MonthKey },

    /// Reported counts contradict each other (mount sums, new-client bound).
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("top-N size must be at least 1, got {0}")]
    InvalidTopN(usize),
}

impl ActivityError {
    pub(crate) fn invalid_timestamp(value: &str, reason: impl Into<String>) -> Self {
        ActivityError::InvalidTimestamp {
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

pub enum AppError {
    BadRequest(String),
    Unprocessable(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "bad request: {msg}"),
            AppError::Unprocessable(msg) => write!(f, "unprocessable report: {msg}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => {
                tracing::warn!(error_type = "bad_request", message = %msg, "Responding with 400");
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::Unprocessable(msg) => {
                tracing::warn!(error_type = "unprocessable", message = %msg, "Responding with 422");
                (StatusCode::UNPROCESSABLE_ENTITY, msg)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ActivityError> for AppError {
    fn from(e: ActivityError) -> Self {
        match e {
            ActivityError::EmptyRange { .. } | ActivityError::InvalidTopN(_) => {
                AppError::BadRequest(e.to_string())
            }
            ActivityError::MalformedReport(_)
            | ActivityError::InvalidTimestamp { .. }
            | ActivityError::IntegrityViolation(_) => AppError::Unprocessable(e.to_string()),
        }
    }
}

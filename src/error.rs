/*
 * Responsibility
 * - Rejection responses of the gateway (status + JSON error body)
 * - Two body shapes: the current `{status_code, errors: [...]}` and the legacy
 *   `{code, message}` kept for clients on paths outside NEW_ERROR_MESSAGE_REGEX
 * - AuthError -> AppError mapping (401 vs 500)
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::AuthError;

const UNAUTHORIZED_MESSAGE: &str = "You are not authorized to perform the requested action";
const INTERNAL_MESSAGE: &str = "The request could not be processed";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status_code: u16,
    pub errors: Vec<ErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorShape {
    Current,
    Legacy,
}

impl ErrorShape {
    pub fn for_path(path: &str, new_error_message_regex: &Regex) -> Self {
        if new_error_message_regex.is_match(path) {
            Self::Current
        } else {
            Self::Legacy
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unauthorized")]
    Unauthorized(ErrorShape),
    #[error("internal server error")]
    Internal(ErrorShape),
}

impl AppError {
    pub fn from_auth(err: &AuthError, shape: ErrorShape) -> Self {
        if err.status() == StatusCode::INTERNAL_SERVER_ERROR {
            Self::Internal(shape)
        } else {
            Self::Unauthorized(shape)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, shape, body) = match self {
            AppError::Unauthorized(shape) => (
                StatusCode::UNAUTHORIZED,
                shape,
                ErrorBody {
                    code: "unauthorized",
                    message: UNAUTHORIZED_MESSAGE,
                },
            ),
            AppError::Internal(shape) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                shape,
                ErrorBody {
                    code: "internal_server_error",
                    message: INTERNAL_MESSAGE,
                },
            ),
        };

        match shape {
            ErrorShape::Current => {
                let body = ErrorResponse {
                    status_code: status.as_u16(),
                    errors: vec![body],
                };
                (status, Json(body)).into_response()
            }
            ErrorShape::Legacy => (status, Json(body)).into_response(),
        }
    }
}

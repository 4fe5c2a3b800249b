use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use parley_db::StorageError;
use parley_types::api::ErrorBody;
use parley_types::error::ValidationError;

/// REST-facing error. Always rendered as `{message, error}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{context}: {source}")]
    BadRequest {
        context: &'static str,
        source: ValidationError,
    },

    #[error("{context}: {source}")]
    Storage {
        context: &'static str,
        source: StorageError,
    },
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::BadRequest { context, source } => ErrorBody {
                message: context.to_string(),
                error: source.to_string(),
            },
            Self::Storage { context, source } => ErrorBody {
                message: context.to_string(),
                error: source.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

//! Translates `JudgeError` into the HTTP status codes in §7 of the spec.
//! Kept out of `judge-protocol`/`judge-core` so those crates stay free of an
//! `axum` dependency.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use judge_protocol::error::JudgeError;
use serde::Serialize;

pub struct ApiError(pub JudgeError);

impl From<JudgeError> for ApiError {
    fn from(e: JudgeError) -> Self {
        Self(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// A narrower 422 used only for query-parameter validation that is not a
/// `JudgeError` (e.g. bad `page`/`page_size`, checked before the service
/// layer is ever called).
pub struct UnprocessableEntity(pub String);

impl IntoResponse for UnprocessableEntity {
    fn into_response(self) -> Response {
        (StatusCode::UNPROCESSABLE_ENTITY, Json(ErrorBody { error: self.0 })).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            JudgeError::Validation(_) => StatusCode::BAD_REQUEST,
            JudgeError::NotFound => StatusCode::NOT_FOUND,
            JudgeError::Conflict(_) => StatusCode::CONFLICT,
            JudgeError::WaitTimeout => StatusCode::REQUEST_TIMEOUT,
            JudgeError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if matches!(status, StatusCode::INTERNAL_SERVER_ERROR) {
            tracing::error!(error = %self.0, "infrastructure error serving request");
        }
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

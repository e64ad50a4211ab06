//! HTTP mapping for use-case errors.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use famtree_core::FamilyError;
use log::error;
use serde::Serialize;

pub type ApiResult<T> = Result<T, ApiError>;

/// Error body returned by every failing route.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError(FamilyError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            FamilyError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            FamilyError::NotFound(_) => StatusCode::NOT_FOUND,
            FamilyError::Denied(_) => StatusCode::FORBIDDEN,
            FamilyError::InvalidState(_) => StatusCode::BAD_REQUEST,
            FamilyError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            FamilyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FamilyError> for ApiError {
    fn from(err: FamilyError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(FamilyError::InvalidArgument(format!(
            "invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            FamilyError::Internal(err) => {
                error!("event=request_failed module=http status=error error={err}");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            code: self.0.code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

/// Unwraps a JSON body, mapping extractor rejections to `invalid_argument`.
pub fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    let Json(value) = payload?;
    Ok(value)
}

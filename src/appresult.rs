use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::error::RelayError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

/// No caller identity was forwarded with the request.
#[derive(Debug, Error)]
#[error("authentication required")]
pub struct Unauthenticated;

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = if let Some(err) = self.0.downcast_ref::<RelayError>() {
            (err.status(), err.code(), err.to_string())
        } else if let Some(err) = self.0.downcast_ref::<Unauthenticated>() {
            (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", err.to_string())
        } else {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "an internal server error occurred".to_owned(),
            )
        };

        if status.is_server_error() {
            error!(error = %self.0, backtrace = %self.0.backtrace(), "request failed");
        }

        (status, Json(ErrorBody { code, message })).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

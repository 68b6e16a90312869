use axum::http::StatusCode;
use thiserror::Error;

use crate::store::StoreError;

/// Failures returned by relay operations. Every variant is terminal for the call
/// that produced it; nothing is retried internally.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("user id must be a valid UUID, got {0:?}")]
    InvalidIdentity(String),

    #[error("message content cannot be empty")]
    EmptyContent,

    #[error("message content is {len} characters, the maximum is {max}")]
    ContentTooLong { len: usize, max: usize },

    #[error("sender and recipient must be different users")]
    SameParticipant,

    #[error("persistence failed: {0}")]
    PersistenceFailed(#[source] StoreError),

    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),
}

impl RelayError {
    pub fn code(&self) -> &'static str {
        use RelayError::*;
        match self {
            InvalidIdentity(_) => "INVALID_USER_ID",
            EmptyContent => "MESSAGE_EMPTY",
            ContentTooLong { .. } => "MESSAGE_TOO_LONG",
            SameParticipant => "INVALID_REQUEST",
            PersistenceFailed(_) => "DATABASE_OPERATION_FAILED",
            TransportUnavailable(_) => "WEBSOCKET_NOT_CONNECTED",
        }
    }

    pub fn status(&self) -> StatusCode {
        use RelayError::*;
        match self {
            InvalidIdentity(_) | EmptyContent | ContentTooLong { .. } | SameParticipant => {
                StatusCode::BAD_REQUEST
            }
            PersistenceFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TransportUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Client-input errors, fixable by the caller correcting the request.
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

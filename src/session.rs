use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{AppError, appresult::Unauthenticated, error::RelayError, validate::validate_identity};

/// Header the gateway uses to forward the already-verified caller identity.
pub const USER_ID: &str = "x-user-id";

/// The authenticated user making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_ID) else {
            return Err(Unauthenticated.into());
        };

        let user_id = value
            .to_str()
            .map_err(|_| RelayError::InvalidIdentity(String::from_utf8_lossy(value.as_bytes()).into_owned()))?;
        validate_identity(user_id)?;

        Ok(Caller(user_id.to_owned()))
    }
}

//! Caller identity
//!
//! Authentication happens upstream; the authenticated user arrives in the
//! `X-User-Id` header.

use crate::error::ApiError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use pulse_common::models::UserId;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor for the authenticated caller
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("missing X-User-Id header".to_string()))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized("X-User-Id is not valid text".to_string()))?;

        UserId::parse(raw)
            .map(CurrentUser)
            .map_err(|_| ApiError::Unauthorized("X-User-Id is empty".to_string()))
    }
}

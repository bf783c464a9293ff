//! Caller identity extraction
//!
//! Authentication proper lives in front of this service; requests
//! arrive with an `X-User-Id` header carrying the caller's UUID.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use types::ids::UserId;
use uuid::Uuid;

use crate::error::AppError;

pub struct Identity(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("x-user-id")
            .ok_or_else(|| AppError::Unauthorized("missing X-User-Id header".to_string()))?;
        let raw = header
            .to_str()
            .map_err(|_| AppError::Unauthorized("malformed X-User-Id header".to_string()))?;
        let uuid = Uuid::parse_str(raw)
            .map_err(|_| AppError::Unauthorized("X-User-Id is not a UUID".to_string()))?;
        Ok(Identity(UserId::from_uuid(uuid)))
    }
}

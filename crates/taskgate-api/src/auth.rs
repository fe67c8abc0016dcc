//! # Caller Identity
//!
//! Every `/v1` request names its caller in the `x-user-email` header. The
//! gateway sits behind an identity-aware proxy that sets this header after
//! authenticating the user, so the value is trusted as-is.
//!
//! Handlers take a [`CallerIdentity`] argument; a missing or malformed
//! header rejects the request with 401 before the handler runs.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use taskgate_core::UserId;

use crate::error::AppError;

/// Header carrying the authenticated user's email.
pub const USER_HEADER: &str = "x-user-email";

/// Identity of the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user: UserId,
}

impl<S: Send + Sync> FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing {USER_HEADER} header")))?
            .to_str()
            .map_err(|_| AppError::Unauthorized(format!("{USER_HEADER} header is not valid text")))?;
        let user = UserId::new(raw).map_err(|e| AppError::Unauthorized(e.to_string()))?;
        Ok(Self { user })
    }
}

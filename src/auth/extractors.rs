use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use crate::{auth::repo_types::SessionUser, error::AppError, state::AppState};

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The raw bearer token, if one was sent.
pub struct BearerToken(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(BearerToken(bearer_token(parts).map(str::to_string)))
    }
}

/// Resolves the bearer token to a live session or rejects with 401.
pub struct AuthUser(pub SessionUser);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::unauthorized("Authentication required"))?;

        match state.auth.verify(Some(token)).await {
            Some(user) => Ok(AuthUser(user)),
            None => {
                warn!("invalid or expired session");
                Err(AppError::unauthorized("Invalid or expired session"))
            }
        }
    }
}

/// An authenticated user whose email is on the configured admin list.
pub struct AdminUser(pub SessionUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !state.config.admin_emails.iter().any(|e| *e == user.email) {
            warn!(user_id = %user.user_id, "admin route denied");
            return Err(AppError::Forbidden("Admin access required".into()));
        }
        Ok(AdminUser(user))
    }
}

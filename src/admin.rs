//! Maintenance endpoints, open only to sessions whose email is listed in
//! `ADMIN_EMAILS`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{extractors::AdminUser, MessageResponse},
    error::{AppError, AppResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct UpdateDisplayNameRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default, rename = "displayName")]
    pub display_name: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/reset-wins/:user_id", post(reset_wins))
        .route("/admin/update-display-name", post(update_display_name))
}

#[instrument(skip(state, admin))]
pub async fn reset_wins(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    if state.auth.find_user(user_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".into()));
    }
    let deleted = state.hunt.reset_wins(user_id).await?;
    info!(admin = %admin.email, %user_id, deleted, "admin reset wins");
    Ok(Json(MessageResponse::new(format!(
        "Reset {deleted} wins for user {user_id}"
    ))))
}

#[instrument(skip(state, admin, payload))]
pub async fn update_display_name(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    payload: Result<Json<UpdateDisplayNameRequest>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Json(payload) = payload?;
    state
        .auth
        .update_display_name(&payload.email, &payload.display_name)
        .await?;
    info!(admin = %admin.email, email = %payload.email, "admin updated display name");
    Ok(Json(MessageResponse::new(format!(
        "Updated display name for {} to {}",
        payload.email.trim().to_lowercase(),
        payload.display_name.trim()
    ))))
}

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, DefaultBodyLimit, Path, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{extractors::AuthUser, MessageResponse},
    error::{AppError, AppResult},
    hunt::dto::{
        GlobalStats, ImagesResponse, LeaderboardResponse, UploadRequest, UploadResponse,
        UserStats,
    },
    hunt::repo_types::SubmissionStatus,
    limit,
    state::AppState,
};

// room for MAX_IMAGE_DATA_LEN plus the JSON around it
const UPLOAD_BODY_LIMIT: usize = 8 * 1024 * 1024;

pub fn image_routes(state: &AppState) -> Router<AppState> {
    let upload = Router::new()
        .route(
            "/images/upload",
            post(upload_image).layer(middleware::from_fn_with_state(
                state.limits.upload.clone(),
                limit::enforce,
            )),
        )
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    Router::new()
        .merge(upload)
        .route("/images/user", get(list_user_images))
        .route("/images/:id", delete(delete_image))
}

pub fn stats_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(global_stats))
        .route("/user/stats", get(user_stats))
        .route("/leaderboard", get(leaderboard))
}

#[instrument(skip(state, user, payload))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let Json(payload) = payload?;
    let submitted = state
        .hunt
        .submit(user.user_id, &payload.prompt, &payload.image_data)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "Image uploaded successfully",
            image_id: submitted.id,
            status: submitted.status,
            success: submitted.status == SubmissionStatus::Success,
        }),
    ))
}

#[instrument(skip(state, user))]
pub async fn list_user_images(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<ImagesResponse>> {
    let images = state.hunt.list_for_user(user.user_id).await?;
    Ok(Json(ImagesResponse { images }))
}

#[instrument(skip(state, user, id))]
pub async fn delete_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Path(id) = id.map_err(|_| AppError::NotFound("Image not found".into()))?;
    state.hunt.delete_owned(user.user_id, id).await?;
    Ok(Json(MessageResponse::new("Image deleted successfully")))
}

#[instrument(skip(state))]
pub async fn global_stats(State(state): State<AppState>) -> AppResult<Json<GlobalStats>> {
    Ok(Json(state.hunt.global_stats().await?))
}

#[instrument(skip(state, user))]
pub async fn user_stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<UserStats>> {
    Ok(Json(state.hunt.user_stats(user.user_id).await?))
}

#[instrument(skip(state))]
pub async fn leaderboard(State(state): State<AppState>) -> AppResult<Json<LeaderboardResponse>> {
    let leaderboard = state.hunt.leaderboard().await?;
    Ok(Json(LeaderboardResponse { leaderboard }))
}

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{
    config::split_list,
    error::{AppError, AppResult},
    state::AppState,
};

const ANALYZE_BODY_LIMIT: usize = 10 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub message: String,
    pub challenge_success: bool,
}

pub fn analyze_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(analyze_image))
        .layer(DefaultBodyLimit::max(ANALYZE_BODY_LIMIT))
}

struct UploadedFile {
    file_name: String,
    content: Bytes,
}

/// POST /analyze (multipart): `file`, optional comma-separated `labels`.
#[instrument(skip(state, mp))]
pub async fn analyze_image(
    State(state): State<AppState>,
    mut mp: Multipart,
) -> AppResult<Json<AnalyzeResponse>> {
    let mut file: Option<UploadedFile> = None;
    let mut labels: Option<Vec<String>> = None;

    while let Some(field) = mp.next_field().await.map_err(|e| {
        warn!(error = %e, "malformed multipart body");
        AppError::bad_request("Malformed multipart body")
    })? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::bad_request("Could not read file"))?;
                file = Some(UploadedFile { file_name, content });
            }
            Some("labels") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Could not read labels"))?;
                labels = Some(split_list(&raw)).filter(|l| !l.is_empty());
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::bad_request("No file part"))?;
    if file.file_name.is_empty() {
        return Err(AppError::bad_request("No selected file"));
    }

    let labels = labels.unwrap_or_else(|| state.config.classifier.analyze_labels.clone());
    let matched = state
        .identifier
        .check_image_file(&file.content, &labels)
        .await?;

    info!(file = %file.file_name, bytes = file.content.len(), matched = ?matched, "image analyzed");
    Ok(Json(match matched {
        Some(label) => AnalyzeResponse {
            message: label,
            challenge_success: true,
        },
        None => AnalyzeResponse {
            message: "no image found".into(),
            challenge_success: false,
        },
    }))
}

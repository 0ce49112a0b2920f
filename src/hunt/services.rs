use std::sync::Arc;

use base64ct::{Base64, Base64Unpadded, Encoding};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    hunt::{
        dto::{GlobalStats, ImageSummary, LeaderboardEntry, UserStats},
        repo::HuntRepo,
        repo_types::{LeaderRow, NewSubmission, SubmissionStatus},
    },
    vision::PromptJudge,
};

pub const MAX_PROMPT_CHARS: usize = 500;
/// About 5MB of image once base64-encoded.
pub const MAX_IMAGE_DATA_LEN: usize = 7_000_000;
const DEFAULT_MIME: &str = "image/jpeg";

/// Decoded upload: raw bytes plus the mime type taken from a data URL.
#[derive(Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Accepts `data:<mime>;base64,<payload>` or bare base64, padded or not.
pub fn decode_image_data(raw: &str) -> Result<DecodedImage, base64ct::Error> {
    let raw = raw.trim();
    let (mime, payload) = match raw.strip_prefix("data:").and_then(|r| r.split_once(',')) {
        Some((meta, payload)) => {
            let mime = meta.strip_suffix(";base64").unwrap_or(meta);
            let mime = if mime.is_empty() { DEFAULT_MIME } else { mime };
            (mime, payload)
        }
        None => (DEFAULT_MIME, raw),
    };

    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = match Base64::decode_vec(&compact) {
        Ok(b) => b,
        Err(_) => Base64Unpadded::decode_vec(&compact)?,
    };
    Ok(DecodedImage {
        mime: mime.to_string(),
        bytes,
    })
}

/// 0 when nothing was submitted, otherwise a percentage with 2 decimals.
pub fn success_rate(successful: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let pct = successful as f64 / total as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Most wins first, older accounts first on ties; ranks are sequential.
pub fn rank(mut rows: Vec<LeaderRow>) -> Vec<LeaderboardEntry> {
    rows.sort_by(|a, b| b.wins.cmp(&a.wins).then(a.created_at.cmp(&b.created_at)));
    rows.into_iter()
        .enumerate()
        .map(|(i, r)| LeaderboardEntry {
            id: r.id,
            display_name: r.display_name,
            wins: r.wins,
            rank: i + 1,
            is_guest: r.is_guest,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submitted {
    pub id: Uuid,
    pub status: SubmissionStatus,
}

#[derive(Clone)]
pub struct HuntService {
    repo: Arc<dyn HuntRepo>,
    judge: Arc<dyn PromptJudge>,
}

impl HuntService {
    pub fn new(repo: Arc<dyn HuntRepo>, judge: Arc<dyn PromptJudge>) -> Self {
        Self { repo, judge }
    }

    pub async fn submit(&self, user_id: Uuid, prompt: &str, image_data: &str) -> AppResult<Submitted> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(AppError::bad_request("Prompt is required"));
        }
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(AppError::bad_request("Prompt is too long (max 500 characters)"));
        }
        if image_data.len() > MAX_IMAGE_DATA_LEN {
            return Err(AppError::bad_request("Image data is too large (max 5MB)"));
        }

        let status = if image_data.trim().is_empty() {
            SubmissionStatus::Pending
        } else {
            let image = decode_image_data(image_data)
                .map_err(|_| AppError::bad_request("Invalid image data"))?;
            self.classify(user_id, &image, prompt).await
        };

        let id = self
            .repo
            .insert_submission(NewSubmission {
                user_id,
                prompt: prompt.to_string(),
                image_data: image_data.to_string(),
                status,
            })
            .await?;
        info!(%user_id, image_id = %id, %status, "submission stored");
        Ok(Submitted { id, status })
    }

    async fn classify(&self, user_id: Uuid, image: &DecodedImage, prompt: &str) -> SubmissionStatus {
        match self.judge.judge(&image.bytes, &image.mime, prompt).await {
            Ok(true) => SubmissionStatus::Success,
            Ok(false) => SubmissionStatus::Failure,
            Err(e) => {
                // kept as pending so the upload is not lost
                warn!(error = ?e, %user_id, "classifier failed");
                SubmissionStatus::Pending
            }
        }
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<ImageSummary>> {
        let rows = self.repo.list_for_user(user_id).await?;
        Ok(rows.into_iter().map(ImageSummary::from).collect())
    }

    pub async fn delete_owned(&self, user_id: Uuid, image_id: Uuid) -> AppResult<()> {
        match self.repo.find_owner(image_id).await? {
            None => Err(AppError::NotFound("Image not found".into())),
            Some(owner) if owner != user_id => {
                warn!(%user_id, %image_id, "delete of foreign image refused");
                Err(AppError::Forbidden("Unauthorized to delete this image".into()))
            }
            Some(_) => {
                self.repo.delete_image(image_id).await?;
                info!(%user_id, %image_id, "image deleted");
                Ok(())
            }
        }
    }

    pub async fn user_stats(&self, user_id: Uuid) -> AppResult<UserStats> {
        let counts = self.repo.count_submissions(Some(user_id)).await?;
        Ok(UserStats {
            total_submissions: counts.total,
            successful_hunts: counts.successful,
            success_rate: success_rate(counts.successful, counts.total),
        })
    }

    pub async fn global_stats(&self) -> AppResult<GlobalStats> {
        let counts = self.repo.count_submissions(None).await?;
        let total_users = self.repo.count_users().await?;
        Ok(GlobalStats {
            total_users,
            total_images: counts.total,
            successful_hunts: counts.successful,
            success_rate: success_rate(counts.successful, counts.total),
        })
    }

    pub async fn leaderboard(&self) -> AppResult<Vec<LeaderboardEntry>> {
        Ok(rank(self.repo.leaderboard_rows().await?))
    }

    pub async fn reset_wins(&self, user_id: Uuid) -> AppResult<u64> {
        let deleted = self.repo.delete_successful(user_id).await?;
        info!(%user_id, deleted, "wins reset");
        Ok(deleted)
    }
}

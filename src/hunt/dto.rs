use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::hunt::repo_types::{ImageRow, SubmissionStatus};

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub image_data: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub image_id: Uuid,
    pub status: SubmissionStatus,
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ImageSummary {
    pub id: Uuid,
    pub prompt: String,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<ImageRow> for ImageSummary {
    fn from(r: ImageRow) -> Self {
        Self {
            id: r.id,
            prompt: r.prompt,
            status: r.status,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImagesResponse {
    pub images: Vec<ImageSummary>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct GlobalStats {
    pub total_users: i64,
    pub total_images: i64,
    pub successful_hunts: i64,
    pub success_rate: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct UserStats {
    pub total_submissions: i64,
    pub successful_hunts: i64,
    pub success_rate: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LeaderboardEntry {
    pub id: Uuid,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub wins: i64,
    pub rank: usize,
    #[serde(rename = "isGuest")]
    pub is_guest: bool,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
}

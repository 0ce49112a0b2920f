use std::fmt;

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Outcome of checking a submission against its prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Success,
    Failure,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image row without its payload.
#[derive(Debug, Clone, FromRow)]
pub struct ImageRow {
    pub id: Uuid,
    pub prompt: String,
    pub status: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub user_id: Uuid,
    pub prompt: String,
    pub image_data: String,
    pub status: SubmissionStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct SubmissionCounts {
    pub total: i64,
    pub successful: i64,
}

/// One user with their number of successful submissions.
#[derive(Debug, Clone, FromRow)]
pub struct LeaderRow {
    pub id: Uuid,
    pub display_name: String,
    pub is_guest: bool,
    pub created_at: OffsetDateTime,
    pub wins: i64,
}

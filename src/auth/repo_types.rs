use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub display_name: String,
    pub is_guest: bool,
    pub created_at: OffsetDateTime,
    pub last_login: Option<OffsetDateTime>,
}

/// Fields needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub is_guest: bool,
}

/// Owner of a live session, as resolved from its token.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SessionUser {
    pub user_id: Uuid,
    pub email: String,
}

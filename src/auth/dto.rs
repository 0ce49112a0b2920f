use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo_types::{SessionUser, User};

/// Request body for signup.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "displayName")]
    pub display_name: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Returned by signup, login and guest creation.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: &'static str,
    pub session_token: String,
    pub user: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            display_name: u.display_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub message: &'static str,
    pub user: SessionInfo,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub user_id: Uuid,
    pub email: String,
}

impl From<SessionUser> for SessionInfo {
    fn from(s: SessionUser) -> Self {
        Self {
            user_id: s.user_id,
            email: s.email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

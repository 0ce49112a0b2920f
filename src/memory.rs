//! In-memory store used by unit and router tests.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        repo::AuthRepo,
        repo_types::{NewUser, SessionUser, User},
    },
    hunt::{
        repo::HuntRepo,
        repo_types::{ImageRow, LeaderRow, NewSubmission, SubmissionCounts, SubmissionStatus},
    },
};

struct SessionRecord {
    user_id: Uuid,
    token: String,
    expires_at: OffsetDateTime,
}

struct ImageRecord {
    id: Uuid,
    user_id: Uuid,
    prompt: String,
    status: SubmissionStatus,
    created_at: OffsetDateTime,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    sessions: Vec<SessionRecord>,
    images: Vec<ImageRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn session_count(&self, user_id: Uuid) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .count()
    }

    pub fn user(&self, id: Uuid) -> Option<User> {
        let inner = self.inner.lock().unwrap();
        inner.users.iter().find(|u| u.id == id).cloned()
    }
}

#[async_trait]
impl AuthRepo for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.user(id))
    }

    async fn create_user(&self, user: NewUser) -> anyhow::Result<Option<User>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.iter().any(|u| u.email == user.email) {
            return Ok(None);
        }
        let now = OffsetDateTime::now_utc();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            display_name: user.display_name,
            is_guest: user.is_guest,
            created_at: now,
            last_login: Some(now),
        };
        inner.users.push(created.clone());
        Ok(Some(created))
    }

    async fn touch_last_login(&self, id: Uuid, at: OffsetDateTime) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(u) = inner.users.iter_mut().find(|u| u.id == id) {
            u.last_login = Some(at);
        }
        Ok(())
    }

    async fn update_display_name(&self, email: &str, display_name: &str) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let mut n = 0;
        for u in inner.users.iter_mut().filter(|u| u.email == email) {
            u.display_name = display_name.to_string();
            n += 1;
        }
        Ok(n)
    }

    async fn insert_session(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.sessions.push(SessionRecord {
            user_id,
            token: token.to_string(),
            expires_at,
        });
        Ok(())
    }

    async fn find_live_session(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<SessionUser>> {
        let inner = self.inner.lock().unwrap();
        let found = inner
            .sessions
            .iter()
            .find(|s| s.token == token && s.expires_at > now)
            .and_then(|s| inner.users.iter().find(|u| u.id == s.user_id))
            .map(|u| SessionUser {
                user_id: u.id,
                email: u.email.clone(),
            });
        Ok(found)
    }

    async fn delete_session(&self, token: &str) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.sessions.len();
        inner.sessions.retain(|s| s.token != token);
        Ok((before - inner.sessions.len()) as u64)
    }

    async fn delete_expired_sessions(&self, now: OffsetDateTime) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.sessions.len();
        inner.sessions.retain(|s| s.expires_at > now);
        Ok((before - inner.sessions.len()) as u64)
    }
}

#[async_trait]
impl HuntRepo for MemoryStore {
    async fn insert_submission(&self, sub: NewSubmission) -> anyhow::Result<Uuid> {
        let mut inner = self.inner.lock().unwrap();
        let id = Uuid::new_v4();
        inner.images.push(ImageRecord {
            id,
            user_id: sub.user_id,
            prompt: sub.prompt,
            status: sub.status,
            created_at: OffsetDateTime::now_utc(),
        });
        Ok(id)
    }

    async fn list_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<ImageRow>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .images
            .iter()
            .rev()
            .filter(|i| i.user_id == user_id)
            .map(|i| ImageRow {
                id: i.id,
                prompt: i.prompt.clone(),
                status: i.status.to_string(),
                created_at: i.created_at,
            })
            .collect())
    }

    async fn find_owner(&self, image_id: Uuid) -> anyhow::Result<Option<Uuid>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .images
            .iter()
            .find(|i| i.id == image_id)
            .map(|i| i.user_id))
    }

    async fn delete_image(&self, image_id: Uuid) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.images.len();
        inner.images.retain(|i| i.id != image_id);
        Ok((before - inner.images.len()) as u64)
    }

    async fn count_submissions(&self, user_id: Option<Uuid>) -> anyhow::Result<SubmissionCounts> {
        let inner = self.inner.lock().unwrap();
        let mut counts = SubmissionCounts::default();
        for img in inner
            .images
            .iter()
            .filter(|i| user_id.map_or(true, |u| i.user_id == u))
        {
            counts.total += 1;
            if img.status == SubmissionStatus::Success {
                counts.successful += 1;
            }
        }
        Ok(counts)
    }

    async fn count_users(&self) -> anyhow::Result<i64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.len() as i64)
    }

    async fn leaderboard_rows(&self) -> anyhow::Result<Vec<LeaderRow>> {
        let inner = self.inner.lock().unwrap();
        let mut wins: HashMap<Uuid, i64> = HashMap::new();
        for img in inner
            .images
            .iter()
            .filter(|i| i.status == SubmissionStatus::Success)
        {
            *wins.entry(img.user_id).or_default() += 1;
        }
        Ok(inner
            .users
            .iter()
            .map(|u| LeaderRow {
                id: u.id,
                display_name: u.display_name.clone(),
                is_guest: u.is_guest,
                created_at: u.created_at,
                wins: wins.get(&u.id).copied().unwrap_or(0),
            })
            .collect())
    }

    async fn delete_successful(&self, user_id: Uuid) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.images.len();
        inner
            .images
            .retain(|i| !(i.user_id == user_id && i.status == SubmissionStatus::Success));
        Ok((before - inner.images.len()) as u64)
    }
}

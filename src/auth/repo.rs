use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::repo_types::{NewUser, SessionUser, User},
    db::PgStore,
};

const USER_COLUMNS: &str =
    "id, email, password_hash, display_name, is_guest, created_at, last_login";

/// Persistence for users and their sessions.
#[async_trait]
pub trait AuthRepo: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    /// `None` when the email is already registered.
    async fn create_user(&self, user: NewUser) -> anyhow::Result<Option<User>>;
    async fn touch_last_login(&self, id: Uuid, at: OffsetDateTime) -> anyhow::Result<()>;
    async fn update_display_name(&self, email: &str, display_name: &str) -> anyhow::Result<u64>;

    async fn insert_session(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()>;
    /// Resolve a token that has not expired as of `now`.
    async fn find_live_session(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<SessionUser>>;
    async fn delete_session(&self, token: &str) -> anyhow::Result<u64>;
    async fn delete_expired_sessions(&self, now: OffsetDateTime) -> anyhow::Result<u64>;
}

#[async_trait]
impl AuthRepo for PgStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> anyhow::Result<Option<User>> {
        let res = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, display_name, is_guest, last_login)
            VALUES ($1, $2, $3, $4, now())
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .bind(user.is_guest)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(u) => Ok(Some(u)),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn touch_last_login(&self, id: Uuid, at: OffsetDateTime) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn update_display_name(&self, email: &str, display_name: &str) -> anyhow::Result<u64> {
        let res = sqlx::query("UPDATE users SET display_name = $2 WHERE email = $1")
            .bind(email)
            .bind(display_name)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected())
    }

    async fn insert_session(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO sessions (user_id, token, expires_at) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(token)
            .bind(expires_at)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn find_live_session(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<SessionUser>> {
        let row = sqlx::query_as::<_, SessionUser>(
            r#"
            SELECT s.user_id, u.email
              FROM sessions s
              JOIN users u ON u.id = s.user_id
             WHERE s.token = $1 AND s.expires_at > $2
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete_session(&self, token: &str) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected())
    }

    async fn delete_expired_sessions(&self, now: OffsetDateTime) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected())
    }
}

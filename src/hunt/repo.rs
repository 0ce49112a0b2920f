use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::PgStore,
    hunt::repo_types::{ImageRow, LeaderRow, NewSubmission, SubmissionCounts},
};

/// Persistence for hunt submissions and the aggregates built on them.
#[async_trait]
pub trait HuntRepo: Send + Sync {
    async fn insert_submission(&self, sub: NewSubmission) -> anyhow::Result<Uuid>;
    /// Newest first.
    async fn list_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<ImageRow>>;
    async fn find_owner(&self, image_id: Uuid) -> anyhow::Result<Option<Uuid>>;
    async fn delete_image(&self, image_id: Uuid) -> anyhow::Result<u64>;
    /// Counts across all users when `user_id` is `None`.
    async fn count_submissions(&self, user_id: Option<Uuid>) -> anyhow::Result<SubmissionCounts>;
    async fn count_users(&self) -> anyhow::Result<i64>;
    async fn leaderboard_rows(&self) -> anyhow::Result<Vec<LeaderRow>>;
    async fn delete_successful(&self, user_id: Uuid) -> anyhow::Result<u64>;
}

#[async_trait]
impl HuntRepo for PgStore {
    async fn insert_submission(&self, sub: NewSubmission) -> anyhow::Result<Uuid> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO images (user_id, prompt, image_data, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(sub.user_id)
        .bind(&sub.prompt)
        .bind(&sub.image_data)
        .bind(sub.status.as_str())
        .fetch_one(&self.db)
        .await
        .context("insert image")?;
        Ok(id)
    }

    async fn list_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<ImageRow>> {
        let rows = sqlx::query_as::<_, ImageRow>(
            r#"
            SELECT id, prompt, status, created_at
              FROM images
             WHERE user_id = $1
             ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list images by user")?;
        Ok(rows)
    }

    async fn find_owner(&self, image_id: Uuid) -> anyhow::Result<Option<Uuid>> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT user_id FROM images WHERE id = $1")
            .bind(image_id)
            .fetch_optional(&self.db)
            .await
            .context("find image owner")?;
        Ok(row.map(|(owner,)| owner))
    }

    async fn delete_image(&self, image_id: Uuid) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM images WHERE id = $1")
            .bind(image_id)
            .execute(&self.db)
            .await
            .context("delete image")?;
        Ok(res.rows_affected())
    }

    async fn count_submissions(&self, user_id: Option<Uuid>) -> anyhow::Result<SubmissionCounts> {
        let counts = sqlx::query_as::<_, SubmissionCounts>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = 'success') AS successful
              FROM images
             WHERE $1::uuid IS NULL OR user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await
        .context("count submissions")?;
        Ok(counts)
    }

    async fn count_users(&self) -> anyhow::Result<i64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await
            .context("count users")?;
        Ok(n)
    }

    async fn leaderboard_rows(&self) -> anyhow::Result<Vec<LeaderRow>> {
        let rows = sqlx::query_as::<_, LeaderRow>(
            r#"
            SELECT u.id, u.display_name, u.is_guest, u.created_at,
                   COUNT(i.id) FILTER (WHERE i.status = 'success') AS wins
              FROM users u
              LEFT JOIN images i ON i.user_id = u.id
             GROUP BY u.id
             ORDER BY wins DESC, u.created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("leaderboard")?;
        Ok(rows)
    }

    async fn delete_successful(&self, user_id: Uuid) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM images WHERE user_id = $1 AND status = 'success'")
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("reset wins")?;
        Ok(res.rows_affected())
    }
}

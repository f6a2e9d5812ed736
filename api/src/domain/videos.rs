//! Video domain - DB queries for videos
//!
//! All functions use the generic Executor pattern, allowing them to work with
//! both `&PgPool` (for standalone queries) and `&mut PgConnection` (for transactions).

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

/// A video record. `thumbnail_url` and `video_url` hold storage pointers,
/// see `storage::AssetLocation`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Video {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub video_url: Option<String>,
    pub user_id: Uuid,
}

/// Insert a new video with no assets attached
pub async fn create_video<'e, E>(
    executor: E,
    user_id: Uuid,
    title: &str,
    description: &str,
) -> Result<Video, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        INSERT INTO videos (id, created_at, updated_at, title, description, user_id)
        VALUES ($1, NOW(), NOW(), $2, $3, $4)
        RETURNING id, created_at, updated_at, title, description, thumbnail_url, video_url, user_id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(title)
    .bind(description)
    .bind(user_id)
    .fetch_one(executor)
    .await
}

pub async fn get_video<'e, E>(executor: E, video_id: Uuid) -> Result<Option<Video>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT id, created_at, updated_at, title, description, thumbnail_url, video_url, user_id
        FROM videos
        WHERE id = $1
        "#,
    )
    .bind(video_id)
    .fetch_optional(executor)
    .await
}

/// All videos owned by a user, newest first
pub async fn list_videos_for_user<'e, E>(
    executor: E,
    user_id: Uuid,
) -> Result<Vec<Video>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT id, created_at, updated_at, title, description, thumbnail_url, video_url, user_id
        FROM videos
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// Persist the mutable fields of `video`. Last write wins.
pub async fn update_video<'e, E>(executor: E, video: &Video) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE videos
        SET title = $1,
            description = $2,
            thumbnail_url = $3,
            video_url = $4,
            updated_at = NOW()
        WHERE id = $5
        "#,
    )
    .bind(&video.title)
    .bind(&video.description)
    .bind(&video.thumbnail_url)
    .bind(&video.video_url)
    .bind(video.id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

/// Returns false when no such video existed
pub async fn delete_video<'e, E>(executor: E, video_id: Uuid) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM videos WHERE id = $1")
        .bind(video_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

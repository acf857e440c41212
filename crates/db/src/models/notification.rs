use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Hard cap on a single inbox page.
pub const MAX_NOTIFICATION_PAGE: i64 = 200;

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "notification_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    BoardInvite,
    TaskAssigned,
    TaskCreated,
    TaskMoved,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub board_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    #[ts(type = "Date | null")]
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub board_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct NotificationQuery {
    #[serde(default)]
    #[ts(optional)]
    pub unread_only: Option<bool>,
    #[ts(optional)]
    pub limit: Option<i64>,
}

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, board_id, task_id, kind, title, body, read_at, created_at";

impl Notification {
    pub async fn create<'e, E>(executor: E, data: &NewNotification) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Notification>(&format!(
            r#"INSERT INTO notifications
                   (id, user_id, board_id, task_id, kind, title, body, read_at, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, $8)
               RETURNING {NOTIFICATION_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(data.user_id)
        .bind(data.board_id)
        .bind(data.task_id)
        .bind(data.kind)
        .bind(&data.title)
        .bind(&data.body)
        .bind(Utc::now())
        .fetch_one(executor)
        .await
    }

    /// Newest first. `limit` is clamped to `1..=MAX_NOTIFICATION_PAGE`.
    pub async fn list_for_user(
        pool: &SqlitePool,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"SELECT {NOTIFICATION_COLUMNS} FROM notifications
               WHERE user_id = $1 AND ($2 = 0 OR read_at IS NULL)
               ORDER BY created_at DESC, id DESC
               LIMIT $3"#
        ))
        .bind(user_id)
        .bind(unread_only)
        .bind(limit.clamp(1, MAX_NOTIFICATION_PAGE))
        .fetch_all(pool)
        .await
    }

    pub async fn mark_read(
        pool: &SqlitePool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"UPDATE notifications SET read_at = COALESCE(read_at, $3)
               WHERE id = $1 AND user_id = $2
               RETURNING {NOTIFICATION_COLUMNS}"#
        ))
        .bind(id)
        .bind(user_id)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await
    }

    pub async fn mark_all_read(pool: &SqlitePool, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = $2 WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

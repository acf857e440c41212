use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "theme", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub theme: Theme,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity claims used to create or refresh a user row.
#[derive(Debug, Clone)]
pub struct UpsertUser {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize, TS)]
pub struct UpdatePreferences {
    pub theme: Theme,
}

const USER_COLUMNS: &str = "id, email, display_name, theme, created_at, updated_at";

impl User {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Email lookup is case-insensitive.
    pub async fn find_by_email(
        pool: &SqlitePool,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 COLLATE NOCASE"
        ))
        .bind(email.trim())
        .fetch_optional(pool)
        .await
    }

    /// Insert the user, or refresh email and display name when the id exists.
    /// The stored theme is never touched here.
    pub async fn upsert(pool: &SqlitePool, data: &UpsertUser) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, User>(&format!(
            r#"INSERT INTO users (id, email, display_name, theme, created_at, updated_at)
               VALUES ($1, $2, $3, 'system', $4, $4)
               ON CONFLICT(id) DO UPDATE SET
                   email = excluded.email,
                   display_name = excluded.display_name,
                   updated_at = CASE
                       WHEN users.email = excluded.email
                        AND users.display_name = excluded.display_name
                       THEN users.updated_at
                       ELSE excluded.updated_at
                   END
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(data.id)
        .bind(&data.email)
        .bind(&data.display_name)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn set_theme(
        pool: &SqlitePool,
        id: Uuid,
        theme: Theme,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET theme = $2, updated_at = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(theme)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await
    }
}

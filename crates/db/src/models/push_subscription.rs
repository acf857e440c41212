use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PushSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub created_at: DateTime<Utc>,
}

/// The browser `PushSubscription.toJSON()` shape.
#[derive(Debug, Clone, Deserialize, TS)]
pub struct RegisterPushSubscription {
    pub endpoint: String,
    pub keys: PushKeys,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct UnregisterPushSubscription {
    pub endpoint: String,
}

const PUSH_COLUMNS: &str = "id, user_id, endpoint, p256dh, auth, created_at";

impl PushSubscription {
    /// Endpoints are unique: registering a known endpoint hands it to `user_id`
    /// and refreshes its keys.
    pub async fn upsert(
        pool: &SqlitePool,
        user_id: Uuid,
        data: &RegisterPushSubscription,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PushSubscription>(&format!(
            r#"INSERT INTO push_subscriptions (id, user_id, endpoint, p256dh, auth, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT(endpoint) DO UPDATE SET
                   user_id = excluded.user_id,
                   p256dh = excluded.p256dh,
                   auth = excluded.auth
               RETURNING {PUSH_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&data.endpoint)
        .bind(&data.keys.p256dh)
        .bind(&data.keys.auth)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, PushSubscription>(&format!(
            "SELECT {PUSH_COLUMNS} FROM push_subscriptions WHERE user_id = $1 ORDER BY created_at ASC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn delete_by_endpoint(
        pool: &SqlitePool,
        user_id: Uuid,
        endpoint: &str,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM push_subscriptions WHERE user_id = $1 AND endpoint = $2")
                .bind(user_id)
                .bind(endpoint)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

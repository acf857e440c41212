use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqliteConnection, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::OrderEntry;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Column {
    pub id: Uuid,
    pub board_id: Uuid,
    pub name: String,
    #[sqlx(rename = "sort_order")]
    #[serde(rename = "order")]
    pub order: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, TS)]
pub struct CreateColumn {
    pub name: String,
    /// Insert at this position instead of appending.
    #[ts(optional)]
    pub index: Option<usize>,
}

#[derive(Debug, Deserialize, TS)]
pub struct UpdateColumn {
    pub name: String,
}

#[derive(Debug, Deserialize, TS)]
pub struct MoveColumn {
    pub index: usize,
}

const COLUMN_COLUMNS: &str = "id, board_id, name, sort_order, created_at, updated_at";

impl Column {
    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        board_id: Uuid,
        name: &str,
        order: f64,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, Column>(&format!(
            r#"INSERT INTO columns (id, board_id, name, sort_order, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $5)
               RETURNING {COLUMN_COLUMNS}"#
        ))
        .bind(id)
        .bind(board_id)
        .bind(name)
        .bind(order)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Column>(&format!(
            "SELECT {COLUMN_COLUMNS} FROM columns WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_board<'e, E>(executor: E, board_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Column>(&format!(
            r#"SELECT {COLUMN_COLUMNS} FROM columns
               WHERE board_id = $1
               ORDER BY sort_order ASC, id ASC"#
        ))
        .bind(board_id)
        .fetch_all(executor)
        .await
    }

    /// Sibling positions on a board, optionally leaving one column out
    /// (the one being moved).
    pub async fn board_entries<'e, E>(
        executor: E,
        board_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Result<Vec<OrderEntry>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, OrderEntry>(
            r#"SELECT id, sort_order FROM columns
               WHERE board_id = $1 AND ($2 IS NULL OR id != $2)
               ORDER BY sort_order ASC, id ASC"#,
        )
        .bind(board_id)
        .bind(exclude)
        .fetch_all(executor)
        .await
    }

    pub async fn rename(
        pool: &SqlitePool,
        id: Uuid,
        name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Column>(&format!(
            r#"UPDATE columns SET name = $2, updated_at = $3
               WHERE id = $1
               RETURNING {COLUMN_COLUMNS}"#
        ))
        .bind(id)
        .bind(name)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await
    }

    /// Point update of one column's position.
    pub async fn set_order<'e, E>(
        executor: E,
        id: Uuid,
        order: f64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Column>(&format!(
            r#"UPDATE columns SET sort_order = $2, updated_at = $3
               WHERE id = $1
               RETURNING {COLUMN_COLUMNS}"#
        ))
        .bind(id)
        .bind(order)
        .bind(Utc::now())
        .fetch_optional(executor)
        .await
    }

    /// Rewrite several column positions. Callers run this inside a transaction.
    pub async fn write_orders(
        conn: &mut SqliteConnection,
        entries: &[OrderEntry],
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        for entry in entries {
            sqlx::query("UPDATE columns SET sort_order = $2, updated_at = $3 WHERE id = $1")
                .bind(entry.id)
                .bind(entry.order)
                .bind(now)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    /// Tasks in the column are deleted with it.
    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM columns WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::{column::Column, membership::MemberRole, task::Task};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Board {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A board as seen by one member, carrying that member's role.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct BoardWithRole {
    #[serde(flatten)]
    #[sqlx(flatten)]
    #[ts(flatten)]
    pub board: Board,
    pub role: MemberRole,
}

impl std::ops::Deref for BoardWithRole {
    type Target = Board;
    fn deref(&self) -> &Self::Target {
        &self.board
    }
}

#[derive(Debug, Deserialize, TS)]
pub struct CreateBoard {
    pub name: String,
    pub description: Option<String>,
    /// Seed "To Do", "In Progress" and "Done". Defaults to true.
    #[ts(optional)]
    pub with_default_columns: Option<bool>,
}

#[derive(Debug, Deserialize, TS)]
pub struct UpdateBoard {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    #[ts(optional, type = "string | null")]
    pub description: Option<Option<String>>,
}

/// Everything a client needs to render one board: columns sorted by order,
/// tasks sorted by column position, then order, then id.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct BoardSnapshot {
    pub board: Board,
    pub columns: Vec<Column>,
    pub tasks: Vec<Task>,
}

const BOARD_COLUMNS: &str = "id, owner_id, name, description, created_at, updated_at";

impl Board {
    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        owner_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, Board>(&format!(
            r#"INSERT INTO boards (id, owner_id, name, description, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $5)
               RETURNING {BOARD_COLUMNS}"#
        ))
        .bind(id)
        .bind(owner_id)
        .bind(name)
        .bind(description)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Board>(&format!("SELECT {BOARD_COLUMNS} FROM boards WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Boards the user is a member of, most recently updated first.
    pub async fn find_for_user(
        pool: &SqlitePool,
        user_id: Uuid,
    ) -> Result<Vec<BoardWithRole>, sqlx::Error> {
        sqlx::query_as::<_, BoardWithRole>(
            r#"SELECT b.id, b.owner_id, b.name, b.description, b.created_at, b.updated_at,
                      m.role
               FROM boards b
               JOIN board_members m ON m.board_id = b.id
               WHERE m.user_id = $1
               ORDER BY b.updated_at DESC, b.id ASC"#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Board>(&format!(
            r#"UPDATE boards SET name = $2, description = $3, updated_at = $4
               WHERE id = $1
               RETURNING {BOARD_COLUMNS}"#
        ))
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await
    }

    /// Bump `updated_at` after a change to one of the board's children.
    pub async fn touch<'e, E>(executor: E, id: Uuid) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE boards SET updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(Utc::now())
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Columns, tasks, memberships and board notifications go with it.
    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM boards WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

impl BoardSnapshot {
    /// Read the board, its columns and its tasks in one read transaction so the
    /// three lists are mutually consistent.
    pub async fn load(pool: &SqlitePool, board_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(board) = sqlx::query_as::<_, Board>(&format!(
            "SELECT {BOARD_COLUMNS} FROM boards WHERE id = $1"
        ))
        .bind(board_id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        let columns = Column::find_by_board(&mut *tx, board_id).await?;
        let tasks = Task::find_by_board(&mut *tx, board_id).await?;
        tx.commit().await?;

        Ok(Some(Self {
            board,
            columns,
            tasks,
        }))
    }
}

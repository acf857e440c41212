use chrono::Utc;
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{NewTask, Task};
use crate::models::OrderEntry;

const TASK_COLUMNS: &str = "id, board_id, column_id, title, description, assignee_id, created_by, sort_order, created_at, updated_at";

impl Task {
    pub async fn create<'e, E>(executor: E, data: &NewTask<'_>) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, Task>(&format!(
            r#"INSERT INTO tasks
                   (id, board_id, column_id, title, description, assignee_id, created_by,
                    sort_order, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
               RETURNING {TASK_COLUMNS}"#
        ))
        .bind(data.id)
        .bind(data.board_id)
        .bind(data.column_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.assignee_id)
        .bind(data.created_by)
        .bind(data.order)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All tasks of a board, grouped by column position, each column's tasks
    /// in visible top-to-bottom order.
    pub async fn find_by_board<'e, E>(executor: E, board_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Task>(
            r#"SELECT t.id, t.board_id, t.column_id, t.title, t.description, t.assignee_id,
                      t.created_by, t.sort_order, t.created_at, t.updated_at
               FROM tasks t
               JOIN columns c ON c.id = t.column_id
               WHERE t.board_id = $1
               ORDER BY c.sort_order ASC, c.id ASC, t.sort_order ASC, t.id ASC"#,
        )
        .bind(board_id)
        .fetch_all(executor)
        .await
    }

    pub async fn find_by_column<'e, E>(
        executor: E,
        column_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Task>(&format!(
            r#"SELECT {TASK_COLUMNS} FROM tasks
               WHERE column_id = $1
               ORDER BY sort_order ASC, id ASC"#
        ))
        .bind(column_id)
        .fetch_all(executor)
        .await
    }

    /// Positions of a column's tasks in visible order, optionally leaving out
    /// the task being moved.
    pub async fn column_entries<'e, E>(
        executor: E,
        column_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Result<Vec<OrderEntry>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, OrderEntry>(
            r#"SELECT id, sort_order FROM tasks
               WHERE column_id = $1 AND ($2 IS NULL OR id != $2)
               ORDER BY sort_order ASC, id ASC"#,
        )
        .bind(column_id)
        .bind(exclude)
        .fetch_all(executor)
        .await
    }

    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        title: &str,
        description: Option<&str>,
        assignee_id: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Task>(&format!(
            r#"UPDATE tasks
               SET title = $2, description = $3, assignee_id = $4, updated_at = $5
               WHERE id = $1
               RETURNING {TASK_COLUMNS}"#
        ))
        .bind(id)
        .bind(title)
        .bind(description)
        .bind(assignee_id)
        .bind(Utc::now())
        .fetch_optional(executor)
        .await
    }

    /// Persist a move as one point update: the task's column, order and
    /// `updated_at`. No sibling row is written.
    pub async fn move_to<'e, E>(
        executor: E,
        id: Uuid,
        column_id: Uuid,
        order: f64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Task>(&format!(
            r#"UPDATE tasks
               SET column_id = $2, sort_order = $3, updated_at = $4
               WHERE id = $1
               RETURNING {TASK_COLUMNS}"#
        ))
        .bind(id)
        .bind(column_id)
        .bind(order)
        .bind(Utc::now())
        .fetch_optional(executor)
        .await
    }

    /// Rewrite several task positions. Only the renumber path uses this, and
    /// always inside a transaction.
    pub async fn write_orders(
        conn: &mut SqliteConnection,
        entries: &[OrderEntry],
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        for entry in entries {
            sqlx::query("UPDATE tasks SET sort_order = $2, updated_at = $3 WHERE id = $1")
                .bind(entry.id)
                .bind(entry.order)
                .bind(now)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    /// Unassign a user from every task on a board (used when they leave it).
    pub async fn clear_assignee_on_board<'e, E>(
        executor: E,
        board_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"UPDATE tasks SET assignee_id = NULL, updated_at = $3
               WHERE board_id = $1 AND assignee_id = $2"#,
        )
        .bind(board_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

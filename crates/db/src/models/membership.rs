use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display)]
#[sqlx(type_name = "member_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Editor,
    Member,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct BoardMember {
    pub board_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub created_at: DateTime<Utc>,
}

/// A membership joined with the member's public profile.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct MemberWithProfile {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, TS)]
pub struct InviteMember {
    pub email: String,
    pub role: MemberRole,
}

#[derive(Debug, Deserialize, TS)]
pub struct UpdateMemberRole {
    pub role: MemberRole,
}

impl BoardMember {
    pub async fn create<'e, E>(
        executor: E,
        board_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, BoardMember>(
            r#"INSERT INTO board_members (board_id, user_id, role, created_at)
               VALUES ($1, $2, $3, $4)
               RETURNING board_id, user_id, role, created_at"#,
        )
        .bind(board_id)
        .bind(user_id)
        .bind(role)
        .bind(Utc::now())
        .fetch_one(executor)
        .await
    }

    pub async fn find(
        pool: &SqlitePool,
        board_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, BoardMember>(
            r#"SELECT board_id, user_id, role, created_at
               FROM board_members
               WHERE board_id = $1 AND user_id = $2"#,
        )
        .bind(board_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_with_profiles(
        pool: &SqlitePool,
        board_id: Uuid,
    ) -> Result<Vec<MemberWithProfile>, sqlx::Error> {
        sqlx::query_as::<_, MemberWithProfile>(
            r#"SELECT u.id AS user_id,
                      u.email,
                      u.display_name,
                      m.role,
                      m.created_at AS joined_at
               FROM board_members m
               JOIN users u ON u.id = m.user_id
               WHERE m.board_id = $1
               ORDER BY m.created_at ASC, u.id ASC"#,
        )
        .bind(board_id)
        .fetch_all(pool)
        .await
    }

    pub async fn member_ids(pool: &SqlitePool, board_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM board_members WHERE board_id = $1")
            .bind(board_id)
            .fetch_all(pool)
            .await
    }

    pub async fn set_role(
        pool: &SqlitePool,
        board_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, BoardMember>(
            r#"UPDATE board_members SET role = $3
               WHERE board_id = $1 AND user_id = $2
               RETURNING board_id, user_id, role, created_at"#,
        )
        .bind(board_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete<'e, E>(executor: E, board_id: Uuid, user_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM board_members WHERE board_id = $1 AND user_id = $2")
            .bind(board_id)
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

//! Board-level authorization.
//!
//! Every board operation resolves the caller's membership first. Callers who
//! are not members learn nothing about the board (`NotFound`); members whose
//! role lacks the permission get `Forbidden`.

use db::models::{
    board::Board,
    membership::{BoardMember, MemberRole},
};
use serde::Serialize;
use sqlx::SqlitePool;
use strum_macros::Display;
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Permission {
    View,
    EditTasks,
    ManageColumns,
    UpdateBoard,
    ManageMembers,
    DeleteBoard,
}

impl Permission {
    pub const ALL: [Permission; 6] = [
        Permission::View,
        Permission::EditTasks,
        Permission::ManageColumns,
        Permission::UpdateBoard,
        Permission::ManageMembers,
        Permission::DeleteBoard,
    ];
}

/// The role matrix.
pub fn role_allows(role: MemberRole, permission: Permission) -> bool {
    match role {
        MemberRole::Owner => true,
        MemberRole::Editor => !matches!(
            permission,
            Permission::ManageMembers | Permission::DeleteBoard
        ),
        MemberRole::Member => matches!(permission, Permission::View | Permission::EditTasks),
    }
}

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Board not found")]
    NotFound,
    #[error("Your role on this board does not allow {0}")]
    Forbidden(Permission),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// A verified view of a board for one caller.
#[derive(Debug, Clone)]
pub struct BoardAccess {
    pub board: Board,
    pub role: MemberRole,
}

pub async fn authorize(
    pool: &SqlitePool,
    board_id: Uuid,
    user_id: Uuid,
    permission: Permission,
) -> Result<BoardAccess, AccessError> {
    let member = BoardMember::find(pool, board_id, user_id)
        .await?
        .ok_or(AccessError::NotFound)?;
    let board = Board::find_by_id(pool, board_id)
        .await?
        .ok_or(AccessError::NotFound)?;

    if !role_allows(member.role, permission) {
        tracing::debug!(
            board_id = %board_id,
            user_id = %user_id,
            role = %member.role,
            permission = %permission,
            "Board permission denied"
        );
        return Err(AccessError::Forbidden(permission));
    }

    Ok(BoardAccess {
        board,
        role: member.role,
    })
}

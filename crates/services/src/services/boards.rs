//! Boards and their columns.

use db::{
    RetryConfig,
    models::{
        board::{Board, BoardSnapshot, BoardWithRole, CreateBoard, UpdateBoard},
        column::{Column, CreateColumn, MoveColumn, UpdateColumn},
        membership::{BoardMember, MemberRole},
    },
    validation::{ValidationError, validate_description, validate_name},
    begin_immediate, with_retry,
};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use super::{
    access::{AccessError, BoardAccess, Permission, authorize},
    events::{BoardEvents, Topic},
    ordering::{Placement, place},
};

pub const DEFAULT_COLUMNS: [&str; 3] = ["To Do", "In Progress", "Done"];

#[derive(Debug, Error)]
pub enum BoardError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Column not found")]
    ColumnNotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct BoardService {
    pool: SqlitePool,
    events: BoardEvents,
    retry: RetryConfig,
}

impl BoardService {
    pub fn new(pool: SqlitePool, events: BoardEvents) -> Self {
        Self {
            pool,
            events,
            retry: RetryConfig::default(),
        }
    }

    /// Create a board owned by `owner_id`, optionally seeded with the default
    /// columns at orders 0, 1 and 2.
    pub async fn create_board(
        &self,
        owner_id: Uuid,
        data: &CreateBoard,
    ) -> Result<BoardWithRole, BoardError> {
        let name = validate_name("name", &data.name)?;
        let description = validate_description(data.description.as_deref())?;

        let mut tx = self.pool.begin().await?;
        let board = Board::create(
            &mut *tx,
            Uuid::new_v4(),
            owner_id,
            &name,
            description.as_deref(),
        )
        .await?;
        BoardMember::create(&mut *tx, board.id, owner_id, MemberRole::Owner).await?;

        if data.with_default_columns.unwrap_or(true) {
            for (order, column_name) in DEFAULT_COLUMNS.iter().enumerate() {
                Column::create(&mut *tx, Uuid::new_v4(), board.id, column_name, order as f64)
                    .await?;
            }
        }
        tx.commit().await?;

        tracing::info!(board_id = %board.id, owner_id = %owner_id, "Board created");
        Ok(BoardWithRole {
            board,
            role: MemberRole::Owner,
        })
    }

    pub async fn list_boards(&self, user_id: Uuid) -> Result<Vec<BoardWithRole>, BoardError> {
        Ok(Board::find_for_user(&self.pool, user_id).await?)
    }

    pub async fn get_board(
        &self,
        user_id: Uuid,
        board_id: Uuid,
    ) -> Result<BoardWithRole, BoardError> {
        let BoardAccess { board, role } =
            authorize(&self.pool, board_id, user_id, Permission::View).await?;
        Ok(BoardWithRole { board, role })
    }

    pub async fn update_board(
        &self,
        user_id: Uuid,
        board_id: Uuid,
        data: &UpdateBoard,
    ) -> Result<Board, BoardError> {
        let access = authorize(&self.pool, board_id, user_id, Permission::UpdateBoard).await?;

        let name = match &data.name {
            Some(name) => validate_name("name", name)?,
            None => access.board.name.clone(),
        };
        let description = match &data.description {
            Some(description) => validate_description(description.as_deref())?,
            None => access.board.description.clone(),
        };

        let board = Board::update(&self.pool, board_id, &name, description.as_deref())
            .await?
            .ok_or(AccessError::NotFound)?;
        self.events.publish(Topic::Board(board_id));
        Ok(board)
    }

    pub async fn delete_board(&self, user_id: Uuid, board_id: Uuid) -> Result<(), BoardError> {
        authorize(&self.pool, board_id, user_id, Permission::DeleteBoard).await?;
        Board::delete(&self.pool, board_id).await?;
        tracing::info!(board_id = %board_id, user_id = %user_id, "Board deleted");
        self.events.publish(Topic::Board(board_id));
        Ok(())
    }

    pub async fn snapshot(
        &self,
        user_id: Uuid,
        board_id: Uuid,
    ) -> Result<BoardSnapshot, BoardError> {
        authorize(&self.pool, board_id, user_id, Permission::View).await?;
        BoardSnapshot::load(&self.pool, board_id)
            .await?
            .ok_or(BoardError::Access(AccessError::NotFound))
    }

    pub async fn list_columns(
        &self,
        user_id: Uuid,
        board_id: Uuid,
    ) -> Result<Vec<Column>, BoardError> {
        authorize(&self.pool, board_id, user_id, Permission::View).await?;
        Ok(Column::find_by_board(&self.pool, board_id).await?)
    }

    /// Append a column, or insert it at `data.index`.
    pub async fn create_column(
        &self,
        user_id: Uuid,
        board_id: Uuid,
        data: &CreateColumn,
    ) -> Result<Column, BoardError> {
        authorize(&self.pool, board_id, user_id, Permission::ManageColumns).await?;
        let name = validate_name("name", &data.name)?;
        let column_id = Uuid::new_v4();

        let column = with_retry(&self.retry, "create_column", || {
            self.insert_column(column_id, board_id, &name, data.index)
        })
        .await?;

        self.after_board_write(board_id).await;
        Ok(column)
    }

    async fn insert_column(
        &self,
        column_id: Uuid,
        board_id: Uuid,
        name: &str,
        index: Option<usize>,
    ) -> Result<Column, sqlx::Error> {
        let mut tx = begin_immediate(&self.pool).await?;
        let siblings = Column::board_entries(&mut *tx, board_id, None).await?;
        let index = index.unwrap_or(siblings.len());
        let order = apply_column_placement(&mut tx, board_id, place(&siblings, index)).await?;
        let column = Column::create(&mut *tx, column_id, board_id, name, order).await?;
        tx.commit().await?;
        Ok(column)
    }

    pub async fn rename_column(
        &self,
        user_id: Uuid,
        board_id: Uuid,
        column_id: Uuid,
        data: &UpdateColumn,
    ) -> Result<Column, BoardError> {
        authorize(&self.pool, board_id, user_id, Permission::ManageColumns).await?;
        self.column_on_board(board_id, column_id).await?;
        let name = validate_name("name", &data.name)?;

        let column = Column::rename(&self.pool, column_id, &name)
            .await?
            .ok_or(BoardError::ColumnNotFound)?;
        self.after_board_write(board_id).await;
        Ok(column)
    }

    /// Move a column to `data.index` among the board's other columns.
    pub async fn move_column(
        &self,
        user_id: Uuid,
        board_id: Uuid,
        column_id: Uuid,
        data: &MoveColumn,
    ) -> Result<Column, BoardError> {
        authorize(&self.pool, board_id, user_id, Permission::ManageColumns).await?;
        self.column_on_board(board_id, column_id).await?;

        let column = with_retry(&self.retry, "move_column", || {
            self.reposition_column(board_id, column_id, data.index)
        })
        .await?
        .ok_or(BoardError::ColumnNotFound)?;

        self.after_board_write(board_id).await;
        Ok(column)
    }

    async fn reposition_column(
        &self,
        board_id: Uuid,
        column_id: Uuid,
        index: usize,
    ) -> Result<Option<Column>, sqlx::Error> {
        let mut tx = begin_immediate(&self.pool).await?;
        let siblings = Column::board_entries(&mut *tx, board_id, Some(column_id)).await?;
        let order = apply_column_placement(&mut tx, board_id, place(&siblings, index)).await?;
        let column = Column::set_order(&mut *tx, column_id, order).await?;
        tx.commit().await?;
        Ok(column)
    }

    /// Removes the column and every task in it.
    pub async fn delete_column(
        &self,
        user_id: Uuid,
        board_id: Uuid,
        column_id: Uuid,
    ) -> Result<(), BoardError> {
        authorize(&self.pool, board_id, user_id, Permission::ManageColumns).await?;
        self.column_on_board(board_id, column_id).await?;
        Column::delete(&self.pool, column_id).await?;
        self.after_board_write(board_id).await;
        Ok(())
    }

    async fn column_on_board(&self, board_id: Uuid, column_id: Uuid) -> Result<Column, BoardError> {
        Column::find_by_id(&self.pool, column_id)
            .await?
            .filter(|c| c.board_id == board_id)
            .ok_or(BoardError::ColumnNotFound)
    }

    async fn after_board_write(&self, board_id: Uuid) {
        if let Err(e) = Board::touch(&self.pool, board_id).await {
            tracing::warn!(board_id = %board_id, error = %e, "Failed to touch board");
        }
        self.events.publish(Topic::Board(board_id));
    }
}

async fn apply_column_placement(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    board_id: Uuid,
    placement: Placement,
) -> Result<f64, sqlx::Error> {
    match placement {
        Placement::Direct(order) => Ok(order),
        Placement::Renumber { orders, order } => {
            tracing::warn!(
                board_id = %board_id,
                columns = orders.len(),
                "Column orders exhausted, renumbering board columns"
            );
            Column::write_orders(tx, &orders).await?;
            Ok(order)
        }
    }
}

//! Task CRUD and the drag-and-drop move.
//!
//! A move reads the destination column's other tasks, computes the new order
//! with [`ordering::place`](super::ordering::place) and persists it with a
//! single point update of the moved task. Sibling rows are only rewritten on
//! the renumber path.

use db::{
    RetryConfig,
    models::{
        board::Board,
        column::Column,
        membership::BoardMember,
        notification::NotificationKind,
        task::{CreateTask, MoveTask, NewTask, Task, TaskFilter, UpdateTask},
        user::User,
    },
    validation::{ValidationError, validate_description, validate_name},
    begin_immediate, with_retry,
};
use sqlx::{Sqlite, SqlitePool, Transaction};
use thiserror::Error;
use uuid::Uuid;

use super::{
    access::{AccessError, BoardAccess, Permission, authorize},
    events::{BoardEvents, Topic},
    notifications::{NotificationDraft, Notifier, Recipients},
    ordering::{Placement, place},
};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Task not found")]
    TaskNotFound,
    #[error("Column not found")]
    ColumnNotFound,
    #[error("Assignee must be a member of the board")]
    AssigneeNotMember,
    #[error("Tasks cannot be moved to a column on another board")]
    CrossBoardMove,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct TaskService {
    pool: SqlitePool,
    events: BoardEvents,
    notifier: Notifier,
    retry: RetryConfig,
}

impl TaskService {
    pub fn new(pool: SqlitePool, events: BoardEvents, notifier: Notifier) -> Self {
        Self {
            pool,
            events,
            notifier,
            retry: RetryConfig::default(),
        }
    }

    /// Load a task and check the caller's permission on its board.
    pub async fn load_task(
        &self,
        actor_id: Uuid,
        task_id: Uuid,
        permission: Permission,
    ) -> Result<(Task, BoardAccess), TaskError> {
        let task = Task::find_by_id(&self.pool, task_id)
            .await?
            .ok_or(TaskError::TaskNotFound)?;
        let access = authorize(&self.pool, task.board_id, actor_id, permission)
            .await
            .map_err(|e| match e {
                AccessError::NotFound => TaskError::TaskNotFound,
                other => TaskError::Access(other),
            })?;
        Ok((task, access))
    }

    pub async fn get_task(&self, actor_id: Uuid, task_id: Uuid) -> Result<Task, TaskError> {
        let (task, _) = self.load_task(actor_id, task_id, Permission::View).await?;
        Ok(task)
    }

    pub async fn list_tasks(
        &self,
        actor_id: Uuid,
        board_id: Uuid,
        filter: &TaskFilter,
    ) -> Result<Vec<Task>, TaskError> {
        authorize(&self.pool, board_id, actor_id, Permission::View).await?;
        match filter.column_id {
            Some(column_id) => {
                self.column_on_board(board_id, column_id).await?;
                Ok(Task::find_by_column(&self.pool, column_id).await?)
            }
            None => Ok(Task::find_by_board(&self.pool, board_id).await?),
        }
    }

    /// Append a task to a column, or insert it at `data.index`.
    pub async fn create_task(
        &self,
        actor: &User,
        board_id: Uuid,
        data: &CreateTask,
    ) -> Result<Task, TaskError> {
        authorize(&self.pool, board_id, actor.id, Permission::EditTasks).await?;
        let column = self.column_on_board(board_id, data.column_id).await?;
        let title = validate_name("title", &data.title)?;
        let description = validate_description(data.description.as_deref())?;
        if let Some(assignee) = data.assignee_id {
            self.ensure_member(board_id, assignee).await?;
        }

        let task_id = Uuid::new_v4();
        let new_task = NewTask {
            id: task_id,
            board_id,
            column_id: column.id,
            title: &title,
            description: description.as_deref(),
            assignee_id: data.assignee_id,
            created_by: actor.id,
            order: 0.0,
        };
        let task = with_retry(&self.retry, "create_task", || {
            self.insert_task(&new_task, data.index)
        })
        .await?;

        tracing::debug!(task_id = %task.id, board_id = %board_id, order = task.order, "Task created");
        self.after_board_write(board_id).await;

        self.fan_out(
            Recipients::BoardMembersExcept {
                board_id,
                actor: actor.id,
            },
            NotificationKind::TaskCreated,
            &task,
            "New task".to_string(),
            format!("{} added \"{}\" to {}", actor.display_name, task.title, column.name),
        )
        .await;
        if let Some(assignee) = task.assignee_id.filter(|id| *id != actor.id) {
            self.notify_assigned(actor, &task, assignee).await;
        }

        Ok(task)
    }

    async fn insert_task(&self, data: &NewTask<'_>, index: Option<usize>) -> Result<Task, sqlx::Error> {
        let mut tx = begin_immediate(&self.pool).await?;
        let siblings = Task::column_entries(&mut *tx, data.column_id, None).await?;
        let index = index.unwrap_or(siblings.len());
        let order = apply_task_placement(&mut tx, data.column_id, place(&siblings, index)).await?;
        let task = Task::create(&mut *tx, &NewTask { order, ..data.clone() }).await?;
        tx.commit().await?;
        Ok(task)
    }

    /// Partial update: absent fields are kept, `null` clears.
    pub async fn update_task(
        &self,
        actor: &User,
        task_id: Uuid,
        data: &UpdateTask,
    ) -> Result<Task, TaskError> {
        let (task, _) = self.load_task(actor.id, task_id, Permission::EditTasks).await?;

        let title = match &data.title {
            Some(title) => validate_name("title", title)?,
            None => task.title.clone(),
        };
        let description = match &data.description {
            Some(description) => validate_description(description.as_deref())?,
            None => task.description.clone(),
        };
        let assignee_id = match data.assignee_id {
            Some(Some(assignee)) => {
                self.ensure_member(task.board_id, assignee).await?;
                Some(assignee)
            }
            Some(None) => None,
            None => task.assignee_id,
        };

        let updated = Task::update(
            &self.pool,
            task_id,
            &title,
            description.as_deref(),
            assignee_id,
        )
        .await?
        .ok_or(TaskError::TaskNotFound)?;

        self.after_board_write(updated.board_id).await;
        if let Some(assignee) = updated
            .assignee_id
            .filter(|id| Some(*id) != task.assignee_id && *id != actor.id)
        {
            self.notify_assigned(actor, &updated, assignee).await;
        }
        Ok(updated)
    }

    /// Apply a drag-and-drop result. `data.index` counts the destination
    /// column's tasks without the moved one.
    pub async fn move_task(
        &self,
        actor: &User,
        task_id: Uuid,
        data: &MoveTask,
    ) -> Result<Task, TaskError> {
        let (task, _) = self.load_task(actor.id, task_id, Permission::EditTasks).await?;
        let destination = Column::find_by_id(&self.pool, data.column_id)
            .await?
            .ok_or(TaskError::ColumnNotFound)?;
        if destination.board_id != task.board_id {
            return Err(TaskError::CrossBoardMove);
        }

        let moved = with_retry(&self.retry, "move_task", || {
            self.reposition_task(task_id, destination.id, data.index)
        })
        .await?
        .ok_or(TaskError::TaskNotFound)?;

        tracing::debug!(
            task_id = %task_id,
            from_column = %task.column_id,
            to_column = %moved.column_id,
            index = data.index,
            order = moved.order,
            "Task moved"
        );
        self.after_board_write(moved.board_id).await;

        if moved.column_id != task.column_id {
            self.fan_out(
                Recipients::BoardMembersExcept {
                    board_id: moved.board_id,
                    actor: actor.id,
                },
                NotificationKind::TaskMoved,
                &moved,
                "Task moved".to_string(),
                format!(
                    "{} moved \"{}\" to {}",
                    actor.display_name, moved.title, destination.name
                ),
            )
            .await;
        }
        Ok(moved)
    }

    async fn reposition_task(
        &self,
        task_id: Uuid,
        column_id: Uuid,
        index: usize,
    ) -> Result<Option<Task>, sqlx::Error> {
        let mut tx = begin_immediate(&self.pool).await?;
        let siblings = Task::column_entries(&mut *tx, column_id, Some(task_id)).await?;
        let order = apply_task_placement(&mut tx, column_id, place(&siblings, index)).await?;
        let task = Task::move_to(&mut *tx, task_id, column_id, order).await?;
        tx.commit().await?;
        Ok(task)
    }

    pub async fn delete_task(&self, actor_id: Uuid, task_id: Uuid) -> Result<(), TaskError> {
        let (task, _) = self.load_task(actor_id, task_id, Permission::EditTasks).await?;
        Task::delete(&self.pool, task_id).await?;
        tracing::debug!(task_id = %task_id, board_id = %task.board_id, "Task deleted");
        self.after_board_write(task.board_id).await;
        Ok(())
    }

    /// Bumps the board's `updated_at` so task activity reorders the board list.
    async fn after_board_write(&self, board_id: Uuid) {
        if let Err(e) = Board::touch(&self.pool, board_id).await {
            tracing::warn!(board_id = %board_id, error = %e, "Failed to touch board");
        }
        self.events.publish(Topic::Board(board_id));
    }

    async fn column_on_board(&self, board_id: Uuid, column_id: Uuid) -> Result<Column, TaskError> {
        Column::find_by_id(&self.pool, column_id)
            .await?
            .filter(|c| c.board_id == board_id)
            .ok_or(TaskError::ColumnNotFound)
    }

    async fn ensure_member(&self, board_id: Uuid, user_id: Uuid) -> Result<(), TaskError> {
        BoardMember::find(&self.pool, board_id, user_id)
            .await?
            .map(|_| ())
            .ok_or(TaskError::AssigneeNotMember)
    }

    async fn notify_assigned(&self, actor: &User, task: &Task, assignee: Uuid) {
        self.fan_out(
            Recipients::User(assignee),
            NotificationKind::TaskAssigned,
            task,
            "Task assigned to you".to_string(),
            format!("{} assigned you \"{}\"", actor.display_name, task.title),
        )
        .await;
    }

    /// Notifications never fail the write that caused them.
    async fn fan_out(
        &self,
        recipients: Recipients,
        kind: NotificationKind,
        task: &Task,
        title: String,
        body: String,
    ) {
        let draft = NotificationDraft {
            kind,
            board_id: Some(task.board_id),
            task_id: Some(task.id),
            title,
            body,
        };
        if let Err(e) = self.notifier.notify(recipients, draft).await {
            tracing::warn!(task_id = %task.id, kind = %kind, error = %e, "Failed to send notifications");
        }
    }
}

async fn apply_task_placement(
    tx: &mut Transaction<'_, Sqlite>,
    column_id: Uuid,
    placement: Placement,
) -> Result<f64, sqlx::Error> {
    match placement {
        Placement::Direct(order) => Ok(order),
        Placement::Renumber { orders, order } => {
            tracing::warn!(
                column_id = %column_id,
                tasks = orders.len(),
                "Task orders exhausted, renumbering column"
            );
            Task::write_orders(tx, &orders).await?;
            Ok(order)
        }
    }
}


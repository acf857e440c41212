//! Tasks: cards that live in exactly one column of a board.
//!
//! A task's vertical position inside its column is its `order`. Reorders and
//! moves only ever rewrite the moved task's row, see [`Task::move_to`].

mod queries;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Task {
    pub id: Uuid,
    pub board_id: Uuid,
    pub column_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub created_by: Uuid,
    #[sqlx(rename = "sort_order")]
    #[serde(rename = "order")]
    pub order: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct CreateTask {
    pub column_id: Uuid,
    pub title: String,
    #[ts(optional)]
    pub description: Option<String>,
    #[ts(optional)]
    pub assignee_id: Option<Uuid>,
    /// Insert at this position instead of appending to the column.
    #[ts(optional)]
    pub index: Option<usize>,
}

/// Partial update. `description: null` and `assignee_id: null` clear the field;
/// omitting a field leaves it unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct UpdateTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "super::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional, type = "string | null")]
    pub description: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "super::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional, type = "string | null")]
    pub assignee_id: Option<Option<Uuid>>,
}

/// A drag-and-drop result: the destination column and the 0-based index the
/// task was dropped at, counted without the task itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS)]
pub struct MoveTask {
    pub column_id: Uuid,
    pub index: usize,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct TaskFilter {
    #[ts(optional)]
    pub column_id: Option<Uuid>,
}

/// Column values for a new task row, after validation and placement.
#[derive(Debug, Clone)]
pub struct NewTask<'a> {
    pub id: Uuid,
    pub board_id: Uuid,
    pub column_id: Uuid,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub assignee_id: Option<Uuid>,
    pub created_by: Uuid,
    pub order: f64,
}

//! Persistent Kanban models.
//!
//! Orderable rows (columns and tasks) store their position in a `sort_order`
//! REAL column, exposed as `order`. Every ordered read uses
//! `ORDER BY sort_order ASC, id ASC` so equal orders still produce a
//! deterministic sequence.

use serde::{Deserialize, Deserializer};
use sqlx::FromRow;
use uuid::Uuid;

pub mod board;
pub mod column;
pub mod membership;
pub mod notification;
pub mod push_subscription;
pub mod task;
pub mod user;

/// The `(id, order)` pair of a sibling row, as read for reorder decisions.
#[derive(Debug, Clone, Copy, PartialEq, FromRow)]
pub struct OrderEntry {
    pub id: Uuid,
    #[sqlx(rename = "sort_order")]
    pub order: f64,
}

impl OrderEntry {
    pub fn new(id: Uuid, order: f64) -> Self {
        Self { id, order }
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in partial-update payloads.
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

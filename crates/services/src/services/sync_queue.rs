//! Server-side parking for writes a device made while offline.
//!
//! Queues are in memory, keyed by user and device. Replay applies the queued
//! operations in order through [`TaskService`] as the queue's owner, drops
//! the ones that succeed and leaves failures where they were. Replays of one
//! queue never overlap.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use db::models::{
    task::{CreateTask, MoveTask, UpdateTask},
    user::User,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use ts_rs::TS;
use uuid::Uuid;

use super::tasks::{TaskError, TaskService};

pub const MAX_QUEUED_OPERATIONS: usize = 500;
const MAX_DEVICE_ID_LEN: usize = 128;

#[derive(Debug, Error, PartialEq)]
pub enum SyncError {
    #[error("Invalid device id")]
    InvalidDevice,
    #[error("Device queue is full ({MAX_QUEUED_OPERATIONS} operations)")]
    QueueFull,
    #[error("Queued operation not found")]
    OperationNotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncOperation {
    CreateTask { board_id: Uuid, task: CreateTask },
    UpdateTask { task_id: Uuid, changes: UpdateTask },
    MoveTask { task_id: Uuid, column_id: Uuid, index: usize },
    DeleteTask { task_id: Uuid },
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct QueuedOperation {
    pub id: Uuid,
    pub device_id: String,
    pub operation: SyncOperation,
    pub position: usize,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplayStatus {
    Applied,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct ReplayResult {
    pub operation_id: Uuid,
    #[serde(flatten)]
    #[ts(flatten)]
    pub status: ReplayStatus,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct ReplayReport {
    pub applied: usize,
    pub failed: usize,
    pub results: Vec<ReplayResult>,
    /// What is left in the queue afterwards.
    pub remaining: Vec<QueuedOperation>,
}

type QueueKey = (Uuid, String);

#[derive(Debug, Clone, Default)]
pub struct SyncQueueStore {
    queues: Arc<RwLock<HashMap<QueueKey, Vec<QueuedOperation>>>>,
    /// One lock per queue with a replay in flight or waiting.
    replaying: Arc<Mutex<HashMap<QueueKey, Arc<Mutex<()>>>>>,
}

fn validate_device_id(device_id: &str) -> Result<(), SyncError> {
    let valid = !device_id.is_empty()
        && device_id.len() <= MAX_DEVICE_ID_LEN
        && device_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SyncError::InvalidDevice)
    }
}

fn key(user_id: Uuid, device_id: &str) -> QueueKey {
    (user_id, device_id.to_string())
}

fn renumber(queue: &mut [QueuedOperation]) {
    for (idx, op) in queue.iter_mut().enumerate() {
        op.position = idx;
    }
}

impl SyncQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<Vec<QueuedOperation>, SyncError> {
        validate_device_id(device_id)?;
        let queues = self.queues.read().await;
        Ok(queues
            .get(&key(user_id, device_id))
            .cloned()
            .unwrap_or_default())
    }

    pub async fn enqueue(
        &self,
        user_id: Uuid,
        device_id: &str,
        operation: SyncOperation,
    ) -> Result<QueuedOperation, SyncError> {
        validate_device_id(device_id)?;
        let mut queues = self.queues.write().await;
        let queue = queues.entry(key(user_id, device_id)).or_default();
        if queue.len() >= MAX_QUEUED_OPERATIONS {
            return Err(SyncError::QueueFull);
        }

        let queued = QueuedOperation {
            id: Uuid::new_v4(),
            device_id: device_id.to_string(),
            operation,
            position: queue.len(),
            created_at: Utc::now(),
        };
        queue.push(queued.clone());
        Ok(queued)
    }

    pub async fn remove(
        &self,
        user_id: Uuid,
        device_id: &str,
        operation_id: Uuid,
    ) -> Result<(), SyncError> {
        validate_device_id(device_id)?;
        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(&key(user_id, device_id))
            .ok_or(SyncError::OperationNotFound)?;
        let before = queue.len();
        queue.retain(|op| op.id != operation_id);
        if queue.len() == before {
            return Err(SyncError::OperationNotFound);
        }
        renumber(queue);
        Ok(())
    }

    pub async fn clear(&self, user_id: Uuid, device_id: &str) -> Result<(), SyncError> {
        validate_device_id(device_id)?;
        self.queues.write().await.remove(&key(user_id, device_id));
        Ok(())
    }

    /// Apply the queue in order as `actor`. Operations queued while the
    /// replay runs are left for the next replay. A second replay of the same
    /// queue waits and then sees only what the first one kept.
    pub async fn replay(
        &self,
        tasks: &TaskService,
        actor: &User,
        device_id: &str,
    ) -> Result<ReplayReport, SyncError> {
        validate_device_id(device_id)?;
        let queue_key = key(actor.id, device_id);
        let replay_lock = self
            .replaying
            .lock()
            .await
            .entry(queue_key.clone())
            .or_default()
            .clone();

        let report = {
            let _guard = replay_lock.lock().await;
            self.replay_locked(tasks, actor, device_id).await
        };

        let mut replaying = self.replaying.lock().await;
        // The map and this call hold the only references when nobody waits.
        if Arc::strong_count(&replay_lock) == 2 {
            replaying.remove(&queue_key);
        }
        report
    }

    async fn replay_locked(
        &self,
        tasks: &TaskService,
        actor: &User,
        device_id: &str,
    ) -> Result<ReplayReport, SyncError> {
        let pending = self.list(actor.id, device_id).await?;

        let mut results = Vec::with_capacity(pending.len());
        let mut applied_ids = Vec::new();
        for queued in &pending {
            let status = match apply(tasks, actor, &queued.operation).await {
                Ok(()) => {
                    applied_ids.push(queued.id);
                    ReplayStatus::Applied
                }
                Err(e) => {
                    tracing::info!(
                        operation_id = %queued.id,
                        device_id,
                        error = %e,
                        "Queued operation failed, keeping it"
                    );
                    ReplayStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            results.push(ReplayResult {
                operation_id: queued.id,
                status,
            });
        }

        let remaining = {
            let mut queues = self.queues.write().await;
            let queue_key = key(actor.id, device_id);
            let remaining = match queues.get_mut(&queue_key) {
                Some(queue) => {
                    queue.retain(|op| !applied_ids.contains(&op.id));
                    renumber(queue);
                    queue.clone()
                }
                None => Vec::new(),
            };
            if remaining.is_empty() {
                queues.remove(&queue_key);
            }
            remaining
        };

        let applied = applied_ids.len();
        tracing::info!(
            user_id = %actor.id,
            device_id,
            applied,
            failed = results.len() - applied,
            "Replayed device queue"
        );
        Ok(ReplayReport {
            applied,
            failed: results.len() - applied,
            results,
            remaining,
        })
    }
}

async fn apply(tasks: &TaskService, actor: &User, operation: &SyncOperation) -> Result<(), TaskError> {
    match operation {
        SyncOperation::CreateTask { board_id, task } => {
            tasks.create_task(actor, *board_id, task).await?;
        }
        SyncOperation::UpdateTask { task_id, changes } => {
            tasks.update_task(actor, *task_id, changes).await?;
        }
        SyncOperation::MoveTask {
            task_id,
            column_id,
            index,
        } => {
            let data = MoveTask {
                column_id: *column_id,
                index: *index,
            };
            tasks.move_task(actor, *task_id, &data).await?;
        }
        SyncOperation::DeleteTask { task_id } => {
            tasks.delete_task(actor.id, *task_id).await?;
        }
    }
    Ok(())
}

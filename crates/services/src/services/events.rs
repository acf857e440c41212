//! Live board and inbox subscriptions.
//!
//! Writers publish a [`Topic`] after every committed change. Each
//! [`Subscription`] owns a broadcast receiver and turns matching topics into
//! full snapshots read back from the database, so subscribers never have to
//! apply deltas. A receiver that falls behind simply reloads.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use db::models::{
    board::BoardSnapshot,
    membership::BoardMember,
    notification::{MAX_NOTIFICATION_PAGE, Notification},
};
use futures::{Stream, stream::BoxStream};
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use ts_rs::TS;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// A board, its columns, tasks or members changed.
    Board(Uuid),
    /// A user's notifications changed.
    Inbox(Uuid),
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(untagged)]
pub enum Snapshot {
    Board(BoardSnapshot),
    Inbox(Vec<Notification>),
}

#[derive(Debug, Error)]
pub enum EventsError {
    #[error("Board no longer exists")]
    BoardGone,
    #[error("Board access was revoked")]
    AccessRevoked,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl EventsError {
    /// Errors after which the subscription cannot continue.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventsError::BoardGone | EventsError::AccessRevoked)
    }
}

#[derive(Clone)]
pub struct BoardEvents {
    pool: SqlitePool,
    sender: broadcast::Sender<Topic>,
}

impl BoardEvents {
    pub fn new(pool: SqlitePool) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { pool, sender }
    }

    pub fn publish(&self, topic: Topic) {
        // No receivers is not an error.
        let _ = self.sender.send(topic);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Initial snapshot, then a fresh snapshot after every change to `topic`.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        self.open(topic, None)
    }

    /// Like [`subscribe`](Self::subscribe), but a board subscription ends with
    /// [`EventsError::AccessRevoked`] once `viewer` is no longer a member.
    pub fn subscribe_as(&self, topic: Topic, viewer: Uuid) -> Subscription {
        self.open(topic, Some(viewer))
    }

    fn open(&self, topic: Topic, viewer: Option<Uuid>) -> Subscription {
        // Subscribe before the first read so no change can slip in between.
        let mut rx = self.sender.subscribe();
        let pool = self.pool.clone();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let stream = async_stream::stream! {
            match load(&pool, topic, viewer).await {
                Ok(snapshot) => yield Ok(snapshot),
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }

            loop {
                let received = tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    msg = rx.recv() => Some(msg),
                };

                let reload = match received {
                    None => break,
                    Some(Ok(changed)) => changed == topic,
                    Some(Err(RecvError::Lagged(skipped))) => {
                        tracing::debug!(?topic, skipped, "Subscriber lagged, resyncing");
                        true
                    }
                    Some(Err(RecvError::Closed)) => break,
                };
                if !reload {
                    continue;
                }

                match load(&pool, topic, viewer).await {
                    Ok(snapshot) => yield Ok(snapshot),
                    Err(e) => {
                        let terminal = e.is_terminal();
                        yield Err(e);
                        if terminal {
                            return;
                        }
                    }
                }
            }
        };

        Subscription {
            inner: Box::pin(stream),
            cancel,
        }
    }
}

async fn load(
    pool: &SqlitePool,
    topic: Topic,
    viewer: Option<Uuid>,
) -> Result<Snapshot, EventsError> {
    match topic {
        Topic::Board(board_id) => {
            if let Some(viewer) = viewer
                && BoardMember::find(pool, board_id, viewer).await?.is_none()
            {
                // Deleted boards take their memberships with them.
                return match BoardSnapshot::load(pool, board_id).await? {
                    Some(_) => Err(EventsError::AccessRevoked),
                    None => Err(EventsError::BoardGone),
                };
            }
            BoardSnapshot::load(pool, board_id)
                .await?
                .map(Snapshot::Board)
                .ok_or(EventsError::BoardGone)
        }
        Topic::Inbox(user_id) => {
            let unread =
                Notification::list_for_user(pool, user_id, true, MAX_NOTIFICATION_PAGE).await?;
            Ok(Snapshot::Inbox(unread))
        }
    }
}

/// A live snapshot stream. Ends after [`unsubscribe`](Self::unsubscribe), when
/// dropped, or after a terminal error.
pub struct Subscription {
    inner: BoxStream<'static, Result<Snapshot, EventsError>>,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }
}

impl Stream for Subscription {
    type Item = Result<Snapshot, EventsError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

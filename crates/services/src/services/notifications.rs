//! Notification fan-out and the per-user inbox.

use db::models::{
    membership::BoardMember,
    notification::{NewNotification, Notification, NotificationKind, NotificationQuery},
};
use sqlx::SqlitePool;
use thiserror::Error;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use super::{
    events::{BoardEvents, Topic},
    push::{PushPayload, PushService},
};

const DEFAULT_PAGE: i64 = 50;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification not found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy)]
pub enum Recipients {
    /// Everyone on the board except the user who caused the event.
    BoardMembersExcept { board_id: Uuid, actor: Uuid },
    User(Uuid),
}

#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub kind: NotificationKind,
    pub board_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub title: String,
    pub body: String,
}

impl NotificationDraft {
    fn push_payload(&self) -> PushPayload {
        PushPayload {
            title: self.title.clone(),
            body: self.body.clone(),
            url: self.board_id.map(|id| format!("/boards/{id}")),
            tag: self.task_id.map(|id| format!("{}:{id}", self.kind)),
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    pool: SqlitePool,
    events: BoardEvents,
    push: PushService,
    deliveries: TaskTracker,
}

impl Notifier {
    pub fn new(pool: SqlitePool, events: BoardEvents, push: PushService) -> Self {
        Self {
            pool,
            events,
            push,
            deliveries: TaskTracker::new(),
        }
    }

    pub fn push(&self) -> &PushService {
        &self.push
    }

    /// Store one notification per recipient, refresh their inboxes and hand
    /// push delivery to background tasks.
    pub async fn notify(
        &self,
        recipients: Recipients,
        draft: NotificationDraft,
    ) -> Result<Vec<Notification>, NotificationError> {
        let user_ids = match recipients {
            Recipients::BoardMembersExcept { board_id, actor } => {
                BoardMember::member_ids(&self.pool, board_id)
                    .await?
                    .into_iter()
                    .filter(|id| *id != actor)
                    .collect()
            }
            Recipients::User(user_id) => vec![user_id],
        };
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(user_ids.len());
        for user_id in &user_ids {
            let row = NewNotification {
                user_id: *user_id,
                board_id: draft.board_id,
                task_id: draft.task_id,
                kind: draft.kind,
                title: draft.title.clone(),
                body: draft.body.clone(),
            };
            created.push(Notification::create(&mut *tx, &row).await?);
        }
        tx.commit().await?;

        tracing::debug!(kind = %draft.kind, recipients = created.len(), "Notifications stored");

        let payload = draft.push_payload();
        for user_id in user_ids {
            self.events.publish(Topic::Inbox(user_id));

            if self.push.is_enabled() {
                let push = self.push.clone();
                let payload = payload.clone();
                self.deliveries.spawn(async move {
                    let report = push.deliver_to_user(user_id, &payload).await;
                    tracing::debug!(user_id = %user_id, ?report, "Push delivery finished");
                });
            }
        }

        Ok(created)
    }

    /// Wait for every push delivery spawned so far.
    pub async fn flush_deliveries(&self) {
        self.deliveries.close();
        self.deliveries.wait().await;
        self.deliveries.reopen();
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        query: &NotificationQuery,
    ) -> Result<Vec<Notification>, NotificationError> {
        Ok(Notification::list_for_user(
            &self.pool,
            user_id,
            query.unread_only.unwrap_or(false),
            query.limit.unwrap_or(DEFAULT_PAGE),
        )
        .await?)
    }

    pub async fn mark_read(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> Result<Notification, NotificationError> {
        let notification = Notification::mark_read(&self.pool, notification_id, user_id)
            .await?
            .ok_or(NotificationError::NotFound)?;
        self.events.publish(Topic::Inbox(user_id));
        Ok(notification)
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, NotificationError> {
        let updated = Notification::mark_all_read(&self.pool, user_id).await?;
        if updated > 0 {
            self.events.publish(Topic::Inbox(user_id));
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use db::{
        models::{
            board::Board,
            membership::MemberRole,
            push_subscription::{PushKeys, RegisterPushSubscription},
            user::{UpsertUser, User},
        },
        test_utils::create_test_pool,
    };

    use super::*;
    use crate::services::push::tests::RecordingPushClient;

    async fn user(pool: &SqlitePool, name: &str) -> User {
        User::upsert(
            pool,
            &UpsertUser {
                id: Uuid::new_v4(),
                email: format!("{name}@example.com"),
                display_name: name.to_string(),
            },
        )
        .await
        .unwrap()
    }

    fn draft(board_id: Uuid) -> NotificationDraft {
        NotificationDraft {
            kind: NotificationKind::TaskCreated,
            board_id: Some(board_id),
            task_id: None,
            title: "New task".into(),
            body: "Ada added Write docs".into(),
        }
    }

    #[tokio::test]
    async fn fan_out_skips_the_actor_and_pushes_to_recipients() {
        let (pool, _dir) = create_test_pool().await;
        let ada = user(&pool, "ada").await;
        let bob = user(&pool, "bob").await;
        let cy = user(&pool, "cy").await;

        let board = Board::create(&pool, Uuid::new_v4(), ada.id, "Launch", None)
            .await
            .unwrap();
        for (u, role) in [
            (&ada, MemberRole::Owner),
            (&bob, MemberRole::Editor),
            (&cy, MemberRole::Member),
        ] {
            BoardMember::create(&pool, board.id, u.id, role).await.unwrap();
        }

        let client = Arc::new(RecordingPushClient::default());
        let push = PushService::new(pool.clone(), client.clone(), true);
        push.register(
            bob.id,
            &RegisterPushSubscription {
                endpoint: "https://push.example.com/bob".into(),
                keys: PushKeys {
                    p256dh: "k".into(),
                    auth: "a".into(),
                },
            },
        )
        .await
        .unwrap();

        let events = BoardEvents::new(pool.clone());
        let notifier = Notifier::new(pool.clone(), events, push);

        let created = notifier
            .notify(
                Recipients::BoardMembersExcept {
                    board_id: board.id,
                    actor: ada.id,
                },
                draft(board.id),
            )
            .await
            .unwrap();

        let mut recipients: Vec<Uuid> = created.iter().map(|n| n.user_id).collect();
        recipients.sort();
        let mut expected = vec![bob.id, cy.id];
        expected.sort();
        assert_eq!(recipients, expected);

        notifier.flush_deliveries().await;
        let sent = client.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "https://push.example.com/bob");
        assert_eq!(sent[0].1.url.as_deref(), Some(format!("/boards/{}", board.id).as_str()));
    }

    #[tokio::test]
    async fn mark_read_is_scoped_to_owner() {
        let (pool, _dir) = create_test_pool().await;
        let ada = user(&pool, "ada").await;
        let bob = user(&pool, "bob").await;

        let client = Arc::new(RecordingPushClient::default());
        let notifier = Notifier::new(
            pool.clone(),
            BoardEvents::new(pool.clone()),
            PushService::new(pool.clone(), client, false),
        );

        let created = notifier
            .notify(
                Recipients::User(ada.id),
                NotificationDraft {
                    board_id: None,
                    ..draft(Uuid::new_v4())
                },
            )
            .await
            .unwrap();
        let id = created[0].id;

        assert!(matches!(
            notifier.mark_read(bob.id, id).await,
            Err(NotificationError::NotFound)
        ));
        let read = notifier.mark_read(ada.id, id).await.unwrap();
        assert!(read.read_at.is_some());

        let unread = notifier
            .list(
                ada.id,
                &NotificationQuery {
                    unread_only: Some(true),
                    limit: None,
                },
            )
            .await
            .unwrap();
        assert!(unread.is_empty());
        assert_eq!(notifier.mark_all_read(ada.id).await.unwrap(), 0);
    }
}

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use db::{
    models::{
        board::{BoardWithRole, CreateBoard},
        column::Column,
        membership::{BoardMember, MemberRole},
        push_subscription::PushSubscription,
        user::{UpsertUser, User},
    },
    test_utils::create_test_pool,
};
use services::services::{
    boards::BoardService,
    events::BoardEvents,
    members::MemberService,
    notifications::Notifier,
    push::{PushClient, PushError, PushOutcome, PushPayload, PushService},
    sync_queue::SyncQueueStore,
    tasks::TaskService,
};
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

#[derive(Default)]
pub struct RecordingPushClient {
    pub sent: Mutex<Vec<(String, PushPayload)>>,
}

#[async_trait]
impl PushClient for RecordingPushClient {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> Result<PushOutcome, PushError> {
        self.sent
            .lock()
            .unwrap()
            .push((subscription.endpoint.clone(), payload.clone()));
        Ok(PushOutcome::Delivered)
    }
}

pub struct Harness {
    pub pool: SqlitePool,
    pub events: BoardEvents,
    pub notifier: Notifier,
    pub boards: BoardService,
    pub tasks: TaskService,
    pub members: MemberService,
    pub sync: SyncQueueStore,
    pub push_client: Arc<RecordingPushClient>,
    _dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        let (pool, dir) = create_test_pool().await;
        let events = BoardEvents::new(pool.clone());
        let push_client = Arc::new(RecordingPushClient::default());
        let push = PushService::new(pool.clone(), push_client.clone(), true);
        let notifier = Notifier::new(pool.clone(), events.clone(), push);
        Self {
            boards: BoardService::new(pool.clone(), events.clone()),
            tasks: TaskService::new(pool.clone(), events.clone(), notifier.clone()),
            members: MemberService::new(pool.clone(), events.clone(), notifier.clone()),
            sync: SyncQueueStore::new(),
            pool,
            events,
            notifier,
            push_client,
            _dir: dir,
        }
    }

    pub async fn user(&self, name: &str) -> User {
        User::upsert(
            &self.pool,
            &UpsertUser {
                id: Uuid::new_v4(),
                email: format!("{name}@example.com"),
                display_name: name.to_string(),
            },
        )
        .await
        .unwrap()
    }

    /// A board owned by `owner` with the three default columns.
    pub async fn board(&self, owner: &User) -> (BoardWithRole, Vec<Column>) {
        let board = self
            .boards
            .create_board(
                owner.id,
                &CreateBoard {
                    name: "Launch".into(),
                    description: None,
                    with_default_columns: None,
                },
            )
            .await
            .unwrap();
        let columns = self.boards.list_columns(owner.id, board.id).await.unwrap();
        (board, columns)
    }

    pub async fn add_member(&self, board_id: Uuid, user: &User, role: MemberRole) {
        BoardMember::create(&self.pool, board_id, user.id, role)
            .await
            .unwrap();
    }
}

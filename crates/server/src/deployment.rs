//! Shared application state handed to every handler.

use std::sync::Arc;

use db::DBService;
use services::services::{
    auth::JwtService,
    boards::BoardService,
    config::ServerConfig,
    events::BoardEvents,
    members::MemberService,
    notifications::Notifier,
    push::{HttpPushClient, PushClient, PushError, PushService},
    sync_queue::SyncQueueStore,
    tasks::TaskService,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Push(#[from] PushError),
}

#[derive(Clone)]
pub struct DeploymentImpl {
    db: DBService,
    config: Arc<ServerConfig>,
    jwt: Arc<JwtService>,
    events: BoardEvents,
    notifier: Notifier,
    boards: BoardService,
    tasks: TaskService,
    members: MemberService,
    sync_queue: SyncQueueStore,
}

impl DeploymentImpl {
    /// Open the database and wire up the HTTP push client.
    pub async fn new(config: ServerConfig) -> Result<Self, DeploymentError> {
        let db = DBService::new(&config.database_path, config.sqlite_max_connections).await?;
        let push_client = Arc::new(HttpPushClient::new(config.push_ttl)?);
        Ok(Self::from_parts(db, config, push_client))
    }

    pub fn from_parts(db: DBService, config: ServerConfig, push_client: Arc<dyn PushClient>) -> Self {
        let pool = db.pool.clone();
        let events = BoardEvents::new(pool.clone());
        let push = PushService::new(pool.clone(), push_client, config.push_enabled);
        let notifier = Notifier::new(pool.clone(), events.clone(), push);
        let jwt = JwtService::new(config.jwt_secret.clone(), config.token_audience.clone());

        Self {
            boards: BoardService::new(pool.clone(), events.clone()),
            tasks: TaskService::new(pool.clone(), events.clone(), notifier.clone()),
            members: MemberService::new(pool, events.clone(), notifier.clone()),
            sync_queue: SyncQueueStore::new(),
            jwt: Arc::new(jwt),
            config: Arc::new(config),
            db,
            events,
            notifier,
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn jwt(&self) -> Arc<JwtService> {
        Arc::clone(&self.jwt)
    }

    pub fn events(&self) -> &BoardEvents {
        &self.events
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn push(&self) -> &PushService {
        self.notifier.push()
    }

    pub fn boards(&self) -> &BoardService {
        &self.boards
    }

    pub fn tasks(&self) -> &TaskService {
        &self.tasks
    }

    pub fn members(&self) -> &MemberService {
        &self.members
    }

    pub fn sync_queue(&self) -> &SyncQueueStore {
        &self.sync_queue
    }
}

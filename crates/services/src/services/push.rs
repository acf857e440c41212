//! Push delivery to registered browser endpoints.
//!
//! Delivery is best effort: failures are logged and dropped, and endpoints the
//! push service reports as gone (404/410) are deleted.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use db::models::push_subscription::{PushSubscription, RegisterPushSubscription};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("Invalid push endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Push service rejected the message with status {status}")]
    Rejected { status: u16 },
    #[error("push transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// The JSON body a service worker receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    /// Client route to open when the notification is clicked.
    #[ts(optional)]
    pub url: Option<String>,
    /// Notifications with the same tag replace each other on the device.
    #[ts(optional)]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered,
    /// The endpoint no longer exists and should be forgotten.
    Gone,
}

#[async_trait]
pub trait PushClient: Send + Sync {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> Result<PushOutcome, PushError>;
}

/// POSTs the payload as JSON to the subscription endpoint with a `TTL` header.
#[derive(Debug, Clone)]
pub struct HttpPushClient {
    http: Client,
    ttl: Duration,
}

impl HttpPushClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(ttl: Duration) -> Result<Self, PushError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("kanban-push/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, ttl })
    }
}

#[async_trait]
impl PushClient for HttpPushClient {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> Result<PushOutcome, PushError> {
        let response = self
            .http
            .post(&subscription.endpoint)
            .header("TTL", self.ttl.as_secs().to_string())
            .json(payload)
            .send()
            .await?;

        outcome_for_status(response.status())
    }
}

fn outcome_for_status(status: StatusCode) -> Result<PushOutcome, PushError> {
    match status {
        s if s.is_success() => Ok(PushOutcome::Delivered),
        StatusCode::NOT_FOUND | StatusCode::GONE => Ok(PushOutcome::Gone),
        s => Err(PushError::Rejected { status: s.as_u16() }),
    }
}

/// Counts from one delivery round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub removed: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct PushService {
    pool: SqlitePool,
    client: Arc<dyn PushClient>,
    enabled: bool,
}

impl PushService {
    pub fn new(pool: SqlitePool, client: Arc<dyn PushClient>, enabled: bool) -> Self {
        Self {
            pool,
            client,
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn register(
        &self,
        user_id: Uuid,
        data: &RegisterPushSubscription,
    ) -> Result<PushSubscription, PushError> {
        validate_endpoint(&data.endpoint)?;
        if data.keys.p256dh.trim().is_empty() || data.keys.auth.trim().is_empty() {
            return Err(PushError::InvalidEndpoint(
                "subscription keys must not be empty".to_string(),
            ));
        }
        let subscription = PushSubscription::upsert(&self.pool, user_id, data).await?;
        tracing::info!(user_id = %user_id, subscription_id = %subscription.id, "Registered push subscription");
        Ok(subscription)
    }

    /// Returns whether a subscription was removed.
    pub async fn unregister(&self, user_id: Uuid, endpoint: &str) -> Result<bool, PushError> {
        let removed = PushSubscription::delete_by_endpoint(&self.pool, user_id, endpoint).await?;
        Ok(removed > 0)
    }

    /// Send `payload` to every endpoint the user registered.
    pub async fn deliver_to_user(&self, user_id: Uuid, payload: &PushPayload) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        if !self.enabled {
            return report;
        }

        let subscriptions = match PushSubscription::find_by_user(&self.pool, user_id).await {
            Ok(subs) => subs,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to load push subscriptions");
                return report;
            }
        };

        for subscription in &subscriptions {
            match self.client.send(subscription, payload).await {
                Ok(PushOutcome::Delivered) => report.delivered += 1,
                Ok(PushOutcome::Gone) => {
                    match PushSubscription::delete(&self.pool, subscription.id).await {
                        Ok(_) => {
                            report.removed += 1;
                            tracing::info!(
                                subscription_id = %subscription.id,
                                "Removed expired push subscription"
                            );
                        }
                        Err(e) => {
                            report.failed += 1;
                            tracing::warn!(subscription_id = %subscription.id, error = %e, "Failed to remove expired push subscription");
                        }
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(subscription_id = %subscription.id, error = %e, "Push delivery failed");
                }
            }
        }

        report
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), PushError> {
    let url = Url::parse(endpoint).map_err(|e| PushError::InvalidEndpoint(e.to_string()))?;
    match url.scheme() {
        "https" => Ok(()),
        "http" if matches!(url.host_str(), Some("localhost" | "127.0.0.1")) => Ok(()),
        other => Err(PushError::InvalidEndpoint(format!(
            "unsupported scheme '{other}'"
        ))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use db::{
        models::{
            push_subscription::PushKeys,
            user::{UpsertUser, User},
        },
        test_utils::create_test_pool,
    };

    use super::*;

    /// Records every send; endpoints containing "gone" report `Gone`,
    /// endpoints containing "broken" fail.
    #[derive(Default)]
    pub(crate) struct RecordingPushClient {
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
            if subscription.endpoint.contains("gone") {
                Ok(PushOutcome::Gone)
            } else if subscription.endpoint.contains("broken") {
                Err(PushError::Rejected { status: 500 })
            } else {
                Ok(PushOutcome::Delivered)
            }
        }
    }

    fn register(endpoint: &str) -> RegisterPushSubscription {
        RegisterPushSubscription {
            endpoint: endpoint.to_string(),
            keys: PushKeys {
                p256dh: "BNc...".to_string(),
                auth: "tBH...".to_string(),
            },
        }
    }

    fn payload() -> PushPayload {
        PushPayload {
            title: "Task moved".into(),
            body: "Fix login moved to Done".into(),
            url: None,
            tag: None,
        }
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            outcome_for_status(StatusCode::CREATED).unwrap(),
            PushOutcome::Delivered
        );
        assert_eq!(
            outcome_for_status(StatusCode::GONE).unwrap(),
            PushOutcome::Gone
        );
        assert_eq!(
            outcome_for_status(StatusCode::NOT_FOUND).unwrap(),
            PushOutcome::Gone
        );
        assert!(matches!(
            outcome_for_status(StatusCode::TOO_MANY_REQUESTS),
            Err(PushError::Rejected { status: 429 })
        ));
    }

    #[test]
    fn endpoint_must_be_https_outside_localhost() {
        assert!(validate_endpoint("https://fcm.googleapis.com/fcm/send/abc").is_ok());
        assert!(validate_endpoint("http://localhost:9000/push").is_ok());
        assert!(validate_endpoint("http://push.example.com/abc").is_err());
        assert!(validate_endpoint("not a url").is_err());
    }

    #[tokio::test]
    async fn gone_subscriptions_are_deleted_and_failures_dropped() {
        let (pool, _dir) = create_test_pool().await;
        let user = User::upsert(
            &pool,
            &UpsertUser {
                id: Uuid::new_v4(),
                email: "ada@example.com".into(),
                display_name: "Ada".into(),
            },
        )
        .await
        .unwrap();

        let client = Arc::new(RecordingPushClient::default());
        let service = PushService::new(pool.clone(), client.clone(), true);
        for endpoint in [
            "https://push.example.com/ok",
            "https://push.example.com/gone",
            "https://push.example.com/broken",
        ] {
            service.register(user.id, &register(endpoint)).await.unwrap();
        }

        let report = service.deliver_to_user(user.id, &payload()).await;
        assert_eq!(
            report,
            DeliveryReport {
                delivered: 1,
                removed: 1,
                failed: 1
            }
        );
        assert_eq!(client.sent.lock().unwrap().len(), 3);

        let remaining: Vec<String> = PushSubscription::find_by_user(&pool, user.id)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.endpoint)
            .collect();
        assert_eq!(remaining.len(), 2);
        assert!(!remaining.iter().any(|e| e.contains("gone")));
    }

    #[tokio::test]
    async fn disabled_service_sends_nothing() {
        let (pool, _dir) = create_test_pool().await;
        let client = Arc::new(RecordingPushClient::default());
        let service = PushService::new(pool, client.clone(), false);

        let report = service.deliver_to_user(Uuid::new_v4(), &payload()).await;
        assert_eq!(report, DeliveryReport::default());
        assert!(client.sent.lock().unwrap().is_empty());
    }
}

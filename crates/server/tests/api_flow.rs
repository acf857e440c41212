use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use db::{models::push_subscription::PushSubscription, test_utils::create_test_db};
use secrecy::SecretString;
use serde_json::{Value, json};
use server::{DeploymentImpl, routes};
use services::services::{
    auth::JwtService,
    config::ServerConfig,
    push::{PushClient, PushError, PushOutcome, PushPayload},
};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "api-flow-test-secret";

struct NoopPushClient;

#[async_trait]
impl PushClient for NoopPushClient {
    async fn send(
        &self,
        _subscription: &PushSubscription,
        _payload: &PushPayload,
    ) -> Result<PushOutcome, PushError> {
        Ok(PushOutcome::Delivered)
    }
}

struct TestApp {
    router: Router,
    jwt: JwtService,
    _dir: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let (db, dir) = create_test_db().await;
        let db_path = dir.path().join("unused.sqlite").display().to_string();
        let vars = HashMap::from([
            ("KANBAN_JWT_SECRET", SECRET.to_string()),
            ("KANBAN_DATABASE_PATH", db_path),
        ]);
        let config = ServerConfig::from_lookup(|name| vars.get(name).cloned()).unwrap();
        let deployment = DeploymentImpl::from_parts(db, config, Arc::new(NoopPushClient));

        Self {
            router: routes::router(deployment),
            jwt: JwtService::new(SecretString::from(SECRET.to_string()), "kanban"),
            _dir: dir,
        }
    }

    fn token(&self, name: &str) -> String {
        self.jwt
            .mint(
                Uuid::new_v4(),
                &format!("{name}@example.com"),
                name,
                chrono::Duration::hours(1),
            )
            .unwrap()
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn ok(&self, method: &str, uri: &str, token: &str, body: Option<Value>) -> Value {
        let (status, value) = self.call(method, uri, Some(token), body).await;
        assert_eq!(status, StatusCode::OK, "{method} {uri} -> {value}");
        assert_eq!(value["success"], true);
        value["data"].clone()
    }
}

fn titles(snapshot: &Value, column_id: &Value) -> Vec<String> {
    snapshot["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|t| &t["column_id"] == column_id)
        .map(|t| t["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn health_is_public_and_api_requires_a_token() {
    let app = TestApp::new().await;

    let (status, health) = app.call("GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["database_ready"], true);

    let (status, body) = app.call("GET", "/api/boards", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = app.call("GET", "/api/boards", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn request_ids_are_echoed() {
    let app = TestApp::new().await;
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");
}

#[tokio::test]
async fn me_and_preferences() {
    let app = TestApp::new().await;
    let token = app.token("ada");

    let me = app.ok("GET", "/api/me", &token, None).await;
    assert_eq!(me["user"]["email"], "ada@example.com");
    assert_eq!(me["user"]["theme"], "system");

    let user = app
        .ok("PUT", "/api/me/preferences", &token, Some(json!({ "theme": "dark" })))
        .await;
    assert_eq!(user["theme"], "dark");

    // Later requests refresh the profile but keep the theme.
    let me = app.ok("GET", "/api/me", &token, None).await;
    assert_eq!(me["user"]["theme"], "dark");
}

#[tokio::test]
async fn board_task_and_member_flow() {
    let app = TestApp::new().await;
    let ada = app.token("ada");
    let bob = app.token("bob");

    let board = app
        .ok("POST", "/api/boards", &ada, Some(json!({ "name": "Launch" })))
        .await;
    assert_eq!(board["role"], "owner");
    let board_id = board["id"].as_str().unwrap().to_string();

    let columns = app
        .ok("GET", &format!("/api/boards/{board_id}/columns"), &ada, None)
        .await;
    let columns = columns.as_array().unwrap().clone();
    assert_eq!(columns.len(), 3);
    let todo = columns[0]["id"].clone();
    let done = columns[2]["id"].clone();

    for title in ["a", "b", "c"] {
        app.ok(
            "POST",
            &format!("/api/boards/{board_id}/tasks"),
            &ada,
            Some(json!({ "column_id": todo, "title": title })),
        )
        .await;
    }
    let moving = app
        .ok(
            "POST",
            &format!("/api/boards/{board_id}/tasks"),
            &ada,
            Some(json!({ "column_id": done, "title": "m" })),
        )
        .await;
    let task_id = moving["id"].as_str().unwrap().to_string();

    let moved = app
        .ok(
            "POST",
            &format!("/api/tasks/{task_id}/move"),
            &ada,
            Some(json!({ "column_id": todo, "index": 1 })),
        )
        .await;
    assert_eq!(moved["order"], 0.5);

    let snapshot = app
        .ok("GET", &format!("/api/boards/{board_id}/snapshot"), &ada, None)
        .await;
    assert_eq!(titles(&snapshot, &todo), vec!["a", "m", "b", "c"]);
    assert!(titles(&snapshot, &done).is_empty());

    // Bob is unknown to the board until invited.
    app.ok("GET", "/api/me", &bob, None).await;
    let (status, _) = app
        .call("GET", &format!("/api/boards/{board_id}"), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .call("GET", &format!("/api/tasks/{task_id}"), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let member = app
        .ok(
            "POST",
            &format!("/api/boards/{board_id}/members"),
            &ada,
            Some(json!({ "email": "bob@example.com", "role": "member" })),
        )
        .await;
    assert_eq!(member["role"], "member");

    let inbox = app.ok("GET", "/api/notifications", &bob, None).await;
    assert_eq!(inbox.as_array().unwrap().len(), 1);
    assert_eq!(inbox[0]["kind"], "board_invite");

    let fetched = app.ok("GET", &format!("/api/tasks/{task_id}"), &bob, None).await;
    assert_eq!(fetched["title"], "m");

    // Members edit tasks but cannot manage columns.
    app.ok(
        "PUT",
        &format!("/api/tasks/{task_id}"),
        &bob,
        Some(json!({ "description": "from bob" })),
    )
    .await;
    let (status, body) = app
        .call(
            "DELETE",
            &format!("/api/boards/{board_id}/columns/{}", done.as_str().unwrap()),
            Some(&bob),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, _) = app
        .call(
            "POST",
            &format!("/api/boards/{board_id}/members"),
            Some(&ada),
            Some(json!({ "email": "bob@example.com", "role": "editor" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn invalid_moves_are_rejected() {
    let app = TestApp::new().await;
    let ada = app.token("ada");

    let first = app
        .ok("POST", "/api/boards", &ada, Some(json!({ "name": "One" })))
        .await;
    let second = app
        .ok(
            "POST",
            "/api/boards",
            &ada,
            Some(json!({ "name": "Two", "with_default_columns": false })),
        )
        .await;
    let first_id = first["id"].as_str().unwrap();
    let second_id = second["id"].as_str().unwrap();

    let columns = app
        .ok("GET", &format!("/api/boards/{second_id}/columns"), &ada, None)
        .await;
    assert!(columns.as_array().unwrap().is_empty());
    let foreign = app
        .ok(
            "POST",
            &format!("/api/boards/{second_id}/columns"),
            &ada,
            Some(json!({ "name": "Elsewhere" })),
        )
        .await;

    let columns = app
        .ok("GET", &format!("/api/boards/{first_id}/columns"), &ada, None)
        .await;
    let task = app
        .ok(
            "POST",
            &format!("/api/boards/{first_id}/tasks"),
            &ada,
            Some(json!({ "column_id": columns[0]["id"], "title": "stay" })),
        )
        .await;
    let task_id = task["id"].as_str().unwrap();

    let (status, body) = app
        .call(
            "POST",
            &format!("/api/tasks/{task_id}/move"),
            Some(&ada),
            Some(json!({ "column_id": foreign["id"], "index": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = app
        .call(
            "POST",
            &format!("/api/boards/{first_id}/tasks"),
            Some(&ada),
            Some(json!({ "column_id": columns[0]["id"], "title": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn offline_queue_replays_over_http() {
    let app = TestApp::new().await;
    let ada = app.token("ada");

    let board = app
        .ok("POST", "/api/boards", &ada, Some(json!({ "name": "Offline" })))
        .await;
    let board_id = board["id"].as_str().unwrap();
    let columns = app
        .ok("GET", &format!("/api/boards/{board_id}/columns"), &ada, None)
        .await;

    app.ok(
        "POST",
        "/api/sync/tablet/queue",
        &ada,
        Some(json!({
            "type": "create_task",
            "board_id": board_id,
            "task": { "column_id": columns[0]["id"], "title": "written offline" }
        })),
    )
    .await;
    app.ok(
        "POST",
        "/api/sync/tablet/queue",
        &ada,
        Some(json!({ "type": "delete_task", "task_id": Uuid::new_v4() })),
    )
    .await;

    let report = app.ok("POST", "/api/sync/tablet/replay", &ada, None).await;
    assert_eq!(report["applied"], 1);
    assert_eq!(report["failed"], 1);
    assert_eq!(report["results"][0]["status"], "applied");
    assert_eq!(report["results"][1]["status"], "failed");
    assert_eq!(report["remaining"].as_array().unwrap().len(), 1);

    let tasks = app
        .ok("GET", &format!("/api/boards/{board_id}/tasks"), &ada, None)
        .await;
    assert_eq!(tasks[0]["title"], "written offline");

    app.ok("DELETE", "/api/sync/tablet/queue", &ada, None).await;
    let queue = app.ok("GET", "/api/sync/tablet/queue", &ada, None).await;
    assert!(queue.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn push_subscriptions_register_and_unregister() {
    let app = TestApp::new().await;
    let ada = app.token("ada");
    let endpoint = "https://push.example.com/send/abc";

    let (status, _) = app
        .call(
            "POST",
            "/api/push/subscriptions",
            Some(&ada),
            Some(json!({ "endpoint": "ftp://nope", "keys": { "p256dh": "k", "auth": "a" } })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let subscription = app
        .ok(
            "POST",
            "/api/push/subscriptions",
            &ada,
            Some(json!({ "endpoint": endpoint, "keys": { "p256dh": "k", "auth": "a" } })),
        )
        .await;
    assert_eq!(subscription["endpoint"], endpoint);

    app.ok(
        "DELETE",
        "/api/push/subscriptions",
        &ada,
        Some(json!({ "endpoint": endpoint })),
    )
    .await;
    let (status, _) = app
        .call(
            "DELETE",
            "/api/push/subscriptions",
            Some(&ada),
            Some(json!({ "endpoint": endpoint })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

//! Live snapshot streams over WebSocket.
//!
//! Every frame is a [`StreamMsg`]: a full snapshot after each change, a
//! refresh request when a reload failed, and a final `closed` message when the
//! board is deleted or the caller loses access.

use axum::{
    Extension, Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::StreamExt;
use services::services::{
    access::{Permission, authorize},
    events::{EventsError, Snapshot, Subscription, Topic},
};
use utils::stream_msg::StreamMsg;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::RequestContext,
    ws_util::{WsKeepAlive, run_ws_stream},
};

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/boards/{board_id}/stream", get(stream_board_ws))
        .route("/notifications/stream", get(stream_notifications_ws))
}

pub async fn stream_board_ws(
    ws: WebSocketUpgrade,
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(board_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    // Reject outsiders before upgrading so they get a plain 404.
    authorize(&deployment.db().pool, board_id, ctx.user.id, Permission::View).await?;

    let subscription = deployment
        .events()
        .subscribe_as(Topic::Board(board_id), ctx.user.id);
    let user_id = ctx.user.id;
    Ok(ws.on_upgrade(move |socket| async move {
        tracing::debug!(%board_id, %user_id, "Board stream opened");
        if let Err(e) = handle_snapshot_ws(socket, subscription).await {
            tracing::warn!(%board_id, "board WS closed: {}", e);
        }
    }))
}

pub async fn stream_notifications_ws(
    ws: WebSocketUpgrade,
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
) -> impl IntoResponse {
    let subscription = deployment.events().subscribe(Topic::Inbox(ctx.user.id));
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = handle_snapshot_ws(socket, subscription).await {
            tracing::warn!("notifications WS closed: {}", e);
        }
    })
}

/// Dropping the subscription when the socket closes ends the stream.
async fn handle_snapshot_ws(socket: WebSocket, subscription: Subscription) -> anyhow::Result<()> {
    let stream = subscription
        .map(|item| Ok::<_, std::convert::Infallible>(to_message(item).to_ws_message_unchecked()));
    run_ws_stream(socket, stream, WsKeepAlive::for_snapshot_streams()).await
}

fn to_message(item: Result<Snapshot, EventsError>) -> StreamMsg {
    match item {
        Ok(snapshot) => StreamMsg::snapshot(&snapshot).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to serialize snapshot");
            StreamMsg::RefreshRequired {
                reason: "serialization_failed".to_string(),
            }
        }),
        Err(e) if e.is_terminal() => StreamMsg::Closed {
            reason: e.to_string(),
        },
        Err(e) => {
            tracing::warn!(error = %e, "Snapshot reload failed");
            StreamMsg::RefreshRequired {
                reason: "reload_failed".to_string(),
            }
        }
    }
}

//! Offline write queue for a device.
//!
//! A client that loses its connection parks writes here (or uploads its
//! local queue on reconnect) and then asks for a replay.

use axum::{
    Extension, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use services::services::sync_queue::{QueuedOperation, ReplayReport, SyncOperation};
use tracing::instrument;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::RequestContext};

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route(
            "/sync/{device_id}/queue",
            get(list_queue).post(enqueue).delete(clear_queue),
        )
        .route(
            "/sync/{device_id}/queue/{operation_id}",
            delete(remove_operation),
        )
        .route("/sync/{device_id}/replay", post(replay))
}

pub async fn list_queue(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(device_id): Path<String>,
) -> Result<ResponseJson<ApiResponse<Vec<QueuedOperation>>>, ApiError> {
    let queue = deployment.sync_queue().list(ctx.user.id, &device_id).await?;
    Ok(ResponseJson(ApiResponse::success(queue)))
}

pub async fn enqueue(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(device_id): Path<String>,
    ResponseJson(operation): ResponseJson<SyncOperation>,
) -> Result<ResponseJson<ApiResponse<QueuedOperation>>, ApiError> {
    let queued = deployment
        .sync_queue()
        .enqueue(ctx.user.id, &device_id, operation)
        .await?;
    Ok(ResponseJson(ApiResponse::success(queued)))
}

pub async fn remove_operation(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path((device_id, operation_id)): Path<(String, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment
        .sync_queue()
        .remove(ctx.user.id, &device_id, operation_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn clear_queue(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(device_id): Path<String>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.sync_queue().clear(ctx.user.id, &device_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

#[instrument(name = "sync.replay", skip(deployment, ctx), fields(user_id = %ctx.user.id))]
pub async fn replay(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(device_id): Path<String>,
) -> Result<ResponseJson<ApiResponse<ReplayReport>>, ApiError> {
    let report = deployment
        .sync_queue()
        .replay(deployment.tasks(), &ctx.user, &device_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

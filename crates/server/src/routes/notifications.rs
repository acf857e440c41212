use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::notification::{Notification, NotificationQuery};
use serde::Serialize;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::RequestContext};

#[derive(Debug, Serialize, TS)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/{notification_id}/read", post(mark_read))
}

pub async fn list_notifications(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<NotificationQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Notification>>>, ApiError> {
    let notifications = deployment.notifier().list(ctx.user.id, &query).await?;
    Ok(ResponseJson(ApiResponse::success(notifications)))
}

pub async fn mark_read(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(notification_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Notification>>, ApiError> {
    let notification = deployment
        .notifier()
        .mark_read(ctx.user.id, notification_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(notification)))
}

pub async fn mark_all_read(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<ResponseJson<ApiResponse<MarkAllReadResponse>>, ApiError> {
    let updated = deployment.notifier().mark_all_read(ctx.user.id).await?;
    Ok(ResponseJson(ApiResponse::success(MarkAllReadResponse { updated })))
}

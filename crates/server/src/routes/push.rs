use axum::{
    Extension, Router,
    extract::State,
    response::Json as ResponseJson,
    routing::post,
};
use db::models::push_subscription::{
    PushSubscription, RegisterPushSubscription, UnregisterPushSubscription,
};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::RequestContext};

pub fn router() -> Router<DeploymentImpl> {
    Router::new().route(
        "/push/subscriptions",
        post(register_subscription).delete(unregister_subscription),
    )
}

/// Registering an endpoint another user held moves it to the caller.
pub async fn register_subscription(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    ResponseJson(payload): ResponseJson<RegisterPushSubscription>,
) -> Result<ResponseJson<ApiResponse<PushSubscription>>, ApiError> {
    let subscription = deployment.push().register(ctx.user.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(subscription)))
}

pub async fn unregister_subscription(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    ResponseJson(payload): ResponseJson<UnregisterPushSubscription>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if !deployment
        .push()
        .unregister(ctx.user.id, &payload.endpoint)
        .await?
    {
        return Err(ApiError::NotFound("Push subscription not found".into()));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

use axum::{
    Extension, Json, Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, put},
};
use chrono::{DateTime, Utc};
use db::models::user::{UpdatePreferences, User};
use serde::Serialize;
use tracing::instrument;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::RequestContext};

#[derive(Debug, Serialize, TS)]
pub struct MeResponse {
    pub user: User,
    #[ts(type = "string")]
    pub access_token_expires_at: DateTime<Utc>,
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/me", get(get_me))
        .route("/me/preferences", put(update_preferences))
}

#[instrument(name = "identity.get_me", skip(ctx), fields(user_id = %ctx.user.id))]
pub async fn get_me(
    Extension(ctx): Extension<RequestContext>,
) -> ResponseJson<ApiResponse<MeResponse>> {
    ResponseJson(ApiResponse::success(MeResponse {
        user: ctx.user,
        access_token_expires_at: ctx.access_token_expires_at,
    }))
}

#[instrument(name = "identity.update_preferences", skip(deployment, ctx, payload), fields(user_id = %ctx.user.id))]
pub async fn update_preferences(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<UpdatePreferences>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = User::set_theme(&deployment.db().pool, ctx.user.id, payload.theme)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    tracing::info!(theme = %user.theme, "Updated preferences");
    Ok(ResponseJson(ApiResponse::success(user)))
}

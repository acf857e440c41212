use axum::{
    Extension, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, patch},
};
use db::models::membership::{BoardMember, InviteMember, MemberWithProfile, UpdateMemberRole};
use tracing::instrument;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::RequestContext};

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route(
            "/boards/{board_id}/members",
            get(list_members).post(invite_member),
        )
        .route(
            "/boards/{board_id}/members/{user_id}",
            patch(change_role).delete(remove_member),
        )
}

pub async fn list_members(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(board_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<MemberWithProfile>>>, ApiError> {
    let members = deployment.members().list_members(ctx.user.id, board_id).await?;
    Ok(ResponseJson(ApiResponse::success(members)))
}

#[instrument(name = "members.invite", skip(deployment, ctx, payload), fields(user_id = %ctx.user.id, role = %payload.role))]
pub async fn invite_member(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(board_id): Path<Uuid>,
    ResponseJson(payload): ResponseJson<InviteMember>,
) -> Result<ResponseJson<ApiResponse<MemberWithProfile>>, ApiError> {
    let member = deployment
        .members()
        .invite(&ctx.user, board_id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(member)))
}

pub async fn change_role(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path((board_id, user_id)): Path<(Uuid, Uuid)>,
    ResponseJson(payload): ResponseJson<UpdateMemberRole>,
) -> Result<ResponseJson<ApiResponse<BoardMember>>, ApiError> {
    let member = deployment
        .members()
        .change_role(ctx.user.id, board_id, user_id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(member)))
}

/// Owners remove others; anyone may remove themselves to leave the board.
#[instrument(name = "members.remove", skip(deployment, ctx), fields(actor_id = %ctx.user.id))]
pub async fn remove_member(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path((board_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment
        .members()
        .remove(ctx.user.id, board_id, user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

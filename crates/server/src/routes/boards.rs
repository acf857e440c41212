use axum::{
    Extension, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::board::{Board, BoardSnapshot, BoardWithRole, CreateBoard, UpdateBoard};
use tracing::instrument;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::RequestContext};

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/boards", get(list_boards).post(create_board))
        .route(
            "/boards/{board_id}",
            get(get_board).put(update_board).delete(delete_board),
        )
        .route("/boards/{board_id}/snapshot", get(get_snapshot))
}

pub async fn list_boards(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<ResponseJson<ApiResponse<Vec<BoardWithRole>>>, ApiError> {
    let boards = deployment.boards().list_boards(ctx.user.id).await?;
    Ok(ResponseJson(ApiResponse::success(boards)))
}

#[instrument(name = "boards.create", skip(deployment, ctx, payload), fields(user_id = %ctx.user.id))]
pub async fn create_board(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    ResponseJson(payload): ResponseJson<CreateBoard>,
) -> Result<ResponseJson<ApiResponse<BoardWithRole>>, ApiError> {
    let board = deployment.boards().create_board(ctx.user.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(board)))
}

pub async fn get_board(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(board_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<BoardWithRole>>, ApiError> {
    let board = deployment.boards().get_board(ctx.user.id, board_id).await?;
    Ok(ResponseJson(ApiResponse::success(board)))
}

#[instrument(name = "boards.update", skip(deployment, ctx, payload), fields(user_id = %ctx.user.id))]
pub async fn update_board(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(board_id): Path<Uuid>,
    ResponseJson(payload): ResponseJson<UpdateBoard>,
) -> Result<ResponseJson<ApiResponse<Board>>, ApiError> {
    let board = deployment
        .boards()
        .update_board(ctx.user.id, board_id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(board)))
}

#[instrument(name = "boards.delete", skip(deployment, ctx), fields(user_id = %ctx.user.id))]
pub async fn delete_board(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(board_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.boards().delete_board(ctx.user.id, board_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// The same payload the board stream pushes; clients refetch this after a
/// rejected optimistic move.
pub async fn get_snapshot(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(board_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<BoardSnapshot>>, ApiError> {
    let snapshot = deployment.boards().snapshot(ctx.user.id, board_id).await?;
    Ok(ResponseJson(ApiResponse::success(snapshot)))
}

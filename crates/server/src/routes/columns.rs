use axum::{
    Extension, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::column::{Column, CreateColumn, MoveColumn, UpdateColumn};
use tracing::instrument;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::RequestContext};

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route(
            "/boards/{board_id}/columns",
            get(list_columns).post(create_column),
        )
        .route(
            "/boards/{board_id}/columns/{column_id}",
            put(rename_column).delete(delete_column),
        )
        .route(
            "/boards/{board_id}/columns/{column_id}/move",
            post(move_column),
        )
}

pub async fn list_columns(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(board_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Column>>>, ApiError> {
    let columns = deployment.boards().list_columns(ctx.user.id, board_id).await?;
    Ok(ResponseJson(ApiResponse::success(columns)))
}

pub async fn create_column(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(board_id): Path<Uuid>,
    ResponseJson(payload): ResponseJson<CreateColumn>,
) -> Result<ResponseJson<ApiResponse<Column>>, ApiError> {
    let column = deployment
        .boards()
        .create_column(ctx.user.id, board_id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(column)))
}

pub async fn rename_column(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path((board_id, column_id)): Path<(Uuid, Uuid)>,
    ResponseJson(payload): ResponseJson<UpdateColumn>,
) -> Result<ResponseJson<ApiResponse<Column>>, ApiError> {
    let column = deployment
        .boards()
        .rename_column(ctx.user.id, board_id, column_id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(column)))
}

#[instrument(name = "columns.move", skip(deployment, ctx), fields(user_id = %ctx.user.id))]
pub async fn move_column(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path((board_id, column_id)): Path<(Uuid, Uuid)>,
    ResponseJson(payload): ResponseJson<MoveColumn>,
) -> Result<ResponseJson<ApiResponse<Column>>, ApiError> {
    let column = deployment
        .boards()
        .move_column(ctx.user.id, board_id, column_id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(column)))
}

pub async fn delete_column(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path((board_id, column_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment
        .boards()
        .delete_column(ctx.user.id, board_id, column_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::task::{CreateTask, MoveTask, Task, TaskFilter, UpdateTask};
use tracing::instrument;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::{RequestContext, load_task_middleware},
};

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let task_id_router = Router::new()
        .route("/", get(get_task).put(update_task).delete(delete_task))
        .route("/move", post(move_task))
        .layer(from_fn_with_state(deployment.clone(), load_task_middleware));

    Router::new()
        .route(
            "/boards/{board_id}/tasks",
            get(list_tasks).post(create_task),
        )
        .nest("/tasks/{task_id}", task_id_router)
}

pub async fn list_tasks(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(board_id): Path<Uuid>,
    Query(filter): Query<TaskFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let tasks = deployment
        .tasks()
        .list_tasks(ctx.user.id, board_id, &filter)
        .await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

#[instrument(name = "tasks.create", skip(deployment, ctx, payload), fields(user_id = %ctx.user.id, column_id = %payload.column_id))]
pub async fn create_task(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(board_id): Path<Uuid>,
    ResponseJson(payload): ResponseJson<CreateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = deployment
        .tasks()
        .create_task(&ctx.user, board_id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn get_task(
    Extension(task): Extension<Task>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn update_task(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Extension(task): Extension<Task>,
    ResponseJson(payload): ResponseJson<UpdateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = deployment
        .tasks()
        .update_task(&ctx.user, task.id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

/// Drag-and-drop target. The response is the authoritative task; a client
/// whose optimistic move is rejected refetches the board snapshot.
#[instrument(
    name = "tasks.move",
    skip(deployment, ctx, task),
    fields(user_id = %ctx.user.id, task_id = %task.id)
)]
pub async fn move_task(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Extension(task): Extension<Task>,
    ResponseJson(payload): ResponseJson<MoveTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let moved = deployment
        .tasks()
        .move_task(&ctx.user, task.id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(moved)))
}

pub async fn delete_task(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Extension(task): Extension<Task>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.tasks().delete_task(ctx.user.id, task.id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

use axum::{
    Extension,
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use services::services::access::Permission;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::RequestContext};

/// Loads the task in the path for a caller who can at least view its board
/// and inserts it as `Extension<Task>`. Tasks on boards the caller cannot see
/// are reported as missing.
pub async fn load_task_middleware(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<RequestContext>,
    Path(task_id): Path<Uuid>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (task, access) = deployment
        .tasks()
        .load_task(ctx.user.id, task_id, Permission::View)
        .await?;

    request.extensions_mut().insert(task);
    request.extensions_mut().insert(access);
    Ok(next.run(request).await)
}

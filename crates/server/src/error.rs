use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
};
use db::validation::ValidationError;
use services::services::{
    access::AccessError, auth::TokenError, boards::BoardError, members::MemberError,
    notifications::NotificationError, push::PushError, sync_queue::SyncError, tasks::TaskError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Member(#[from] MemberError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error(transparent)]
    Push(#[from] PushError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Not found: {0}")]
    NotFound(String),
}

fn access_status(err: &AccessError) -> StatusCode {
    match err {
        AccessError::NotFound => StatusCode::NOT_FOUND,
        AccessError::Forbidden(_) => StatusCode::FORBIDDEN,
        AccessError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Access(err) => access_status(err),
            ApiError::Board(err) => match err {
                BoardError::Access(err) => access_status(err),
                BoardError::Validation(_) => StatusCode::BAD_REQUEST,
                BoardError::ColumnNotFound => StatusCode::NOT_FOUND,
                BoardError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Task(err) => match err {
                TaskError::Access(err) => access_status(err),
                TaskError::Validation(_)
                | TaskError::AssigneeNotMember
                | TaskError::CrossBoardMove => StatusCode::BAD_REQUEST,
                TaskError::TaskNotFound | TaskError::ColumnNotFound => StatusCode::NOT_FOUND,
                TaskError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Member(err) => match err {
                MemberError::Access(err) => access_status(err),
                MemberError::Validation(_) | MemberError::OwnerRoleNotAssignable => {
                    StatusCode::BAD_REQUEST
                }
                MemberError::UserNotFound | MemberError::MemberNotFound => StatusCode::NOT_FOUND,
                MemberError::AlreadyMember | MemberError::OwnerImmutable => StatusCode::CONFLICT,
                MemberError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Notification(err) => match err {
                NotificationError::NotFound => StatusCode::NOT_FOUND,
                NotificationError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Push(err) => match err {
                PushError::InvalidEndpoint(_) => StatusCode::BAD_REQUEST,
                PushError::Rejected { .. } | PushError::Transport(_) => StatusCode::BAD_GATEWAY,
                PushError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Sync(err) => match err {
                SyncError::InvalidDevice => StatusCode::BAD_REQUEST,
                SyncError::QueueFull => StatusCode::CONFLICT,
                SyncError::OperationNotFound => StatusCode::NOT_FOUND,
            },
            ApiError::Token(_) => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            // Storage details stay in the log.
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
            self.to_string()
        };

        (status, ResponseJson(ApiResponse::<()>::error(message))).into_response()
    }
}

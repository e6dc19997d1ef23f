use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::error::HttpError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    StateConflict(String),

    #[error("Message {0} can no longer be deleted for everyone")]
    DeletionWindowExpired(Uuid),

    #[error("Chat {0} has not been approved yet")]
    ChatNotApproved(Uuid),

    #[error("Chat {0} not found")]
    ChatNotFound(Uuid),

    #[error("Message {0} not found")]
    MessageNotFound(Uuid),

    #[error("Notification {0} not found")]
    NotificationNotFound(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ServiceError {
    pub fn not_participant(chat_id: Uuid) -> Self {
        ServiceError::Unauthorized(format!("You are not a participant of chat {}", chat_id))
    }

    /// Stable code sent to socket clients in `error` events.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Unauthenticated => "UNAUTHENTICATED",
            ServiceError::Unauthorized(_) => "UNAUTHORIZED",
            ServiceError::StateConflict(_) => "STATE_CONFLICT",
            ServiceError::DeletionWindowExpired(_) => "DELETION_WINDOW_EXPIRED",
            ServiceError::ChatNotApproved(_) => "CHAT_NOT_APPROVED",
            ServiceError::ChatNotFound(_)
            | ServiceError::MessageNotFound(_)
            | ServiceError::NotificationNotFound(_) => "NOT_FOUND",
            ServiceError::Validation(_) => "VALIDATION",
            ServiceError::Database(_) | ServiceError::Storage(_) => "INTERNAL",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Unauthenticated => StatusCode::UNAUTHORIZED,

            ServiceError::Unauthorized(_) => StatusCode::FORBIDDEN,

            ServiceError::StateConflict(_)
            | ServiceError::DeletionWindowExpired(_)
            | ServiceError::ChatNotApproved(_) => StatusCode::CONFLICT,

            ServiceError::ChatNotFound(_)
            | ServiceError::MessageNotFound(_)
            | ServiceError::NotificationNotFound(_) => StatusCode::NOT_FOUND,

            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,

            ServiceError::Database(_) | ServiceError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            // Internal details stay in the logs.
            ServiceError::Database(_) | ServiceError::Storage(_) => {
                tracing::error!("Internal error: {}", error);
                HttpError::server_error(crate::error::ErrorMessage::ServerError.to_string())
            }
            _ => HttpError::new(error.to_string(), error.status_code()),
        }
    }
}

use domain::{MessageId, RepositoryError, ValidationError, MAX_PAGE_LIMIT};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApplicationError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("invalid limit {0}: must be between 1 and {max}", max = MAX_PAGE_LIMIT)]
    InvalidLimit(i64),
    #[error("message already exists: {0}")]
    Conflict(MessageId),
    #[error("user {user_id} is not allowed to access this resource")]
    Forbidden { user_id: String },
    #[error("message not found: {0}")]
    NotFound(MessageId),
    #[error("store error: {0}")]
    Store(RepositoryError),
}

impl ApplicationError {
    pub fn forbidden(user_id: impl Into<String>) -> Self {
        Self::Forbidden {
            user_id: user_id.into(),
        }
    }

    /// 只有存储层故障值得重试，其余都是调用方的问题
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Duplicate(id) => ApplicationError::Conflict(id),
            RepositoryError::NotFound(id) => ApplicationError::NotFound(id),
            RepositoryError::Validation(err) => ApplicationError::Validation(err),
            other => ApplicationError::Store(other),
        }
    }
}

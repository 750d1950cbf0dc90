//! 领域模型错误定义
//!
//! 校验错误与存储错误分开定义，调用方可以按类型区分“调用方输入有误”和“存储层故障”。

use thiserror::Error;

use crate::message::{MessageId, MessageStatus};

/// 消息校验错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("sender id cannot be empty")]
    EmptySenderId,

    #[error("receiver id cannot be empty")]
    EmptyReceiverId,

    #[error("{field} exceeds {max} characters")]
    IdTooLong { field: &'static str, max: usize },

    /// 用户ID中出现了会话ID分隔符
    #[error("{field} contains reserved character sequence")]
    InvalidIdCharacters { field: &'static str },

    #[error("cannot send message to self")]
    SelfMessage,

    #[error("message content cannot be empty")]
    EmptyContent,

    #[error("message content has {actual} characters, exceeds limit of {max}")]
    ContentTooLong { actual: usize, max: usize },

    #[error("invalid message status: {0}")]
    InvalidStatus(String),

    #[error("invalid chat id: {0}")]
    InvalidChatId(String),

    /// 状态只能前进，不能回退
    #[error("message status cannot move from {from} back to {to}")]
    StatusRegression {
        from: MessageStatus,
        to: MessageStatus,
    },
}

/// 存储层错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    /// 相同 (sender, receiver, created_at) 的消息已存在
    #[error("duplicate message: {0}")]
    Duplicate(MessageId),

    #[error("message not found: {0}")]
    NotFound(MessageId),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("storage error: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    /// 创建存储错误
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

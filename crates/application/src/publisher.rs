//! 实时通知推送接口
//!
//! 推送在消息持久化之后进行，失败不影响请求结果。

use async_trait::async_trait;
use domain::{message_topic, status_topic, Envelope, Message, StatusUpdate, Timestamp};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to encode notification: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("publish failed: {0}")]
    Transport(String),
    #[error("publisher is closed")]
    Closed,
    #[error("publish queue is full")]
    QueueFull,
}

impl PublishError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

/// 编码后的通知：主题 + JSON 信封
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub topic: String,
    pub payload: String,
}

impl Notification {
    /// 新消息通知，发往接收者的消息主题
    pub fn new_message(message: &Message, at: Timestamp) -> Result<Self, PublishError> {
        let envelope = Envelope::new_message(message.clone(), at);
        Ok(Self {
            topic: message_topic(&message.receiver_id),
            payload: serde_json::to_string(&envelope)?,
        })
    }

    /// 状态更新通知，发往 `user_id` 的状态主题
    pub fn status_update(
        user_id: &str,
        update: &StatusUpdate,
        at: Timestamp,
    ) -> Result<Self, PublishError> {
        let envelope = Envelope::status_update(update.clone(), at);
        Ok(Self {
            topic: status_topic(user_id),
            payload: serde_json::to_string(&envelope)?,
        })
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// 推送新消息给接收者
    async fn publish_message(&self, message: &Message) -> Result<(), PublishError>;

    async fn publish_status_update(
        &self,
        user_id: &str,
        update: &StatusUpdate,
    ) -> Result<(), PublishError>;

    /// 释放底层连接，之后的推送返回 [`PublishError::Closed`]
    async fn close(&self) -> Result<(), PublishError>;
}

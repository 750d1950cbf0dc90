//! 实时通知信封
//!
//! 下游实时客户端消费的线上格式：`{"type": ..., "timestamp": ..., "data": ...}`。

use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageId, MessageStatus, Timestamp};

/// 新消息主题前缀
pub const MESSAGE_TOPIC_PREFIX: &str = "messages";
/// 状态更新主题前缀
pub const STATUS_TOPIC_PREFIX: &str = "status";

/// 接收者的消息主题：一个用户一个主题，而不是一个会话一个主题
pub fn message_topic(receiver_id: &str) -> String {
    format!("{MESSAGE_TOPIC_PREFIX}.{receiver_id}")
}

/// 触发状态变化的用户的状态主题
pub fn status_topic(user_id: &str) -> String {
    format!("{STATUS_TOPIC_PREFIX}.{user_id}")
}

/// 信封类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeType {
    NewMessage,
    StatusUpdate,
}

/// 状态变更通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub message_id: MessageId,
    pub status: MessageStatus,
    pub updated_by: String,
    pub updated_at: Timestamp,
}

/// 通知信封
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "type")]
    pub kind: EnvelopeType,
    pub timestamp: Timestamp,
    pub data: T,
}

impl Envelope<Message> {
    pub fn new_message(message: Message, timestamp: Timestamp) -> Self {
        Self {
            kind: EnvelopeType::NewMessage,
            timestamp,
            data: message,
        }
    }
}

impl Envelope<StatusUpdate> {
    pub fn status_update(update: StatusUpdate, timestamp: Timestamp) -> Self {
        Self {
            kind: EnvelopeType::StatusUpdate,
            timestamp,
            data: update,
        }
    }
}

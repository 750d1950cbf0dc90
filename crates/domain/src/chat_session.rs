//! 一对一会话
//!
//! 会话不单独存储，会话ID由两个参与者推导，会话摘要每次查询时从消息表计算。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;
use crate::message::{validate_user_id, Timestamp};

/// 会话ID中两个用户ID之间的分隔符，用户ID中不允许出现
pub const CHAT_ID_SEPARATOR: &str = "---";

/// 会话ID
///
/// 字典序较小的用户ID在前，因此 (a, b) 与 (b, a) 得到同一个ID。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChatId(String);

impl ChatId {
    pub fn between(user_a: &str, user_b: &str) -> Self {
        let (first, second) = if user_a < user_b {
            (user_a, user_b)
        } else {
            (user_b, user_a)
        };
        Self(format!("{first}{CHAT_ID_SEPARATOR}{second}"))
    }

    /// 解析外部传入的会话ID，必须恰好拆成两个合法的用户ID
    pub fn parse(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        let mut parts = raw.split(CHAT_ID_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(first), Some(second), None) if is_user_id(first) && is_user_id(second) => {
                Ok(Self(raw))
            }
            _ => Err(ValidationError::InvalidChatId(raw)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 拆出两个参与者
    pub fn participants(&self) -> (&str, &str) {
        // parse/between 保证分隔符恰好出现一次
        self.0
            .split_once(CHAT_ID_SEPARATOR)
            .unwrap_or((self.0.as_str(), ""))
    }

    pub fn includes(&self, user_id: &str) -> bool {
        let (first, second) = self.participants();
        first == user_id || second == user_id
    }

    /// 给定一方，返回另一方；不是参与者时返回 None
    pub fn other_participant(&self, user_id: &str) -> Option<&str> {
        match self.participants() {
            (first, second) if first == user_id => Some(second),
            (first, second) if second == user_id => Some(first),
            _ => None,
        }
    }
}

fn is_user_id(value: &str) -> bool {
    !value.is_empty() && validate_user_id("user_id", value).is_ok()
}

/// 计算两个用户之间的会话ID
pub fn compute_chat_id(user_a: &str, user_b: &str) -> ChatId {
    ChatId::between(user_a, user_b)
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ChatId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ChatId> for String {
    fn from(value: ChatId) -> Self {
        value.0
    }
}

/// 会话摘要（按查询用户视角）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub chat_id: ChatId,
    pub other_participant: String,
    pub last_message_at: Timestamp,
    pub last_message: String,
    pub last_message_by: String,
    /// 对方发给查询用户、且尚未读的消息数
    pub unread_count: u64,
}

impl ChatSession {
    pub fn is_unread(&self) -> bool {
        self.unread_count > 0
    }
}

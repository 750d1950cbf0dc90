//! 消息实体定义
//!
//! 消息没有代理主键，(sender_id, receiver_id, created_at) 三元组就是它的身份。

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::chat_session::CHAT_ID_SEPARATOR;
use crate::errors::ValidationError;

/// 统一的时间戳类型。
pub type Timestamp = DateTime<Utc>;

/// 用户ID最大长度
pub const MAX_USER_ID_LEN: usize = 100;
/// 消息内容最大长度（字符数）
pub const MAX_CONTENT_LEN: usize = 10_000;

/// 将时间戳规范到存储精度（微秒）
pub fn normalize_timestamp(ts: Timestamp) -> Timestamp {
    ts.trunc_subsecs(6)
}

/// 消息状态
///
/// 声明顺序即状态顺序：sent < delivered < read。
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub const ALL: [MessageStatus; 3] = [Self::Sent, Self::Delivered, Self::Read];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
        }
    }

    /// 是否允许从当前状态变为 `next`（原地不动也算允许）
    pub fn can_advance_to(self, next: MessageStatus) -> bool {
        next >= self
    }

    /// 严格低于当前状态的所有状态
    pub fn predecessors(self) -> impl Iterator<Item = MessageStatus> {
        Self::ALL.into_iter().filter(move |status| *status < self)
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "sent" => Ok(Self::Sent),
            "delivered" => Ok(Self::Delivered),
            "read" => Ok(Self::Read),
            other => Err(ValidationError::InvalidStatus(other.to_owned())),
        }
    }
}

/// 消息复合主键
///
/// 字段顺序决定排序：先发送者，再接收者，最后时间。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId {
    pub sender_id: String,
    pub receiver_id: String,
    pub created_at: Timestamp,
}

impl MessageId {
    pub fn new(
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            created_at,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}->{}@{}",
            self.sender_id,
            self.receiver_id,
            self.created_at.to_rfc3339_opts(SecondsFormat::Micros, true)
        )
    }
}

/// 消息实体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender_id: String,
    pub receiver_id: String,
    pub created_at: Timestamp,
    pub content: String,
    pub status: MessageStatus,
}

impl Message {
    /// 创建一条新发送的消息，状态为 `sent`
    pub fn new(
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        content: impl Into<String>,
        created_at: Timestamp,
    ) -> Result<Self, ValidationError> {
        let message = Self {
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            created_at: normalize_timestamp(created_at),
            content: content.into(),
            status: MessageStatus::Sent,
        };
        message.validate()?;
        Ok(message)
    }

    pub fn id(&self) -> MessageId {
        MessageId::new(&self.sender_id, &self.receiver_id, self.created_at)
    }

    /// 领域级校验
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sender_id.trim().is_empty() {
            return Err(ValidationError::EmptySenderId);
        }
        if self.receiver_id.trim().is_empty() {
            return Err(ValidationError::EmptyReceiverId);
        }
        validate_user_id("sender_id", &self.sender_id)?;
        validate_user_id("receiver_id", &self.receiver_id)?;
        if self.sender_id == self.receiver_id {
            return Err(ValidationError::SelfMessage);
        }

        let content = self.content.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        let actual = content.chars().count();
        if actual > MAX_CONTENT_LEN {
            return Err(ValidationError::ContentTooLong {
                actual,
                max: MAX_CONTENT_LEN,
            });
        }
        Ok(())
    }

    /// 一对一会话中的另一方
    pub fn other_participant(&self, current_user: &str) -> &str {
        if self.sender_id == current_user {
            &self.receiver_id
        } else {
            &self.sender_id
        }
    }

    /// 推进消息状态。返回是否发生了变化。
    pub fn advance_status(&mut self, next: MessageStatus) -> Result<bool, ValidationError> {
        if !self.status.can_advance_to(next) {
            return Err(ValidationError::StatusRegression {
                from: self.status,
                to: next,
            });
        }
        if self.status == next {
            return Ok(false);
        }
        self.status = next;
        Ok(true)
    }
}

pub(crate) fn validate_user_id(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.chars().count() > MAX_USER_ID_LEN {
        return Err(ValidationError::IdTooLong {
            field,
            max: MAX_USER_ID_LEN,
        });
    }
    // 首尾的 '-' 会与分隔符粘连，同样会让会话ID无法拆分
    if value.contains(CHAT_ID_SEPARATOR) || value.starts_with('-') || value.ends_with('-') {
        return Err(ValidationError::InvalidIdCharacters { field });
    }
    Ok(())
}

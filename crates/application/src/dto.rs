use chrono::{DateTime, SecondsFormat, Utc};
use domain::{Message, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::ApplicationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListMessagesRequest {
    pub chat_id: String,
    pub requester_id: String,
    /// 上一页返回的 `next_cursor`，为空表示从最新的消息开始
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// 消息分页结果，消息按时间倒序
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// 游标使用微秒精度的 RFC 3339，与存储精度一致
pub fn format_cursor(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_cursor(raw: &str) -> Result<Timestamp, ApplicationError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| ApplicationError::InvalidCursor(raw.to_owned()))
}

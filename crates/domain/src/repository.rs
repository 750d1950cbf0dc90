//! 消息Repository接口定义
//!
//! 领域层只定义接口，存储实现放在基础设施层。

use async_trait::async_trait;

use crate::chat_session::{ChatId, ChatSession};
use crate::errors::RepositoryError;
use crate::message::{Message, MessageId, MessageStatus, Timestamp};

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// 默认分页大小
pub const DEFAULT_PAGE_LIMIT: i64 = 50;
/// 单页最大条数
pub const MAX_PAGE_LIMIT: i64 = 100;

/// 存储层使用的分页大小：非正数或超过上限时回落到默认值
pub fn page_limit(requested: i64) -> i64 {
    if requested <= 0 || requested > MAX_PAGE_LIMIT {
        DEFAULT_PAGE_LIMIT
    } else {
        requested
    }
}

/// 消息Repository接口
///
/// 实现必须保证：
/// - (sender_id, receiver_id, created_at) 唯一，重复写入返回 [`RepositoryError::Duplicate`]
/// - 状态批量推进在一个原子单元内完成
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 保存新消息，先做领域校验
    async fn save(&self, message: &Message) -> RepositoryResult<()>;

    /// 按时间倒序获取会话消息；`cursor` 为排他上界
    async fn get_messages(
        &self,
        chat_id: &ChatId,
        cursor: Option<Timestamp>,
        limit: i64,
    ) -> RepositoryResult<Vec<Message>>;

    /// 用户的所有会话摘要，按最后一条消息时间倒序
    async fn get_chat_sessions(&self, user_id: &str) -> RepositoryResult<Vec<ChatSession>>;

    /// 将 sender→receiver 方向、时间不晚于锚点且状态低于 `status` 的消息推进到 `status`。
    /// 返回实际变更的行数。
    async fn advance_status_up_to(
        &self,
        message_id: &MessageId,
        status: MessageStatus,
    ) -> RepositoryResult<u64>;

    /// 读回执级联：锚点及之前的消息全部标记为已读
    async fn mark_messages_up_to_read(&self, message_id: &MessageId) -> RepositoryResult<u64> {
        self.advance_status_up_to(message_id, MessageStatus::Read)
            .await
    }

    /// 按复合主键查找，不存在时返回 [`RepositoryError::NotFound`]
    async fn get_message_by_id(&self, message_id: &MessageId) -> RepositoryResult<Message>;

    /// 会话中对方发给 `user_id` 的未读消息数
    async fn get_unread_count(&self, user_id: &str, chat_id: &ChatId) -> RepositoryResult<u64>;

    /// 将会话中发给 `user_id` 的消息全部标记为已读
    async fn mark_chat_as_read(&self, user_id: &str, chat_id: &ChatId) -> RepositoryResult<u64>;
}

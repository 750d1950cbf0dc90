use std::sync::Arc;

use domain::{
    ChatId, ChatSession, Message, MessageId, MessageRepository, MessageStatus, StatusUpdate,
    DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT,
};

use crate::{
    clock::Clock,
    dto::{format_cursor, parse_cursor, ListMessagesRequest, MessagePage, SendMessageRequest},
    error::ApplicationError,
    publisher::MessagePublisher,
};

pub struct MessagingServiceDependencies {
    pub message_repository: Arc<dyn MessageRepository>,
    pub publisher: Arc<dyn MessagePublisher>,
    pub clock: Arc<dyn Clock>,
}

/// 一对一消息用例：发送、分页、会话列表、已读回执
pub struct MessagingService {
    deps: MessagingServiceDependencies,
}

impl MessagingService {
    pub fn new(deps: MessagingServiceDependencies) -> Self {
        Self { deps }
    }

    /// 解析会话ID并确认请求者是参与者
    fn authorize_chat(&self, raw_chat_id: &str, user_id: &str) -> Result<ChatId, ApplicationError> {
        let chat_id = ChatId::parse(raw_chat_id)?;
        if !chat_id.includes(user_id) {
            return Err(ApplicationError::forbidden(user_id));
        }
        Ok(chat_id)
    }

    pub async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<Message, ApplicationError> {
        let now = self.deps.clock.now();
        let message = Message::new(
            request.sender_id,
            request.receiver_id,
            request.content,
            now,
        )?;

        self.deps.message_repository.save(&message).await?;
        tracing::debug!(
            sender_id = %message.sender_id,
            receiver_id = %message.receiver_id,
            "消息已保存"
        );

        // 持久化成功后推送，推送失败只记录日志
        if let Err(publish_error) = self.deps.publisher.publish_message(&message).await {
            tracing::error!(
                sender_id = %message.sender_id,
                receiver_id = %message.receiver_id,
                error = %publish_error,
                "消息已保存到数据库，但推送失败"
            );
        }

        Ok(message)
    }

    pub async fn list_messages(
        &self,
        request: ListMessagesRequest,
    ) -> Result<MessagePage, ApplicationError> {
        let chat_id = self.authorize_chat(&request.chat_id, &request.requester_id)?;

        let cursor = request
            .cursor
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .map(parse_cursor)
            .transpose()?;

        let limit = match request.limit {
            None => DEFAULT_PAGE_LIMIT,
            Some(limit) if (1..=MAX_PAGE_LIMIT).contains(&limit) => limit,
            Some(limit) => return Err(ApplicationError::InvalidLimit(limit)),
        };

        let messages = self
            .deps
            .message_repository
            .get_messages(&chat_id, cursor, limit)
            .await?;

        // 满页即认为还有更多，恰好整页结束时会多出一次空查询
        let has_more = i64::try_from(messages.len()).is_ok_and(|len| len == limit);
        let next_cursor = if has_more {
            messages.last().map(|message| format_cursor(message.created_at))
        } else {
            None
        };

        Ok(MessagePage {
            messages,
            next_cursor,
            has_more,
        })
    }

    pub async fn list_chats(&self, user_id: &str) -> Result<Vec<ChatSession>, ApplicationError> {
        let sessions = self
            .deps
            .message_repository
            .get_chat_sessions(user_id)
            .await?;
        Ok(sessions)
    }

    /// 已读回执：锚点及之前对方发来的消息全部变为已读
    pub async fn mark_read(
        &self,
        requester_id: &str,
        message_id: &MessageId,
    ) -> Result<u64, ApplicationError> {
        self.ensure_receiver(requester_id, message_id)?;
        let count = self
            .deps
            .message_repository
            .mark_messages_up_to_read(message_id)
            .await?;

        self.notify_status(requester_id, message_id, MessageStatus::Read)
            .await;
        Ok(count)
    }

    pub async fn mark_delivered(
        &self,
        requester_id: &str,
        message_id: &MessageId,
    ) -> Result<u64, ApplicationError> {
        self.ensure_receiver(requester_id, message_id)?;
        let count = self
            .deps
            .message_repository
            .advance_status_up_to(message_id, MessageStatus::Delivered)
            .await?;

        self.notify_status(requester_id, message_id, MessageStatus::Delivered)
            .await;
        Ok(count)
    }

    pub async fn unread_count(
        &self,
        user_id: &str,
        chat_id: &str,
    ) -> Result<u64, ApplicationError> {
        let chat_id = self.authorize_chat(chat_id, user_id)?;
        let count = self
            .deps
            .message_repository
            .get_unread_count(user_id, &chat_id)
            .await?;
        Ok(count)
    }

    pub async fn mark_chat_read(
        &self,
        user_id: &str,
        chat_id: &str,
    ) -> Result<u64, ApplicationError> {
        let chat_id = self.authorize_chat(chat_id, user_id)?;
        let count = self
            .deps
            .message_repository
            .mark_chat_as_read(user_id, &chat_id)
            .await?;
        tracing::debug!(user_id = %user_id, chat_id = %chat_id, count, "会话已全部标记为已读");
        Ok(count)
    }

    fn ensure_receiver(
        &self,
        requester_id: &str,
        message_id: &MessageId,
    ) -> Result<(), ApplicationError> {
        if message_id.receiver_id != requester_id {
            return Err(ApplicationError::forbidden(requester_id));
        }
        Ok(())
    }

    async fn notify_status(&self, requester_id: &str, message_id: &MessageId, status: MessageStatus) {
        let update = StatusUpdate {
            message_id: message_id.clone(),
            status,
            updated_by: requester_id.to_owned(),
            updated_at: self.deps.clock.now(),
        };

        if let Err(publish_error) = self
            .deps
            .publisher
            .publish_status_update(requester_id, &update)
            .await
        {
            tracing::error!(
                user_id = %requester_id,
                sender_id = %message_id.sender_id,
                status = %status,
                error = %publish_error,
                "状态已更新，但推送失败"
            );
        }
    }
}

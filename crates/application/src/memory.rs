//! 内存版消息存储
//!
//! 单进程场景与测试使用。所有写操作在同一把写锁内完成，级联更新因此是原子的。

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    page_limit, ChatId, ChatSession, Message, MessageId, MessageRepository, MessageStatus,
    RepositoryError, RepositoryResult, Timestamp,
};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<BTreeMap<MessageId, Message>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

fn in_chat(message: &Message, first: &str, second: &str) -> bool {
    (message.sender_id == first && message.receiver_id == second)
        || (message.sender_id == second && message.receiver_id == first)
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn save(&self, message: &Message) -> RepositoryResult<()> {
        message.validate()?;

        let id = message.id();
        let mut messages = self.messages.write().await;
        if messages.contains_key(&id) {
            return Err(RepositoryError::Duplicate(id));
        }
        messages.insert(id, message.clone());
        Ok(())
    }

    async fn get_messages(
        &self,
        chat_id: &ChatId,
        cursor: Option<Timestamp>,
        limit: i64,
    ) -> RepositoryResult<Vec<Message>> {
        let (first, second) = chat_id.participants();
        let limit = usize::try_from(page_limit(limit)).unwrap_or_default();

        let messages = self.messages.read().await;
        let mut page: Vec<Message> = messages
            .values()
            .filter(|message| in_chat(message, first, second))
            .filter(|message| cursor.map_or(true, |cursor| message.created_at < cursor))
            .cloned()
            .collect();
        page.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id().cmp(&a.id())));
        page.truncate(limit);
        Ok(page)
    }

    async fn get_chat_sessions(&self, user_id: &str) -> RepositoryResult<Vec<ChatSession>> {
        let messages = self.messages.read().await;
        let mut sessions: HashMap<ChatId, ChatSession> = HashMap::new();

        for message in messages
            .values()
            .filter(|m| m.sender_id == user_id || m.receiver_id == user_id)
        {
            let chat_id = ChatId::between(&message.sender_id, &message.receiver_id);
            let unread = u64::from(
                message.receiver_id == user_id && message.status != MessageStatus::Read,
            );

            let session = sessions.entry(chat_id.clone()).or_insert_with(|| ChatSession {
                chat_id,
                other_participant: message.other_participant(user_id).to_owned(),
                last_message_at: message.created_at,
                last_message: message.content.clone(),
                last_message_by: message.sender_id.clone(),
                unread_count: 0,
            });
            session.unread_count += unread;
            if message.created_at > session.last_message_at {
                session.last_message_at = message.created_at;
                session.last_message = message.content.clone();
                session.last_message_by = message.sender_id.clone();
            }
        }

        let mut sessions: Vec<ChatSession> = sessions.into_values().collect();
        sessions.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(sessions)
    }

    async fn advance_status_up_to(
        &self,
        message_id: &MessageId,
        status: MessageStatus,
    ) -> RepositoryResult<u64> {
        let lower = MessageId::new(
            &message_id.sender_id,
            &message_id.receiver_id,
            DateTime::<Utc>::MIN_UTC,
        );

        let mut messages = self.messages.write().await;
        let mut changed = 0;
        for message in messages.range_mut(lower..=message_id.clone()).map(|(_, m)| m) {
            if message.status < status {
                message.status = status;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn get_message_by_id(&self, message_id: &MessageId) -> RepositoryResult<Message> {
        self.messages
            .read()
            .await
            .get(message_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(message_id.clone()))
    }

    async fn get_unread_count(&self, user_id: &str, chat_id: &ChatId) -> RepositoryResult<u64> {
        let Some(other) = chat_id.other_participant(user_id) else {
            return Ok(0);
        };

        let messages = self.messages.read().await;
        let count = messages
            .values()
            .filter(|m| m.sender_id == other && m.receiver_id == user_id)
            .filter(|m| m.status != MessageStatus::Read)
            .count();
        Ok(count as u64)
    }

    async fn mark_chat_as_read(&self, user_id: &str, chat_id: &ChatId) -> RepositoryResult<u64> {
        let Some(other) = chat_id.other_participant(user_id) else {
            return Ok(0);
        };

        let mut messages = self.messages.write().await;
        let mut changed = 0;
        for message in messages
            .values_mut()
            .filter(|m| m.sender_id == other && m.receiver_id == user_id)
        {
            if message.status != MessageStatus::Read {
                message.status = MessageStatus::Read;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    page_limit, ChatId, ChatSession, Message, MessageId, MessageRepository, MessageStatus,
    RepositoryError, RepositoryResult, Timestamp,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    RepositoryError::storage(err.to_string())
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    sender_id: String,
    receiver_id: String,
    created_at: DateTime<Utc>,
    content: String,
    status: String,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let status = value
            .status
            .parse::<MessageStatus>()
            .map_err(|err| invalid_data(err.to_string()))?;

        Ok(Message {
            sender_id: value.sender_id,
            receiver_id: value.receiver_id,
            created_at: value.created_at,
            content: value.content,
            status,
        })
    }
}

#[derive(Debug, FromRow)]
struct ChatSessionRecord {
    other_participant: String,
    last_message_at: DateTime<Utc>,
    last_message: String,
    last_message_by: String,
    unread_count: i64,
}

impl ChatSessionRecord {
    fn into_session(self, user_id: &str) -> ChatSession {
        ChatSession {
            chat_id: ChatId::between(user_id, &self.other_participant),
            other_participant: self.other_participant,
            last_message_at: self.last_message_at,
            last_message: self.last_message,
            last_message_by: self.last_message_by,
            unread_count: to_count(self.unread_count),
        }
    }
}

/// PostgreSQL 消息存储
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn save(&self, message: &Message) -> RepositoryResult<()> {
        message.validate()?;

        sqlx::query(
            r#"
            INSERT INTO messages (sender_id, receiver_id, created_at, content, status)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&message.sender_id)
        .bind(&message.receiver_id)
        .bind(message.created_at)
        .bind(&message.content)
        .bind(message.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(ref db_err)
                if db_err.code().is_some_and(|code| code == "23505") =>
            {
                RepositoryError::Duplicate(message.id())
            }
            other => map_sqlx_err(other),
        })?;

        tracing::debug!(
            sender_id = %message.sender_id,
            receiver_id = %message.receiver_id,
            "消息已写入数据库"
        );
        Ok(())
    }

    async fn get_messages(
        &self,
        chat_id: &ChatId,
        cursor: Option<Timestamp>,
        limit: i64,
    ) -> RepositoryResult<Vec<Message>> {
        let (first, second) = chat_id.participants();

        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT sender_id, receiver_id, created_at, content, status
            FROM messages
            WHERE ((sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1))
              AND ($3::timestamptz IS NULL OR created_at < $3)
            ORDER BY created_at DESC, sender_id DESC
            LIMIT $4
            "#,
        )
        .bind(first)
        .bind(second)
        .bind(cursor)
        .bind(page_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Message::try_from).collect()
    }

    async fn get_chat_sessions(&self, user_id: &str) -> RepositoryResult<Vec<ChatSession>> {
        // 一条语句同时算出每个会话的最后一条消息和未读数
        let records = sqlx::query_as::<_, ChatSessionRecord>(
            r#"
            WITH participant_messages AS (
                SELECT
                    CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END AS other_participant,
                    sender_id,
                    receiver_id,
                    created_at,
                    content,
                    status
                FROM messages
                WHERE sender_id = $1 OR receiver_id = $1
            ),
            latest AS (
                SELECT DISTINCT ON (other_participant)
                    other_participant,
                    created_at AS last_message_at,
                    content AS last_message,
                    sender_id AS last_message_by
                FROM participant_messages
                ORDER BY other_participant, created_at DESC
            ),
            unread AS (
                SELECT
                    other_participant,
                    COUNT(*) FILTER (WHERE receiver_id = $1 AND status <> 'read') AS unread_count
                FROM participant_messages
                GROUP BY other_participant
            )
            SELECT
                latest.other_participant,
                latest.last_message_at,
                latest.last_message,
                latest.last_message_by,
                unread.unread_count
            FROM latest
            JOIN unread ON unread.other_participant = latest.other_participant
            ORDER BY latest.last_message_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records
            .into_iter()
            .map(|record| record.into_session(user_id))
            .collect())
    }

    async fn advance_status_up_to(
        &self,
        message_id: &MessageId,
        status: MessageStatus,
    ) -> RepositoryResult<u64> {
        let lower: Vec<&'static str> = status.predecessors().map(|s| s.as_str()).collect();
        if lower.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let result = sqlx::query(
            r#"
            UPDATE messages
            SET status = $4
            WHERE sender_id = $1
              AND receiver_id = $2
              AND created_at <= $3
              AND status = ANY($5)
            "#,
        )
        .bind(&message_id.sender_id)
        .bind(&message_id.receiver_id)
        .bind(message_id.created_at)
        .bind(status.as_str())
        .bind(lower)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        tx.commit().await.map_err(map_sqlx_err)?;

        let changed = result.rows_affected();
        tracing::debug!(
            sender_id = %message_id.sender_id,
            receiver_id = %message_id.receiver_id,
            status = %status,
            count = changed,
            "消息状态已批量推进"
        );
        Ok(changed)
    }

    async fn get_message_by_id(&self, message_id: &MessageId) -> RepositoryResult<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT sender_id, receiver_id, created_at, content, status
            FROM messages
            WHERE sender_id = $1 AND receiver_id = $2 AND created_at = $3
            "#,
        )
        .bind(&message_id.sender_id)
        .bind(&message_id.receiver_id)
        .bind(message_id.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record
            .map(Message::try_from)
            .transpose()?
            .ok_or_else(|| RepositoryError::NotFound(message_id.clone()))
    }

    async fn get_unread_count(&self, user_id: &str, chat_id: &ChatId) -> RepositoryResult<u64> {
        let Some(other) = chat_id.other_participant(user_id) else {
            return Ok(0);
        };

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM messages
            WHERE sender_id = $1 AND receiver_id = $2 AND status <> 'read'
            "#,
        )
        .bind(other)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(to_count(count))
    }

    async fn mark_chat_as_read(&self, user_id: &str, chat_id: &ChatId) -> RepositoryResult<u64> {
        let Some(other) = chat_id.other_participant(user_id) else {
            return Ok(0);
        };

        let result = sqlx::query(
            r#"
            UPDATE messages
            SET status = 'read'
            WHERE sender_id = $1 AND receiver_id = $2 AND status <> 'read'
            "#,
        )
        .bind(other)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(result.rows_affected())
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await
}

//! Redis 推送
//!
//! 通过 `PUBLISH` 把通知信封发到 `messages.{user}` / `status.{user}` 频道。
//! 连接由 `ConnectionManager` 管理，断线后自动重连。

use application::{MessagePublisher, Notification, PublishError};
use async_trait::async_trait;
use chrono::Utc;
use domain::{Message, StatusUpdate};
use redis::aio::ConnectionManager;
use tokio::sync::RwLock;

pub struct RedisMessagePublisher {
    connection: RwLock<Option<ConnectionManager>>,
}

impl RedisMessagePublisher {
    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            connection: RwLock::new(Some(connection)),
        }
    }

    /// 建立 Redis 连接
    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let connection = client.get_connection_manager().await?;
        tracing::info!("Redis 推送连接已建立");
        Ok(Self::new(connection))
    }

    async fn publish(&self, notification: Notification) -> Result<(), PublishError> {
        let mut connection = self
            .connection
            .read()
            .await
            .clone()
            .ok_or(PublishError::Closed)?;

        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(&notification.topic)
            .arg(&notification.payload)
            .query_async(&mut connection)
            .await
            .map_err(|e| PublishError::transport(format!("Redis PUBLISH 失败: {}", e)))?;

        tracing::debug!(topic = %notification.topic, receivers, "通知已推送");
        Ok(())
    }
}

#[async_trait]
impl MessagePublisher for RedisMessagePublisher {
    async fn publish_message(&self, message: &Message) -> Result<(), PublishError> {
        self.publish(Notification::new_message(message, Utc::now())?)
            .await
    }

    async fn publish_status_update(
        &self,
        user_id: &str,
        update: &StatusUpdate,
    ) -> Result<(), PublishError> {
        self.publish(Notification::status_update(user_id, update, Utc::now())?)
            .await
    }

    async fn close(&self) -> Result<(), PublishError> {
        if self.connection.write().await.take().is_some() {
            tracing::info!("Redis 推送连接已关闭");
        }
        Ok(())
    }
}

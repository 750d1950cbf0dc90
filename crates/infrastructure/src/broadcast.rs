//! 进程内推送
//!
//! 基于 tokio broadcast 通道，同一进程内的订阅者按主题自行过滤。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use application::{MessagePublisher, Notification, PublishError};
use async_trait::async_trait;
use chrono::Utc;
use domain::{Message, StatusUpdate};
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct LocalMessagePublisher {
    sender: broadcast::Sender<Notification>,
    closed: Arc<AtomicBool>,
}

impl LocalMessagePublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    fn send(&self, notification: Notification) -> Result<(), PublishError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PublishError::Closed);
        }
        // 没有订阅者时直接丢弃
        if self.sender.receiver_count() == 0 {
            return Ok(());
        }
        self.sender
            .send(notification)
            .map_err(|err| PublishError::transport(err.to_string()))?;
        Ok(())
    }
}

impl Default for LocalMessagePublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl MessagePublisher for LocalMessagePublisher {
    async fn publish_message(&self, message: &Message) -> Result<(), PublishError> {
        self.send(Notification::new_message(message, Utc::now())?)
    }

    async fn publish_status_update(
        &self,
        user_id: &str,
        update: &StatusUpdate,
    ) -> Result<(), PublishError> {
        self.send(Notification::status_update(user_id, update, Utc::now())?)
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

use std::sync::Arc;
use std::time::Duration;

use application::{MessagePublisher, MessagingService, MessagingServiceDependencies, SystemClock};
use config::AppConfig;
use sqlx::PgPool;
use thiserror::Error;

use crate::{
    migrations::MIGRATOR,
    pubsub::RedisMessagePublisher,
    queued::QueuedMessagePublisher,
    repository::{create_pg_pool, PgMessageRepository},
};

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// 组装好的基础设施：数据库存储 + 带缓冲的 Redis 推送
#[derive(Clone)]
pub struct Infrastructure {
    pub pool: PgPool,
    pub message_repository: Arc<PgMessageRepository>,
    pub publisher: Arc<QueuedMessagePublisher>,
}

impl Infrastructure {
    pub async fn connect(config: &AppConfig) -> Result<Self, InfrastructureError> {
        let pool = create_pg_pool(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(config.database.acquire_timeout_secs),
        )
        .await?;
        MIGRATOR.run(&pool).await?;
        tracing::info!(
            max_connections = config.database.max_connections,
            "数据库连接池已就绪"
        );

        let redis = RedisMessagePublisher::connect(&config.redis.url).await?;
        let publisher = Arc::new(QueuedMessagePublisher::new(
            Arc::new(redis),
            config.notifier.queue_capacity,
        ));
        let message_repository = Arc::new(PgMessageRepository::new(pool.clone()));

        Ok(Self {
            pool,
            message_repository,
            publisher,
        })
    }

    pub fn messaging_service(&self) -> MessagingService {
        MessagingService::new(MessagingServiceDependencies {
            message_repository: self.message_repository.clone(),
            publisher: self.publisher.clone(),
            clock: Arc::new(SystemClock::new()),
        })
    }

    /// 先发完队列中的通知，再关闭数据库连接池
    pub async fn shutdown(&self) {
        if let Err(error) = self.publisher.close().await {
            tracing::warn!(error = %error, "关闭推送器失败");
        }
        self.pool.close().await;
        tracing::info!("基础设施已关闭");
    }
}

//! 基础设施层实现。
//!
//! 提供数据库存储、Redis 推送、进程内推送、推送队列等适配器，
//! 实现应用/领域层定义的接口，并负责日志初始化与组件组装。

pub mod broadcast;
pub mod builder;
pub mod migrations;
pub mod pubsub;
pub mod queued;
pub mod repository;
pub mod telemetry;

pub use broadcast::LocalMessagePublisher;
pub use builder::{Infrastructure, InfrastructureError};
pub use migrations::MIGRATOR;
pub use pubsub::RedisMessagePublisher;
pub use queued::QueuedMessagePublisher;
pub use repository::{create_pg_pool, PgMessageRepository};
pub use telemetry::{init_tracing, TelemetryError};

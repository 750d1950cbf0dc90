//! 应用层实现。
//!
//! 这里提供围绕消息领域模型的用例服务，处理输入校验、访问控制、
//! 以及对外部适配器（消息存储、实时推送、时钟）的抽象。

pub mod clock;
pub mod dto;
pub mod error;
pub mod memory;
pub mod publisher;
pub mod services;

pub use clock::{Clock, SystemClock};
pub use dto::{ListMessagesRequest, MessagePage, SendMessageRequest};
pub use error::ApplicationError;
pub use memory::InMemoryMessageRepository;
pub use publisher::{MessagePublisher, Notification, PublishError};
pub use services::{MessagingService, MessagingServiceDependencies};

//! 一对一消息系统核心领域模型
//!
//! 包含消息、会话摘要、实时通知信封，以及消息存储接口。

pub mod chat_session;
pub mod errors;
pub mod events;
pub mod message;
pub mod repository;

// 重新导出常用类型
pub use chat_session::*;
pub use errors::*;
pub use events::*;
pub use message::*;
pub use repository::*;

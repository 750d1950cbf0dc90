//! 领域事件定义
//!
//! 实时通知使用的信封和主题命名。

pub mod notification;

// 重新导出事件类型
pub use notification::*;

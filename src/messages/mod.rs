//! 消息层：对话消息、只追加日志、模型消息折叠

pub mod log;
pub mod message;
pub mod model;

pub use log::MessageLog;
pub use message::{Attachment, Message, MessageBody, MessageId};
pub use model::{to_model_messages, ContentPart, ModelContent, ModelMessage, Role};

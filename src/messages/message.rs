//! 对话消息：用户输入 / 助手回复 / 动作调用
//!
//! 消息创建后不可变；同一轮中由某条输入触发的回复与动作消息复用该输入的 id 作为 correlation_id。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::process::Pid;
use crate::resources::ActionHandle;

/// 消息 ID
pub type MessageId = String;

/// 用户附件
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    /// 声明的媒体类型，如 text/plain、image/png
    pub media_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            data,
        }
    }
}

/// 消息体（三种形态）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBody {
    /// 用户输入：文本和/或附件
    Input {
        text: Option<String>,
        #[serde(default)]
        files: Vec<Attachment>,
    },
    /// 助手文本回复
    Response { text: String },
    /// 一次动作调用及其结果
    Action {
        uri: String,
        action_id: String,
        args: Value,
        /// 动作产生的进程
        process: Option<Pid>,
        /// 立即返回的结果内容
        content: Option<Value>,
    },
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    created_at: DateTime<Utc>,
    correlation_id: MessageId,
    body: MessageBody,
}

fn new_id() -> MessageId {
    format!("msg_{}", uuid::Uuid::new_v4())
}

impl Message {
    /// 用户输入；作为一轮的起点，correlation_id 即自身 id
    pub fn input(text: Option<String>, files: Vec<Attachment>) -> Self {
        let id = new_id();
        Self {
            correlation_id: id.clone(),
            id,
            created_at: Utc::now(),
            body: MessageBody::Input { text, files },
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::input(Some(text.into()), Vec::new())
    }

    pub fn response(correlation_id: impl Into<MessageId>, text: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            created_at: Utc::now(),
            correlation_id: correlation_id.into(),
            body: MessageBody::Response { text: text.into() },
        }
    }

    pub fn action(
        correlation_id: impl Into<MessageId>,
        uri: impl Into<String>,
        action_id: impl Into<String>,
        args: Value,
        process: Option<Pid>,
        content: Option<Value>,
    ) -> Self {
        Self {
            id: new_id(),
            created_at: Utc::now(),
            correlation_id: correlation_id.into(),
            body: MessageBody::Action {
                uri: uri.into(),
                action_id: action_id.into(),
                args,
                process,
                content,
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    pub fn is_input(&self) -> bool {
        matches!(self.body, MessageBody::Input { .. })
    }

    /// 动作消息对应的句柄
    pub fn action_handle(&self) -> Option<ActionHandle> {
        match &self.body {
            MessageBody::Action { uri, action_id, .. } => {
                Some(ActionHandle::new(uri.clone(), action_id.clone()))
            }
            _ => None,
        }
    }
}

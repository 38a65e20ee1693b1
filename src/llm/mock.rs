//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序弹出预设回复（文本 / JSON 对象 / 错误），并记录每次请求的消息，便于断言 prompt 内容。
//! 预设回复用完后：complete 回显最后一条 User 文本，generate_object 返回 fallback 对象（若有）。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;
use serde_json::Value;

use crate::llm::{extract_json, LlmClient, LlmError, TextStream};
use crate::messages::{ModelContent, ModelMessage, Role};

/// 预设回复
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Object(Value),
    Error(LlmError),
}

/// Mock 客户端：脚本化回复 + 请求记录
#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<Vec<ModelMessage>>>,
    fallback_object: Option<Value>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 离线演示用：未预设时策略选择固定返回 TEXT
    pub fn offline() -> Self {
        Self {
            fallback_object: Some(serde_json::json!({ "strategy": "TEXT" })),
            ..Self::default()
        }
    }

    pub fn with_replies(replies: impl IntoIterator<Item = MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn push_reply(&self, reply: MockReply) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(reply);
        }
    }

    /// 已收到的请求（每次调用一条）
    pub fn requests(&self) -> Vec<Vec<ModelMessage>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|q| q.len()).unwrap_or(0)
    }

    fn record(&self, messages: &[ModelMessage]) {
        if let Ok(mut r) = self.requests.lock() {
            r.push(messages.to_vec());
        }
    }

    fn next_reply(&self) -> Option<MockReply> {
        self.replies.lock().ok().and_then(|mut q| q.pop_front())
    }
}

fn last_user_text(messages: &[ModelMessage]) -> String {
    messages
        .iter()
        .rev()
        .filter(|m| m.role == Role::User)
        .find_map(|m| match &m.content {
            ModelContent::Text(t) => Some(t.clone()),
            ModelContent::Parts(_) => None,
        })
        .unwrap_or_else(|| "(no input)".to_string())
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[ModelMessage]) -> Result<String, LlmError> {
        self.record(messages);
        match self.next_reply() {
            Some(MockReply::Text(t)) => Ok(t),
            Some(MockReply::Object(v)) => Ok(v.to_string()),
            Some(MockReply::Error(e)) => Err(e),
            None => Ok(format!("Echo from Mock: {}", last_user_text(messages))),
        }
    }

    async fn complete_stream(&self, messages: &[ModelMessage]) -> Result<TextStream, LlmError> {
        let content = self.complete(messages).await?;
        Ok(Box::pin(stream::iter(vec![Ok(content)])))
    }

    async fn generate_object(
        &self,
        messages: &[ModelMessage],
        _schema: &Value,
    ) -> Result<Value, LlmError> {
        self.record(messages);
        match self.next_reply() {
            Some(MockReply::Object(v)) => Ok(v),
            Some(MockReply::Text(t)) => extract_json(&t),
            Some(MockReply::Error(e)) => Err(e),
            None => self
                .fallback_object
                .clone()
                .ok_or_else(|| LlmError::InvalidOutput("mock script exhausted".to_string())),
        }
    }
}

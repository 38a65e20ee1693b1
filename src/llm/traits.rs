//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：complete（非流式）、complete_stream（流式 Token）、
//! generate_object（结构化输出）。内核不做重试，重试与退避策略属于具体客户端。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde_json::Value;
use thiserror::Error;

use crate::messages::ModelMessage;

/// 流式文本块
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// 模型调用失败
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("API error: {0}")]
    Api(String),

    /// 模型返回了无法提取 JSON 的文本
    #[error("Invalid output: {0}")]
    InvalidOutput(String),
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[ModelMessage]) -> Result<String, LlmError>;

    /// 流式完成，返回 Token 流
    async fn complete_stream(&self, messages: &[ModelMessage]) -> Result<TextStream, LlmError>;

    /// 结构化输出：返回符合 schema 的 JSON 值（校验由调用方负责）
    ///
    /// 默认实现把 schema 拼进 system 指令后走 complete，再从文本中提取 JSON 块。
    async fn generate_object(
        &self,
        messages: &[ModelMessage],
        schema: &Value,
    ) -> Result<Value, LlmError> {
        let mut full = messages.to_vec();
        full.push(ModelMessage::system(format!(
            "Respond with a single JSON object that matches this JSON Schema. Output JSON only.\n{}",
            serde_json::to_string_pretty(schema).unwrap_or_default()
        )));
        let output = self.complete(&full).await?;
        crate::llm::extract_json(&output)
    }

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

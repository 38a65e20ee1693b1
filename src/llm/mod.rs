//! LLM 层：客户端抽象、结构化输出解析与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod structured;
pub mod traits;

use std::sync::Arc;

use crate::config::KernelConfig;

pub use mock::{MockLlmClient, MockReply};
pub use openai::{OpenAiClient, TokenUsage};
pub use structured::{extract_json, parse_object, validate_against};
pub use traits::{LlmClient, LlmError, TextStream};

/// 根据配置与环境变量选择 LLM 后端（OpenAI 兼容 / Mock）
pub fn create_llm_from_config(cfg: &KernelConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let has_key = std::env::var("OPENAI_API_KEY").is_ok();

    if has_key && provider != "mock" {
        tracing::info!("Using OpenAI-compatible LLM ({})", cfg.llm.model);
        Arc::new(OpenAiClient::new(
            cfg.llm.base_url.as_deref(),
            &cfg.llm.model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
            cfg.llm.timeouts.request,
        ))
    } else {
        tracing::warn!("No API key set or provider is mock, using Mock LLM");
        Arc::new(MockLlmClient::offline())
    }
}

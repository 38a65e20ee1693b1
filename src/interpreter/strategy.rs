//! 策略：命名的应答计划（TEXT 直接回复 / RESEARCH 先调用动作再回复）
//!
//! 每个策略启动后得到一个 StrategyRun 步进机：step 要么产出一个响应（Yield），要么结束（Done）。
//! 调用方在两次 step 之间可以更新消息历史，下一步基于最新历史继续。

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use crate::core::KernelError;
use crate::interpreter::{system_preamble, Response, StreamEvent, TurnInput};
use crate::llm::{parse_object, validate_against, LlmClient, LlmError};
use crate::messages::{to_model_messages, ModelMessage};
use crate::resources::ActionDict;

pub const TEXT: &str = "TEXT";
pub const RESEARCH: &str = "RESEARCH";

/// 单步结果
#[derive(Debug)]
pub enum Step {
    Yield(Response),
    Done,
}

/// 一个回合内共享的只读上下文
#[derive(Clone)]
pub struct TurnContext {
    pub llm: Arc<dyn LlmClient>,
    /// 回合开始时的 ActionDict 快照
    pub actions: Arc<ActionDict>,
    pub system_prompt: String,
    pub hint: Option<String>,
    pub emit_logs: bool,
    pub stream_tx: Option<mpsc::UnboundedSender<StreamEvent>>,
}

impl TurnContext {
    /// system 前言 + 折叠后的历史
    pub fn model_messages(&self, input: &TurnInput) -> Vec<ModelMessage> {
        let mut out = vec![ModelMessage::system(system_preamble(self, &input.processes))];
        out.extend(to_model_messages(&input.messages, &input.processes));
        out
    }

    fn send(&self, ev: StreamEvent) {
        if let Some(tx) = &self.stream_tx {
            let _ = tx.send(ev);
        }
    }

    /// 流式生成直接回复文本，逐块推送到 stream_tx
    pub async fn stream_text(&self, input: &TurnInput) -> Result<String, KernelError> {
        let correlation_id = input.correlation_id();
        let mut stream = self.llm.complete_stream(&self.model_messages(input)).await?;
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            self.send(StreamEvent::Chunk {
                correlation_id: correlation_id.clone(),
                text: chunk.clone(),
            });
            text.push_str(&chunk);
        }
        self.send(StreamEvent::Done { correlation_id });
        Ok(text)
    }
}

/// 结构化输出无法提取时归为 schema 错误，其余保持为模型调用错误
pub(crate) fn object_error(e: LlmError) -> KernelError {
    match e {
        LlmError::InvalidOutput(detail) => KernelError::ModelSchema(detail),
        other => KernelError::Llm(other),
    }
}

/// 策略的步进机
#[async_trait]
pub trait StrategyRun: Send {
    async fn step(&mut self, ctx: &TurnContext, input: &TurnInput) -> Result<Step, KernelError>;
}

/// 策略：名称、描述（供模型选择）、启动步进机
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn start(&self) -> Box<dyn StrategyRun>;
}

/// 已注册策略（有序，名称即模型可选的枚举值）
#[derive(Clone)]
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn Strategy>>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
            .with(crate::interpreter::TextStrategy)
            .with(crate::interpreter::ResearchStrategy)
    }
}

impl StrategyRegistry {
    /// 空注册表
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// 注册策略；同名覆盖
    pub fn with(mut self, strategy: impl Strategy + 'static) -> Self {
        let strategy: Arc<dyn Strategy> = Arc::new(strategy);
        self.strategies.retain(|s| s.name() != strategy.name());
        self.strategies.push(strategy);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Strategy>> {
        self.strategies.iter().find(|s| s.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    fn instructions(&self) -> String {
        let mut lines = vec!["Choose how to handle the latest user message:".to_string()];
        for s in &self.strategies {
            lines.push(format!("- {}: {}", s.name(), s.description()));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Deserialize)]
struct StrategyChoice {
    #[serde(default)]
    thought: Option<String>,
    strategy: String,
}

/// 策略选择：一次结构化调用，结果限定为已注册策略名；可附带思考内容
pub async fn choose_strategy(
    ctx: &TurnContext,
    strategies: &StrategyRegistry,
    input: &TurnInput,
) -> Result<(Option<String>, Arc<dyn Strategy>), KernelError> {
    let schema = json!({
        "type": "object",
        "properties": {
            "thought": { "type": "string" },
            "strategy": { "type": "string", "enum": strategies.names() }
        },
        "required": ["strategy"]
    });
    let mut messages = ctx.model_messages(input);
    messages.push(ModelMessage::system(strategies.instructions()));

    let value = ctx
        .llm
        .generate_object(&messages, &schema)
        .await
        .map_err(object_error)?;
    validate_against(&schema, &value)?;
    let choice: StrategyChoice = parse_object(value)?;
    let strategy = strategies
        .get(&choice.strategy)
        .ok_or_else(|| KernelError::ModelSchema(format!("unknown strategy {}", choice.strategy)))?;
    tracing::info!(strategy = %choice.strategy, "strategy chosen");
    Ok((choice.thought.filter(|t| !t.trim().is_empty()), strategy))
}

//! 策略引擎：选择策略、运行步进机、把响应交还调用方
//!
//! run(input) 返回一个 Turn；调用方循环 resume，遇到 ActionProposal 时自行分发（见 core::session），
//! 把追加了动作结果的历史作为下一次 resume 的更新传回。

pub mod events;
pub mod prompt;
pub mod proposals;
pub mod research;
pub mod strategy;
pub mod text;
pub mod turn;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::llm::LlmClient;
use crate::resources::{ActionDict, Resource, ResourceRegistry};

pub use events::{Response, StreamEvent};
pub use prompt::{system_preamble, DEFAULT_SYSTEM_PROMPT};
pub use proposals::{action_choice_schema, generate_proposals, parse_proposals, resolve_display};
pub use research::ResearchStrategy;
pub use strategy::{
    choose_strategy, Step, Strategy, StrategyRegistry, StrategyRun, TurnContext, RESEARCH, TEXT,
};
pub use text::TextStrategy;
pub use turn::{Turn, TurnInput, TurnUpdate};

/// 引擎配置
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    pub system_prompt: String,
    /// 运营方提示，写入 system 前言
    pub hint: Option<String>,
    /// 是否产出 Log 响应
    pub emit_logs: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            hint: None,
            emit_logs: false,
        }
    }
}

pub struct Interpreter {
    llm: Arc<dyn LlmClient>,
    resources: ResourceRegistry,
    strategies: StrategyRegistry,
    config: InterpreterConfig,
    stream_tx: Option<mpsc::UnboundedSender<StreamEvent>>,
}

impl Interpreter {
    pub fn new(llm: Arc<dyn LlmClient>, resources: Vec<Resource>, config: InterpreterConfig) -> Self {
        Self {
            llm,
            resources: ResourceRegistry::new(resources),
            strategies: StrategyRegistry::default(),
            config,
            stream_tx: None,
        }
    }

    pub fn with_strategies(mut self, strategies: StrategyRegistry) -> Self {
        self.strategies = strategies;
        self
    }

    /// 设置流式输出通道
    pub fn with_stream_tx(mut self, tx: mpsc::UnboundedSender<StreamEvent>) -> Self {
        self.stream_tx = Some(tx);
        self
    }

    /// 替换资源集合（进行中的回合继续使用旧快照）
    pub fn update_resources(&mut self, resources: Vec<Resource>) {
        self.resources.update(resources);
    }

    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    pub fn action_dict(&self) -> Arc<ActionDict> {
        self.resources.actions()
    }

    pub fn strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    /// 开始一个回合
    pub fn run(&self, input: TurnInput) -> Turn {
        let hint = input.hint.clone().or_else(|| self.config.hint.clone());
        let ctx = TurnContext {
            llm: Arc::clone(&self.llm),
            actions: self.resources.actions(),
            system_prompt: self.config.system_prompt.clone(),
            hint,
            emit_logs: self.config.emit_logs,
            stream_tx: self.stream_tx.clone(),
        };
        Turn::new(ctx, self.strategies.clone(), input)
    }
}

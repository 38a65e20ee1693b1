//! 回合：显式步进机
//!
//! `Turn::resume` 每次返回一个响应（或 None 表示回合结束）；调用方可以在下一次 resume 时
//! 传入更新后的消息历史（例如追加了动作结果），策略据此继续。
//! 回合内任一步出错即终止，之后 resume 只返回 None。
//! 取消即停止调用 resume；进行中的模型调用由其 future 自行结束。

use std::collections::VecDeque;

use crate::core::KernelError;
use crate::interpreter::{
    choose_strategy, Response, Step, Strategy, StrategyRegistry, StrategyRun, TextStrategy,
    TurnContext,
};
use crate::messages::Message;
use crate::process::ProcessDescriptions;

/// 回合输入：消息历史、进程描述、可选提示（覆盖配置中的 hint）
#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    pub messages: Vec<Message>,
    pub processes: ProcessDescriptions,
    pub hint: Option<String>,
}

impl TurnInput {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_processes(mut self, processes: ProcessDescriptions) -> Self {
        self.processes = processes;
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// 当前回合的 correlation id（最后一条输入消息）
    pub fn correlation_id(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_input())
            .map(|m| m.id().to_string())
    }
}

/// 恢复点传入的更新
#[derive(Debug, Clone)]
pub struct TurnUpdate {
    pub messages: Vec<Message>,
    /// None 表示沿用之前的进程描述
    pub processes: Option<ProcessDescriptions>,
}

impl TurnUpdate {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            processes: None,
        }
    }

    pub fn with_processes(mut self, processes: ProcessDescriptions) -> Self {
        self.processes = Some(processes);
        self
    }
}

enum Phase {
    Start,
    Running(Box<dyn StrategyRun>),
    Finished,
}

pub struct Turn {
    ctx: TurnContext,
    strategies: StrategyRegistry,
    input: TurnInput,
    pending: VecDeque<Response>,
    phase: Phase,
}

impl Turn {
    pub(crate) fn new(ctx: TurnContext, strategies: StrategyRegistry, input: TurnInput) -> Self {
        Self {
            ctx,
            strategies,
            input,
            pending: VecDeque::new(),
            phase: Phase::Start,
        }
    }

    pub fn input(&self) -> &TurnInput {
        &self.input
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Finished) && self.pending.is_empty()
    }

    /// 推进回合，返回下一个响应；None 表示结束
    pub async fn resume(&mut self, update: Option<TurnUpdate>) -> Result<Option<Response>, KernelError> {
        if let Some(update) = update {
            self.input.messages = update.messages;
            if let Some(processes) = update.processes {
                self.input.processes = processes;
            }
        }

        loop {
            if let Some(resp) = self.pending.pop_front() {
                return Ok(Some(resp));
            }
            match &mut self.phase {
                Phase::Finished => return Ok(None),
                Phase::Start => {
                    if let Err(e) = self.begin().await {
                        self.phase = Phase::Finished;
                        return Err(e);
                    }
                }
                Phase::Running(run) => match run.step(&self.ctx, &self.input).await {
                    Ok(Step::Yield(resp)) => return Ok(Some(resp)),
                    Ok(Step::Done) => {
                        self.phase = Phase::Finished;
                        return Ok(None);
                    }
                    Err(e) => {
                        self.phase = Phase::Finished;
                        return Err(e);
                    }
                },
            }
        }
    }

    /// 选择策略；没有任何动作时直接走 TEXT
    async fn begin(&mut self) -> Result<(), KernelError> {
        if self.ctx.actions.is_empty() {
            tracing::debug!("no actions registered, answering directly");
            self.phase = Phase::Running(TextStrategy.start());
            return Ok(());
        }
        let (thought, strategy) = choose_strategy(&self.ctx, &self.strategies, &self.input).await?;
        if let Some(text) = thought {
            self.pending.push_back(Response::Thought { text });
        }
        if self.ctx.emit_logs {
            self.pending.push_back(Response::Log {
                text: format!("strategy: {}", strategy.name()),
            });
        }
        self.phase = Phase::Running(strategy.start());
        Ok(())
    }
}

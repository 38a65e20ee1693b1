//! 协议 trait 与分发数据类型
//!
//! 协议按 URI scheme 注册，执行动作提案；返回值是带标签的联合：普通数据或长生命周期进程。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::KernelError;
use crate::messages::{Message, MessageId};
use crate::process::{Pid, Process, ProcessKinds};
use crate::resources::{ActionHandle, DisplayMode};

/// 保留 scheme：直接寻址运行中的进程
pub const PROCESS_SCHEME: &str = "process";

/// 取 URI 的 scheme（小写）；无 `:` 时整个 URI 视为 scheme
pub fn scheme_of(uri: &str) -> String {
    uri.split_once(':')
        .map(|(s, _)| s)
        .unwrap_or(uri)
        .to_ascii_lowercase()
}

/// 动作提案：策略引擎产出，Runtime 立即消费，不持久化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionProposal {
    pub uri: String,
    pub action_id: String,
    pub args: Value,
    /// 已解析的展示方式，不会是 auto
    pub display: DisplayMode,
}

impl ActionProposal {
    pub fn new(
        uri: impl Into<String>,
        action_id: impl Into<String>,
        args: Value,
        display: DisplayMode,
    ) -> Self {
        Self {
            uri: uri.into(),
            action_id: action_id.into(),
            args,
            display,
        }
    }

    pub fn handle(&self) -> ActionHandle {
        ActionHandle::new(self.uri.clone(), self.action_id.clone())
    }
}

/// 协议处理器的返回
pub enum ActionOutput {
    Value(Value),
    Process(Box<dyn Process>),
    /// 转交给本协议创建的进程执行
    Invoke {
        pid: Pid,
        action_id: String,
        args: Value,
    },
}

/// 分发结果中的产物
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Content(Value),
    Process(Pid),
}

/// 分发结果
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub handle: ActionHandle,
    pub args: Value,
    pub outcome: ActionOutcome,
}

impl ActionResult {
    pub fn pid(&self) -> Option<&str> {
        match &self.outcome {
            ActionOutcome::Process(pid) => Some(pid),
            ActionOutcome::Content(_) => None,
        }
    }

    /// 转为写入日志的动作消息
    pub fn to_message(&self, correlation_id: impl Into<MessageId>) -> Message {
        let (process, content) = match &self.outcome {
            ActionOutcome::Content(v) => (None, Some(v.clone())),
            ActionOutcome::Process(pid) => (Some(pid.clone()), None),
        };
        Message::action(
            correlation_id,
            self.handle.uri.clone(),
            self.handle.action_id.clone(),
            self.args.clone(),
            process,
            content,
        )
    }
}

/// 协议 trait：声明 scheme、执行动作、（可选）提供进程恢复工厂
#[async_trait]
pub trait Protocol: Send + Sync {
    /// 该协议拥有的 scheme 列表
    fn schemes(&self) -> Vec<String>;

    async fn handle_action(&self, proposal: &ActionProposal) -> Result<ActionOutput, KernelError>;

    /// tag -> 进程构造器
    fn process_kinds(&self) -> Option<&ProcessKinds> {
        None
    }
}

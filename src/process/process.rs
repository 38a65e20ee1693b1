//! 进程抽象
//!
//! Process 是协议处理器返回的长生命周期实例（连接、打开的文档等）；
//! ProcessKind 是按 tag 注册的恢复工厂，从快照状态重建实例。
//! 运行中的进程在 mount 时拿到 ProcessNotifier，unmount 时释放。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::core::KernelError;
use crate::resources::{ActionDefinition, Icon};

/// 进程 ID
pub type Pid = String;

/// pid -> 进程当前描述，供消息折叠使用
pub type ProcessDescriptions = BTreeMap<Pid, Value>;

/// 运行时事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    ProcessCreated { pid: Pid },
    /// 进程内部状态变化（由进程自己通过 notifier 发出）
    ProcessChanged { pid: Pid },
    ProcessSuspended { pid: Pid },
    ProcessResumed { pid: Pid },
    ProcessClosed { pid: Pid },
}

/// 变更通知句柄：绑定到所属容器的 pid
#[derive(Debug, Clone)]
pub struct ProcessNotifier {
    pid: Pid,
    tx: broadcast::Sender<RuntimeEvent>,
}

impl ProcessNotifier {
    pub(crate) fn new(pid: Pid, tx: broadcast::Sender<RuntimeEvent>) -> Self {
        Self { pid, tx }
    }

    pub fn pid(&self) -> &str {
        &self.pid
    }

    pub fn notify_changed(&self) {
        // 没有订阅者时发送失败，忽略
        let _ = self.tx.send(RuntimeEvent::ProcessChanged {
            pid: self.pid.clone(),
        });
    }
}

/// 进程 trait：元数据、描述、快照与挂载钩子
pub trait Process: Send + Sync {
    /// 具体类型标识，用于从快照恢复
    fn tag(&self) -> &str;

    fn title(&self) -> Option<String> {
        None
    }

    fn icons(&self) -> Vec<Icon> {
        Vec::new()
    }

    /// 进程自身暴露的动作
    fn actions(&self) -> BTreeMap<String, ActionDefinition> {
        BTreeMap::new()
    }

    /// 是否允许在容量压力下被挂起
    fn discardable(&self) -> bool {
        true
    }

    /// 执行进程自身的动作，返回写入动作消息的内容
    fn handle_action(&mut self, action_id: &str, _args: &Value) -> Result<Value, KernelError> {
        Err(KernelError::ActionFailed(format!(
            "{}: unknown action '{}'",
            self.tag(),
            action_id
        )))
    }

    /// 当前状态描述（写入模型上下文）
    fn describe(&self) -> Value;

    /// 序列化内部状态（不透明）
    fn snapshot(&self) -> Result<Value, KernelError>;

    fn mount(&mut self, _notifier: ProcessNotifier) {}

    fn unmount(&mut self) {}
}

/// 进程类型：按 tag 注册的恢复工厂
pub trait ProcessKind: Send + Sync {
    fn tag(&self) -> &str;

    fn resume(&self, state: Value) -> Result<Box<dyn Process>, KernelError>;
}

/// tag -> ProcessKind
#[derive(Default, Clone)]
pub struct ProcessKinds {
    kinds: HashMap<String, Arc<dyn ProcessKind>>,
}

impl ProcessKinds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: impl ProcessKind + 'static) {
        let tag = kind.tag().to_string();
        self.kinds.insert(tag, Arc::new(kind));
    }

    pub fn with(mut self, kind: impl ProcessKind + 'static) -> Self {
        self.register(kind);
        self
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn ProcessKind>> {
        self.kinds.get(tag).cloned()
    }

    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.kinds.keys().cloned().collect();
        tags.sort();
        tags
    }
}

//! 进程运行时：进程表 + 容量约束 + 动作分发
//!
//! 进程表与协议注册表只通过 Runtime 自身的方法修改。Runtime 按单一所有者使用（&mut self），
//! 多线程宿主应通过 core::orchestrator 的 actor 任务访问，避免同一 pid 上的重入挂起 / 恢复。
//!
//! 容量：running 数超过 process_limit 时，按插入顺序（最旧优先）挂起 discardable 的运行中容器。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::core::KernelError;
use crate::process::{
    Pid, Process, ProcessContainer, ProcessDescriptions, ProcessNotifier, ProcessSnapshot,
    ProcessStatus, RuntimeEvent,
};
use crate::protocols::{
    scheme_of, ActionOutcome, ActionOutput, ActionProposal, ActionResult, Protocol,
    ProtocolRegistry, PROCESS_SCHEME,
};

/// 默认同时运行的进程上限
pub const DEFAULT_PROCESS_LIMIT: usize = 50;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// 运行时配置
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// None 表示不限
    pub process_limit: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            process_limit: Some(DEFAULT_PROCESS_LIMIT),
        }
    }
}

pub struct Runtime {
    protocols: ProtocolRegistry,
    processes: HashMap<Pid, ProcessContainer>,
    /// 插入顺序
    order: Vec<Pid>,
    process_limit: Option<usize>,
    events: broadcast::Sender<RuntimeEvent>,
}

impl Runtime {
    pub fn new(
        config: RuntimeConfig,
        protocols: Vec<Arc<dyn Protocol>>,
    ) -> Result<Self, KernelError> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let mut runtime = Self {
            protocols: ProtocolRegistry::new(),
            processes: HashMap::new(),
            order: Vec::new(),
            process_limit: config.process_limit,
            events,
        };
        for protocol in protocols {
            runtime.register_protocol(protocol)?;
        }
        Ok(runtime)
    }

    /// 订阅运行时事件
    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.events.subscribe()
    }

    pub fn register_protocol(&mut self, protocol: Arc<dyn Protocol>) -> Result<(), KernelError> {
        self.protocols.register(protocol)
    }

    pub fn deregister_protocol(&mut self, schemes: &[&str]) {
        self.protocols.deregister(schemes);
    }

    pub fn protocols(&self) -> &ProtocolRegistry {
        &self.protocols
    }

    pub fn process_limit(&self) -> Option<usize> {
        self.process_limit
    }

    fn emit(&self, event: RuntimeEvent) {
        let _ = self.events.send(event);
    }

    fn notifier(&self, pid: &str) -> ProcessNotifier {
        ProcessNotifier::new(pid.to_string(), self.events.clone())
    }

    /// 分发动作提案到对应协议；返回进程时包装为容器并加入进程表
    pub async fn dispatch(&mut self, proposal: &ActionProposal) -> Result<ActionResult, KernelError> {
        let handle = proposal.handle();
        let scheme = scheme_of(&proposal.uri);
        if scheme == PROCESS_SCHEME {
            return Err(KernelError::NotImplemented(format!(
                "direct process invocation: {}",
                handle
            )));
        }
        let protocol = self
            .protocols
            .get(&scheme)
            .ok_or_else(|| KernelError::UnregisteredProtocol(scheme.clone()))?;

        let start = Instant::now();
        let output = protocol.handle_action(proposal).await;
        let outcome = match &output {
            Ok(ActionOutput::Value(_)) => "value",
            Ok(ActionOutput::Process(_)) => "process",
            Ok(ActionOutput::Invoke { .. }) => "invoke",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "action_audit",
            "handle": handle.encode(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&proposal.args),
        });
        tracing::info!(audit = %audit.to_string(), "dispatch");

        let outcome = match output? {
            ActionOutput::Value(content) => ActionOutcome::Content(content),
            ActionOutput::Process(process) => {
                let container = ProcessContainer::new(scheme, process);
                let pid = container.pid().to_string();
                self.add_process(container)?;
                self.emit(RuntimeEvent::ProcessCreated { pid: pid.clone() });
                tracing::info!(pid = %pid, "process created");
                ActionOutcome::Process(pid)
            }
            ActionOutput::Invoke {
                pid,
                action_id,
                args,
            } => ActionOutcome::Content(self.invoke(&scheme, &pid, &action_id, &args)?),
        };

        Ok(ActionResult {
            handle,
            args: proposal.args.clone(),
            outcome,
        })
    }

    /// 把协议转交的动作交给其名下的进程执行；挂起的进程先恢复
    fn invoke(
        &mut self,
        scheme: &str,
        pid: &str,
        action_id: &str,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, KernelError> {
        let container = self
            .processes
            .get(pid)
            .ok_or_else(|| KernelError::ProcessNotFound(pid.to_string()))?;
        if container.source() != scheme {
            return Err(KernelError::ActionFailed(format!(
                "process {} is not owned by '{}'",
                pid, scheme
            )));
        }
        if !container.is_running() {
            self.resume(pid)?;
        }
        self.with_process_mut(pid, |process| process.handle_action(action_id, args))?
    }

    /// 以可变引用访问运行中的进程实例
    pub fn with_process_mut<R>(
        &mut self,
        pid: &str,
        f: impl FnOnce(&mut dyn Process) -> R,
    ) -> Result<R, KernelError> {
        let container = self
            .processes
            .get_mut(pid)
            .ok_or_else(|| KernelError::ProcessNotFound(pid.to_string()))?;
        match container.process_mut() {
            Some(process) => Ok(f(process)),
            None => Err(KernelError::ActionFailed(format!("process {} is suspended", pid))),
        }
    }

    /// 加入进程表（运行态容器会被挂载通知句柄），随后执行容量约束
    pub fn add_process(&mut self, mut container: ProcessContainer) -> Result<(), KernelError> {
        let pid = container.pid().to_string();
        if self.processes.contains_key(&pid) {
            return Err(KernelError::DuplicateProcess(pid));
        }
        container.mount(self.notifier(&pid));
        self.processes.insert(pid.clone(), container);
        self.order.push(pid);
        self.enforce_limit(None)
    }

    pub fn running_count(&self) -> usize {
        self.processes.values().filter(|c| c.is_running()).count()
    }

    /// 超出上限时按插入顺序挂起；`spare` 指定的 pid 不参与
    fn enforce_limit(&mut self, spare: Option<&str>) -> Result<(), KernelError> {
        let Some(limit) = self.process_limit else {
            return Ok(());
        };
        let mut excess = self.running_count().saturating_sub(limit);
        if excess == 0 {
            return Ok(());
        }
        let candidates: Vec<Pid> = self
            .order
            .iter()
            .filter(|pid| Some(pid.as_str()) != spare)
            .filter(|pid| {
                self.processes
                    .get(pid.as_str())
                    .map(|c| c.is_running() && c.discardable())
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        for pid in candidates {
            if excess == 0 {
                break;
            }
            if self.suspend(&pid)? {
                excess -= 1;
            }
        }
        if excess > 0 {
            tracing::warn!(
                excess,
                limit,
                "process limit exceeded, no discardable process left to suspend"
            );
        }
        Ok(())
    }

    /// 挂起；容器非 discardable 或未运行时为空操作，返回是否真正挂起
    pub fn suspend(&mut self, pid: &str) -> Result<bool, KernelError> {
        let container = self
            .processes
            .get_mut(pid)
            .ok_or_else(|| KernelError::ProcessNotFound(pid.to_string()))?;
        let suspended = container.suspend()?;
        if suspended {
            tracing::info!(pid = %pid, "process suspended");
            self.emit(RuntimeEvent::ProcessSuspended { pid: pid.to_string() });
        }
        Ok(suspended)
    }

    /// 从快照恢复；找不到协议或 tag 构造器时报 ConstructorNotFound
    pub fn resume(&mut self, pid: &str) -> Result<(), KernelError> {
        let container = self
            .processes
            .get(pid)
            .ok_or_else(|| KernelError::ProcessNotFound(pid.to_string()))?;
        if container.is_running() {
            return Ok(());
        }
        let kind = self
            .protocols
            .kind(container.source(), container.tag())
            .ok_or_else(|| KernelError::ConstructorNotFound {
                source_scheme: container.source().to_string(),
                tag: container.tag().to_string(),
            })?;
        let notifier = self.notifier(pid);
        if let Some(container) = self.processes.get_mut(pid) {
            container.resume_with(kind.as_ref(), notifier)?;
        }
        tracing::info!(pid = %pid, "process resumed");
        self.emit(RuntimeEvent::ProcessResumed { pid: pid.to_string() });
        self.enforce_limit(Some(pid))
    }

    /// 校验快照可被实例化：协议已注册、tag 有构造器、pid 未占用
    fn check_snapshot(&self, snapshot: &ProcessSnapshot) -> Result<(), KernelError> {
        let protocol = self
            .protocols
            .get(&snapshot.source)
            .ok_or_else(|| KernelError::UnregisteredProtocol(snapshot.source.clone()))?;
        let has_kind = protocol
            .process_kinds()
            .map(|kinds| kinds.get(&snapshot.tag).is_some())
            .unwrap_or(false);
        if !has_kind {
            return Err(KernelError::ConstructorNotFound {
                source_scheme: snapshot.source.clone(),
                tag: snapshot.tag.clone(),
            });
        }
        if self.processes.contains_key(&snapshot.pid) {
            return Err(KernelError::DuplicateProcess(snapshot.pid.clone()));
        }
        Ok(())
    }

    /// 将持久化快照重建为挂起态容器（不经过协议往返）
    pub fn instantiate(&mut self, mut snapshot: ProcessSnapshot) -> Result<Pid, KernelError> {
        snapshot.source = snapshot.source.to_ascii_lowercase();
        self.check_snapshot(&snapshot)?;
        let container = ProcessContainer::from_snapshot(snapshot);
        let pid = container.pid().to_string();
        self.add_process(container)?;
        tracing::info!(pid = %pid, "process instantiated from snapshot");
        Ok(pid)
    }

    /// 批量实例化：全部校验通过才写入，任一失败时进程表不变
    pub fn instantiate_all(
        &mut self,
        snapshots: Vec<ProcessSnapshot>,
    ) -> Result<Vec<Pid>, KernelError> {
        let mut seen = std::collections::HashSet::new();
        for snapshot in &snapshots {
            self.check_snapshot(snapshot)?;
            if !seen.insert(snapshot.pid.as_str()) {
                return Err(KernelError::DuplicateProcess(snapshot.pid.clone()));
            }
        }
        snapshots
            .into_iter()
            .map(|snapshot| self.instantiate(snapshot))
            .collect()
    }

    /// 显式关闭：卸载并移出进程表
    pub fn close(&mut self, pid: &str) -> Result<(), KernelError> {
        let mut container = self
            .processes
            .remove(pid)
            .ok_or_else(|| KernelError::ProcessNotFound(pid.to_string()))?;
        container.unmount();
        self.order.retain(|p| p != pid);
        tracing::info!(pid = %pid, "process closed");
        self.emit(RuntimeEvent::ProcessClosed { pid: pid.to_string() });
        Ok(())
    }

    pub fn get(&self, pid: &str) -> Option<&ProcessContainer> {
        self.processes.get(pid)
    }

    pub fn status(&self, pid: &str) -> Option<ProcessStatus> {
        self.processes.get(pid).map(|c| c.status())
    }

    /// 按插入顺序遍历容器
    pub fn containers(&self) -> impl Iterator<Item = &ProcessContainer> {
        self.order.iter().filter_map(|pid| self.processes.get(pid))
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn describe_processes(&self) -> ProcessDescriptions {
        self.containers()
            .map(|c| (c.pid().to_string(), c.describe()))
            .collect()
    }

    /// 导出全部快照，供宿主持久化
    pub fn snapshots(&self) -> Result<Vec<ProcessSnapshot>, KernelError> {
        self.containers().map(|c| c.serialize()).collect()
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

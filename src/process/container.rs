//! 进程容器
//!
//! 运行时持有的包装：分配 pid，记录状态，持有活实例（running）或快照（suspended），二者互斥。
//! 挂起时抓取快照、调用 unmount 并丢弃实例；恢复时由 tag 对应的 ProcessKind 重建实例并丢弃快照。

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::KernelError;
use crate::process::{Pid, Process, ProcessKind, ProcessNotifier};
use crate::resources::{ActionDefinition, Icon};

/// 容器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Running,
    Suspended,
}

/// 进程快照（持久化契约）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProcessSnapshot {
    pub pid: Pid,
    /// 所属协议 scheme
    pub source: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub icons: Vec<Icon>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub actions: BTreeMap<String, ActionDefinition>,
    /// 缺省为 true，兼容不带该字段的旧快照
    #[serde(default = "default_discardable")]
    pub discardable: bool,
    /// 进程内部状态（不透明）
    pub state: Value,
}

fn default_discardable() -> bool {
    true
}

enum Slot {
    Running(Box<dyn Process>),
    Suspended(ProcessSnapshot),
}

pub struct ProcessContainer {
    pid: Pid,
    source: String,
    tag: String,
    discardable: bool,
    slot: Slot,
}

fn new_pid() -> Pid {
    format!("proc_{}", uuid::Uuid::new_v4())
}

impl ProcessContainer {
    /// 包装协议刚返回的活实例
    pub fn new(source: impl Into<String>, process: Box<dyn Process>) -> Self {
        Self {
            pid: new_pid(),
            source: source.into(),
            tag: process.tag().to_string(),
            discardable: process.discardable(),
            slot: Slot::Running(process),
        }
    }

    /// 由持久化快照构建挂起态容器
    pub fn from_snapshot(snapshot: ProcessSnapshot) -> Self {
        Self {
            pid: snapshot.pid.clone(),
            source: snapshot.source.clone(),
            tag: snapshot.tag.clone(),
            discardable: snapshot.discardable,
            slot: Slot::Suspended(snapshot),
        }
    }

    pub fn pid(&self) -> &str {
        &self.pid
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn discardable(&self) -> bool {
        self.discardable
    }

    pub fn status(&self) -> ProcessStatus {
        match self.slot {
            Slot::Running(_) => ProcessStatus::Running,
            Slot::Suspended(_) => ProcessStatus::Suspended,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status() == ProcessStatus::Running
    }

    pub fn process(&self) -> Option<&dyn Process> {
        match &self.slot {
            Slot::Running(p) => Some(p.as_ref()),
            Slot::Suspended(_) => None,
        }
    }

    pub(crate) fn process_mut(&mut self) -> Option<&mut dyn Process> {
        match &mut self.slot {
            Slot::Running(p) => Some(p.as_mut()),
            Slot::Suspended(_) => None,
        }
    }

    pub fn title(&self) -> Option<String> {
        match &self.slot {
            Slot::Running(p) => p.title(),
            Slot::Suspended(s) => s.title.clone(),
        }
    }

    /// 当前描述；挂起态只给出元数据
    pub fn describe(&self) -> Value {
        match &self.slot {
            Slot::Running(p) => p.describe(),
            Slot::Suspended(s) => serde_json::json!({
                "pid": self.pid,
                "tag": self.tag,
                "title": s.title,
                "status": "suspended",
            }),
        }
    }

    /// 导出快照；运行态现场抓取
    pub fn serialize(&self) -> Result<ProcessSnapshot, KernelError> {
        match &self.slot {
            Slot::Running(p) => Ok(ProcessSnapshot {
                pid: self.pid.clone(),
                source: self.source.clone(),
                tag: self.tag.clone(),
                title: p.title(),
                icons: p.icons(),
                actions: p.actions(),
                discardable: p.discardable(),
                state: p.snapshot()?,
            }),
            Slot::Suspended(s) => Ok(s.clone()),
        }
    }

    pub(crate) fn mount(&mut self, notifier: ProcessNotifier) {
        if let Slot::Running(p) = &mut self.slot {
            p.mount(notifier);
        }
    }

    /// 挂起；非 discardable 或已挂起时为空操作，返回是否真正挂起
    pub(crate) fn suspend(&mut self) -> Result<bool, KernelError> {
        if !self.discardable || !self.is_running() {
            return Ok(false);
        }
        let snapshot = self.serialize()?;
        if let Slot::Running(mut p) = std::mem::replace(&mut self.slot, Slot::Suspended(snapshot)) {
            p.unmount();
        }
        Ok(true)
    }

    /// 用 kind 从快照重建实例并挂载；已运行时为空操作
    pub(crate) fn resume_with(
        &mut self,
        kind: &dyn ProcessKind,
        notifier: ProcessNotifier,
    ) -> Result<bool, KernelError> {
        let state = match &self.slot {
            Slot::Running(_) => return Ok(false),
            Slot::Suspended(s) => s.state.clone(),
        };
        let mut process = kind.resume(state)?;
        process.mount(notifier);
        self.discardable = process.discardable();
        self.slot = Slot::Running(process);
        Ok(true)
    }

    /// 关闭前卸载活实例
    pub(crate) fn unmount(&mut self) {
        if let Slot::Running(p) = &mut self.slot {
            p.unmount();
        }
    }
}

impl std::fmt::Debug for ProcessContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessContainer")
            .field("pid", &self.pid)
            .field("source", &self.source)
            .field("tag", &self.tag)
            .field("status", &self.status())
            .field("discardable", &self.discardable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::notes::{Note, NoteKind};
    use tokio::sync::broadcast;

    fn notifier(pid: &str) -> ProcessNotifier {
        let (tx, _) = broadcast::channel(8);
        ProcessNotifier::new(pid.to_string(), tx)
    }

    #[test]
    fn test_suspend_then_resume_keeps_description() {
        let mut note = Note::new("Groceries");
        note.append("milk");
        let mut c = ProcessContainer::new("notes", Box::new(note));
        let before = c.describe();

        assert!(c.suspend().unwrap());
        assert_eq!(c.status(), ProcessStatus::Suspended);
        assert!(c.process().is_none());

        assert!(c.resume_with(&NoteKind, notifier(c.pid())).unwrap());
        assert_eq!(c.status(), ProcessStatus::Running);
        assert_eq!(c.describe(), before);
    }

    #[test]
    fn test_pinned_process_is_not_suspended() {
        let mut c = ProcessContainer::new("notes", Box::new(Note::new("Keep").pinned()));
        assert!(!c.discardable());
        assert!(!c.suspend().unwrap());
        assert_eq!(c.status(), ProcessStatus::Running);
    }

    #[test]
    fn test_serialize_running_container() {
        let c = ProcessContainer::new("notes", Box::new(Note::new("Todo")));
        let snap = c.serialize().unwrap();
        assert_eq!(snap.pid, c.pid());
        assert_eq!(snap.source, "notes");
        assert_eq!(snap.tag, "note");
        assert_eq!(snap.title.as_deref(), Some("Todo"));
        assert!(snap.actions.contains_key("append"));
    }

    #[test]
    fn test_from_snapshot_is_suspended() {
        let snap = ProcessContainer::new("notes", Box::new(Note::new("A")))
            .serialize()
            .unwrap();
        let c = ProcessContainer::from_snapshot(snap.clone());
        assert_eq!(c.pid(), snap.pid);
        assert_eq!(c.status(), ProcessStatus::Suspended);
        assert_eq!(c.describe()["status"], "suspended");
    }

    #[test]
    fn test_pinned_snapshot_stays_pinned() {
        let snap = ProcessContainer::new("notes", Box::new(Note::new("Keep").pinned()))
            .serialize()
            .unwrap();
        assert!(!snap.discardable);
        let mut c = ProcessContainer::from_snapshot(snap);
        assert!(!c.discardable());
        assert!(c.resume_with(&NoteKind, notifier(c.pid())).unwrap());
        assert!(!c.suspend().unwrap());
    }

    #[test]
    fn test_snapshot_without_discardable_defaults_true() {
        let snap: ProcessSnapshot = serde_json::from_value(serde_json::json!({
            "pid": "proc_old",
            "source": "notes",
            "tag": "note",
            "state": { "title": "legacy" }
        }))
        .unwrap();
        assert!(snap.discardable);
        assert!(ProcessContainer::from_snapshot(snap).discardable());
    }
}

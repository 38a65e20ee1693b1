//! Notes 协议：`open` 动作创建可编辑的笔记进程，`append` 按 pid 向已打开的笔记追加一行
//!
//! 笔记是最简单的有状态进程：标题 + 行列表，可挂起为快照并按 tag `note` 恢复。
//! pinned 笔记不可在容量压力下被挂起。

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::KernelError;
use crate::process::{Process, ProcessKind, ProcessKinds, ProcessNotifier};
use crate::protocols::{ActionOutput, ActionProposal, Protocol};
use crate::resources::{ActionDefinition, DisplayMode, Resource};

pub const NOTE_TAG: &str = "note";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct NoteState {
    title: String,
    #[serde(default)]
    lines: Vec<String>,
    #[serde(default)]
    pinned: bool,
}

/// 笔记进程
pub struct Note {
    state: NoteState,
    notifier: Option<ProcessNotifier>,
}

impl Note {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            state: NoteState {
                title: title.into(),
                ..NoteState::default()
            },
            notifier: None,
        }
    }

    pub fn pinned(mut self) -> Self {
        self.state.pinned = true;
        self
    }

    /// 追加一行并通知所属容器
    pub fn append(&mut self, line: impl Into<String>) {
        self.state.lines.push(line.into());
        if let Some(n) = &self.notifier {
            n.notify_changed();
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.notifier.is_some()
    }
}

impl Process for Note {
    fn tag(&self) -> &str {
        NOTE_TAG
    }

    fn title(&self) -> Option<String> {
        Some(self.state.title.clone())
    }

    fn actions(&self) -> BTreeMap<String, ActionDefinition> {
        let mut actions = BTreeMap::new();
        actions.insert(
            "append".to_string(),
            ActionDefinition::new("Append a line to the note").with_params(json!({
                "type": "object",
                "properties": { "line": { "type": "string" } },
                "required": ["line"]
            })),
        );
        actions
    }

    fn discardable(&self) -> bool {
        !self.state.pinned
    }

    fn handle_action(&mut self, action_id: &str, args: &Value) -> Result<Value, KernelError> {
        match action_id {
            "append" => {
                let line = str_arg(args, "line")?;
                self.append(line);
                Ok(self.describe())
            }
            other => Err(KernelError::ActionFailed(format!(
                "note: unknown action '{}'",
                other
            ))),
        }
    }

    fn describe(&self) -> Value {
        json!({
            "title": self.state.title,
            "lines": self.state.lines,
        })
    }

    fn snapshot(&self) -> Result<Value, KernelError> {
        serde_json::to_value(&self.state).map_err(|e| KernelError::Snapshot(e.to_string()))
    }

    fn mount(&mut self, notifier: ProcessNotifier) {
        self.notifier = Some(notifier);
    }

    fn unmount(&mut self) {
        self.notifier = None;
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Result<&'a str, KernelError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| KernelError::ActionFailed(format!("notes: missing string argument '{}'", key)))
}

/// `note` 的恢复工厂
pub struct NoteKind;

impl ProcessKind for NoteKind {
    fn tag(&self) -> &str {
        NOTE_TAG
    }

    fn resume(&self, state: Value) -> Result<Box<dyn Process>, KernelError> {
        let state: NoteState =
            serde_json::from_value(state).map_err(|e| KernelError::Snapshot(e.to_string()))?;
        Ok(Box::new(Note {
            state,
            notifier: None,
        }))
    }
}

pub struct NotesProtocol {
    kinds: ProcessKinds,
}

impl NotesProtocol {
    pub fn new() -> Self {
        Self {
            kinds: ProcessKinds::new().with(NoteKind),
        }
    }

    /// 与本协议配套的资源描述
    pub fn resource() -> Resource {
        Resource::new("notes://local", "notes")
            .with_name("Notes")
            .with_action(
                "open",
                ActionDefinition::new("Open a new note with a title and optional initial lines")
                    .with_params(json!({
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "lines": { "type": "array", "items": { "type": "string" } },
                            "pinned": { "type": "boolean" }
                        },
                        "required": ["title"]
                    }))
                    .with_display(DisplayMode::Panel),
            )
            .with_action(
                "append",
                ActionDefinition::new("Append a line to an open note, addressed by its pid")
                    .with_params(json!({
                        "type": "object",
                        "properties": {
                            "pid": { "type": "string" },
                            "line": { "type": "string" }
                        },
                        "required": ["pid", "line"]
                    }))
                    .with_display(DisplayMode::Inline),
            )
    }
}

impl Default for NotesProtocol {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Protocol for NotesProtocol {
    fn schemes(&self) -> Vec<String> {
        vec!["notes".to_string()]
    }

    async fn handle_action(&self, proposal: &ActionProposal) -> Result<ActionOutput, KernelError> {
        match proposal.action_id.as_str() {
            "open" => {
                let title = proposal
                    .args
                    .get("title")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Untitled");
                let mut note = Note::new(title);
                if proposal.args.get("pinned").and_then(|v| v.as_bool()) == Some(true) {
                    note = note.pinned();
                }
                if let Some(lines) = proposal.args.get("lines").and_then(|v| v.as_array()) {
                    for line in lines.iter().filter_map(|l| l.as_str()) {
                        note.append(line);
                    }
                }
                Ok(ActionOutput::Process(Box::new(note)))
            }
            "append" => Ok(ActionOutput::Invoke {
                pid: str_arg(&proposal.args, "pid")?.to_string(),
                action_id: "append".to_string(),
                args: json!({ "line": str_arg(&proposal.args, "line")? }),
            }),
            other => Err(KernelError::ActionFailed(format!(
                "notes: unknown action '{}'",
                other
            ))),
        }
    }

    fn process_kinds(&self) -> Option<&ProcessKinds> {
        Some(&self.kinds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::RuntimeEvent;
    use tokio::sync::broadcast;

    #[test]
    fn test_append_notifies_when_mounted() {
        let (tx, mut rx) = broadcast::channel(8);
        let mut note = Note::new("Log");
        note.append("before mount");
        assert!(rx.try_recv().is_err());

        note.mount(ProcessNotifier::new("proc_1".into(), tx));
        note.append("after mount");
        assert_eq!(
            rx.try_recv().unwrap(),
            RuntimeEvent::ProcessChanged { pid: "proc_1".into() }
        );

        note.unmount();
        assert!(!note.is_mounted());
        note.append("after unmount");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_kind_restores_state() {
        let mut note = Note::new("Plan").pinned();
        note.append("step 1");
        let restored = NoteKind.resume(note.snapshot().unwrap()).unwrap();
        assert_eq!(restored.describe(), note.describe());
        assert!(!restored.discardable());
    }

    #[test]
    fn test_kind_rejects_garbage() {
        assert!(matches!(
            NoteKind.resume(json!("not a note")),
            Err(KernelError::Snapshot(_))
        ));
    }

    #[test]
    fn test_note_handles_append() {
        let mut note = Note::new("Todo");
        let desc = note.handle_action("append", &json!({ "line": "call mom" })).unwrap();
        assert_eq!(desc["lines"], json!(["call mom"]));
        assert!(matches!(
            note.handle_action("append", &json!({})),
            Err(KernelError::ActionFailed(_))
        ));
        assert!(matches!(
            note.handle_action("erase", &json!({})),
            Err(KernelError::ActionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_append_forwards_to_process() {
        let p = ActionProposal::new(
            "notes://local",
            "append",
            json!({ "pid": "proc_1", "line": "eggs" }),
            DisplayMode::Inline,
        );
        match NotesProtocol::new().handle_action(&p).await.unwrap() {
            ActionOutput::Invoke {
                pid,
                action_id,
                args,
            } => {
                assert_eq!(pid, "proc_1");
                assert_eq!(action_id, "append");
                assert_eq!(args, json!({ "line": "eggs" }));
            }
            _ => panic!("expected invoke"),
        }
    }

    #[tokio::test]
    async fn test_open_builds_note() {
        let protocol = NotesProtocol::new();
        let p = ActionProposal::new(
            "notes://local",
            "open",
            json!({ "title": "Shopping", "lines": ["eggs", "tea"] }),
            DisplayMode::Panel,
        );
        let ActionOutput::Process(process) = protocol.handle_action(&p).await.unwrap() else {
            panic!("expected a process");
        };
        assert_eq!(process.tag(), NOTE_TAG);
        assert_eq!(process.describe()["lines"], json!(["eggs", "tea"]));
    }
}

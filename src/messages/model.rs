//! 模型消息：把消息日志折叠为 LLM 可消费的消息序列
//!
//! to_model_messages 是纯函数：保持顺序、无副作用，对同一日志重复调用输出完全相同。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::messages::{Attachment, Message, MessageBody};
use crate::process::ProcessDescriptions;
use crate::resources::ActionHandle;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 多模态内容片段
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Image {
        media_type: String,
        data: Vec<u8>,
    },
    /// 无法解读的文件：原样携带字节
    File {
        filename: String,
        media_type: String,
        data: Vec<u8>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// 发送给模型的单条消息
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: Role,
    pub content: ModelContent,
}

impl ModelMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: ModelContent::Text(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: ModelContent::Text(content.into()),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: ModelContent::Text(content.into()),
        }
    }

    /// 纯文本内容（多模态消息返回 None）
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            ModelContent::Text(t) => Some(t),
            ModelContent::Parts(_) => None,
        }
    }
}

fn is_textual(media_type: &str) -> bool {
    let mt = media_type.to_ascii_lowercase();
    mt.starts_with("text/") || mt == "application/json" || mt.ends_with("+json")
}

fn file_part(file: &Attachment) -> ContentPart {
    if is_textual(&file.media_type) {
        ContentPart::Text {
            text: String::from_utf8_lossy(&file.data).into_owned(),
        }
    } else if file.media_type.to_ascii_lowercase().starts_with("image/") {
        ContentPart::Image {
            media_type: file.media_type.clone(),
            data: file.data.clone(),
        }
    } else {
        ContentPart::File {
            filename: file.name.clone(),
            media_type: file.media_type.clone(),
            data: file.data.clone(),
        }
    }
}

/// 动作消息的合成文本：调用的句柄 + 进程描述或原始结果
fn action_text(
    uri: &str,
    action_id: &str,
    process: Option<&str>,
    content: Option<&Value>,
    processes: &ProcessDescriptions,
) -> String {
    let handle = ActionHandle::new(uri, action_id).encode();
    let result = match process {
        Some(pid) => processes
            .get(pid)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({ "pid": pid, "status": "closed" })),
        None => content.cloned().unwrap_or(Value::Null),
    };
    format!(
        "Invoked action {}. Result: {}",
        handle,
        serde_json::to_string(&result).unwrap_or_default()
    )
}

/// 将消息日志折叠为模型消息序列
pub fn to_model_messages(log: &[Message], processes: &ProcessDescriptions) -> Vec<ModelMessage> {
    let mut out = Vec::with_capacity(log.len());
    for msg in log {
        match msg.body() {
            MessageBody::Input { text, files } => {
                if let Some(t) = text.as_deref().filter(|t| !t.trim().is_empty()) {
                    out.push(ModelMessage::user(t));
                }
                if !files.is_empty() {
                    out.push(ModelMessage {
                        role: Role::User,
                        content: ModelContent::Parts(files.iter().map(file_part).collect()),
                    });
                }
            }
            MessageBody::Response { text } => out.push(ModelMessage::assistant(text.clone())),
            MessageBody::Action {
                uri,
                action_id,
                process,
                content,
                ..
            } => out.push(ModelMessage::assistant(action_text(
                uri,
                action_id,
                process.as_deref(),
                content.as_ref(),
                processes,
            ))),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_text_input() {
        let log = vec![Message::user_text("hi")];
        let out = to_model_messages(&log, &ProcessDescriptions::new());
        assert_eq!(out, vec![ModelMessage::user("hi")]);
    }

    #[test]
    fn test_blank_text_is_skipped() {
        let log = vec![Message::input(Some("   ".into()), Vec::new())];
        assert!(to_model_messages(&log, &ProcessDescriptions::new()).is_empty());
    }

    #[test]
    fn test_image_bytes_preserved() {
        let bytes = vec![0x89, b'P', b'N', b'G', 0, 1, 2];
        let log = vec![Message::input(
            None,
            vec![Attachment::new("a.png", "image/png", bytes.clone())],
        )];
        let out = to_model_messages(&log, &ProcessDescriptions::new());
        assert_eq!(out.len(), 1);
        match &out[0].content {
            ModelContent::Parts(parts) => {
                assert_eq!(
                    parts,
                    &vec![ContentPart::Image {
                        media_type: "image/png".into(),
                        data: bytes
                    }]
                );
            }
            other => panic!("expected parts, got {:?}", other),
        }
    }

    #[test]
    fn test_file_kinds() {
        let log = vec![Message::input(
            Some("see attached".into()),
            vec![
                Attachment::new("a.json", "application/json", b"{\"a\":1}".to_vec()),
                Attachment::new("b.bin", "application/octet-stream", vec![1, 2, 3]),
            ],
        )];
        let out = to_model_messages(&log, &ProcessDescriptions::new());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text(), Some("see attached"));
        let ModelContent::Parts(parts) = &out[1].content else {
            panic!("expected parts");
        };
        assert_eq!(parts[0], ContentPart::Text { text: "{\"a\":1}".into() });
        assert!(matches!(&parts[1], ContentPart::File { filename, .. } if filename == "b.bin"));
    }

    #[test]
    fn test_action_uses_process_description() {
        let input = Message::user_text("open notes");
        let action = Message::action(
            input.id(),
            "notes://local",
            "open",
            json!({}),
            Some("proc_1".into()),
            None,
        );
        let mut procs = ProcessDescriptions::new();
        procs.insert("proc_1".into(), json!({"title": "Notes"}));
        let out = to_model_messages(&[input, action], &procs);
        assert_eq!(out[1].role, Role::Assistant);
        assert_eq!(
            out[1].text(),
            Some("Invoked action notes://local->open. Result: {\"title\":\"Notes\"}")
        );
    }

    #[test]
    fn test_fold_is_deterministic() {
        let input = Message::user_text("hi");
        let log = vec![
            input.clone(),
            Message::action(input.id(), "echo://x", "say", json!({}), None, Some(json!({"b": 1, "a": 2}))),
            Message::response(input.id(), "done"),
        ];
        let procs = ProcessDescriptions::new();
        let a = serde_json::to_string(&to_model_messages(&log, &procs)).unwrap();
        let b = serde_json::to_string(&to_model_messages(&log, &procs)).unwrap();
        assert_eq!(a, b);
    }
}

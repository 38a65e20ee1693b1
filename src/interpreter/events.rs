//! 回合产出：交给调用方的响应，以及直接回复生成时的流式事件

use serde::Serialize;

use crate::protocols::ActionProposal;

/// 回合中产出的单个响应（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// 直接回复用户的文本
    Direct { text: String },
    /// 需要调用方分发的动作
    ActionProposal { proposal: ActionProposal },
    /// 模型的中间思考（可观测性）
    Thought { text: String },
    /// 引擎日志
    Log { text: String },
}

impl Response {
    pub fn direct_text(&self) -> Option<&str> {
        match self {
            Response::Direct { text } => Some(text),
            _ => None,
        }
    }

    pub fn proposal(&self) -> Option<&ActionProposal> {
        match self {
            Response::ActionProposal { proposal } => Some(proposal),
            _ => None,
        }
    }
}

/// 直接回复的流式片段
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Chunk {
        correlation_id: Option<String>,
        text: String,
    },
    Done {
        correlation_id: Option<String>,
    },
}

//! 消息日志：只追加
//!
//! 顺序即追加顺序（因果序，而非时间戳序）。

use serde::{Deserialize, Serialize};

use crate::messages::Message;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn extend(&mut self, msgs: impl IntoIterator<Item = Message>) {
        self.messages.extend(msgs);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// 某一轮（同一 correlation_id）的全部消息，按追加顺序
    pub fn turn<'a>(&'a self, correlation_id: &'a str) -> impl Iterator<Item = &'a Message> + 'a {
        self.messages
            .iter()
            .filter(move |m| m.correlation_id() == correlation_id)
    }

    pub fn last_input(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_input())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl From<Vec<Message>> for MessageLog {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

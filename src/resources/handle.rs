//! 动作句柄：`<resourceURI>->actionId`
//!
//! 暴露给模型的线格式。解码按第一个 `->` 切分，任一侧为空即非法；不校验 scheme 是否已注册。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::KernelError;

pub const HANDLE_SEPARATOR: &str = "->";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionHandle {
    pub uri: String,
    pub action_id: String,
}

impl ActionHandle {
    pub fn new(uri: impl Into<String>, action_id: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            action_id: action_id.into(),
        }
    }

    pub fn encode(&self) -> String {
        encode(&self.uri, &self.action_id)
    }

    pub fn decode(handle: &str) -> Result<Self, KernelError> {
        decode(handle)
    }
}

pub fn encode(uri: &str, action_id: &str) -> String {
    format!("{}{}{}", uri, HANDLE_SEPARATOR, action_id)
}

pub fn decode(handle: &str) -> Result<ActionHandle, KernelError> {
    let (uri, action_id) = handle
        .split_once(HANDLE_SEPARATOR)
        .ok_or_else(|| KernelError::InvalidActionHandle(handle.to_string()))?;
    if uri.is_empty() || action_id.is_empty() {
        return Err(KernelError::InvalidActionHandle(handle.to_string()));
    }
    Ok(ActionHandle::new(uri, action_id))
}

impl fmt::Display for ActionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.uri, HANDLE_SEPARATOR, self.action_id)
    }
}

impl FromStr for ActionHandle {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let cases = [
            ("echo://local", "say"),
            ("https://api.example.com/v1?q=a", "fetch"),
            ("notes://local", "append->line"),
        ];
        for (uri, id) in cases {
            let h = decode(&encode(uri, id)).unwrap();
            assert_eq!((h.uri.as_str(), h.action_id.as_str()), (uri, id));
        }
    }

    #[test]
    fn test_splits_on_first_separator() {
        let h: ActionHandle = "a://b->c->d".parse().unwrap();
        assert_eq!(h.uri, "a://b");
        assert_eq!(h.action_id, "c->d");
    }

    #[test]
    fn test_malformed_handles() {
        for bad in ["malformed", "->say", "echo://local->", "->", ""] {
            assert!(
                matches!(decode(bad), Err(KernelError::InvalidActionHandle(_))),
                "expected failure for {bad:?}"
            );
        }
    }
}

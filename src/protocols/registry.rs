//! 协议注册表：scheme -> 协议
//!
//! 每个 scheme 只属于一个协议；`process` 为保留 scheme，任何注册请求中出现即整体拒绝。

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::KernelError;
use crate::process::ProcessKind;
use crate::protocols::{Protocol, PROCESS_SCHEME};

#[derive(Default, Clone)]
pub struct ProtocolRegistry {
    protocols: HashMap<String, Arc<dyn Protocol>>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册协议声明的全部 scheme；先整体校验，再写入
    pub fn register(&mut self, protocol: Arc<dyn Protocol>) -> Result<(), KernelError> {
        let schemes: Vec<String> = protocol
            .schemes()
            .into_iter()
            .map(|s| s.to_ascii_lowercase())
            .collect();
        if schemes.iter().any(|s| s == PROCESS_SCHEME) {
            return Err(KernelError::ReservedScheme(PROCESS_SCHEME.to_string()));
        }
        for scheme in schemes {
            if self.protocols.contains_key(&scheme) {
                tracing::warn!(scheme = %scheme, "protocol scheme re-registered, replacing owner");
            }
            tracing::info!(scheme = %scheme, "protocol registered");
            self.protocols.insert(scheme, Arc::clone(&protocol));
        }
        Ok(())
    }

    /// 移除 scheme；不存在时忽略
    pub fn deregister(&mut self, schemes: &[&str]) {
        for scheme in schemes {
            if self.protocols.remove(&scheme.to_ascii_lowercase()).is_some() {
                tracing::info!(scheme = %scheme, "protocol deregistered");
            }
        }
    }

    /// 查找时 scheme 不区分大小写
    pub fn get(&self, scheme: &str) -> Option<Arc<dyn Protocol>> {
        self.protocols.get(&scheme.to_ascii_lowercase()).cloned()
    }

    /// 按来源 scheme 与 tag 查找进程构造器
    pub fn kind(&self, scheme: &str, tag: &str) -> Option<Arc<dyn ProcessKind>> {
        self.protocols
            .get(&scheme.to_ascii_lowercase())
            .and_then(|p| p.process_kinds().and_then(|kinds| kinds.get(tag)))
    }

    pub fn schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self.protocols.keys().cloned().collect();
        schemes.sort();
        schemes
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.protocols.contains_key(&scheme.to_ascii_lowercase())
    }
}

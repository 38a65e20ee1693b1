//! 内核配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__RUNTIME__PROCESS_LIMIT=10`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::interpreter::{InterpreterConfig, DEFAULT_SYSTEM_PROMPT};
use crate::process::{RuntimeConfig, DEFAULT_PROCESS_LIMIT};
use crate::resources::Resource;

/// 配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct KernelConfig {
    pub app: AppSection,
    pub runtime: RuntimeSection,
    pub interpreter: InterpreterSection,
    pub llm: LlmSection,
    /// 外部提供的资源描述
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [runtime] 段：同时运行的进程上限
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeSection {
    #[serde(default = "default_process_limit")]
    pub process_limit: usize,
    /// true 时不限制（忽略 process_limit）
    #[serde(default)]
    pub unbounded: bool,
}

fn default_process_limit() -> usize {
    DEFAULT_PROCESS_LIMIT
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            process_limit: DEFAULT_PROCESS_LIMIT,
            unbounded: false,
        }
    }
}

/// [interpreter] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct InterpreterSection {
    /// 运营方提示
    pub hint: Option<String>,
    /// 覆盖默认 system 前言
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub emit_logs: bool,
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// openai / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

impl KernelConfig {
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            process_limit: (!self.runtime.unbounded).then_some(self.runtime.process_limit),
        }
    }

    pub fn interpreter_config(&self) -> InterpreterConfig {
        InterpreterConfig {
            system_prompt: self
                .interpreter
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            hint: self.interpreter.hint.clone(),
            emit_logs: self.interpreter.emit_logs,
        }
    }
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<KernelConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default", "default"] {
        if std::path::Path::new(&format!("{}.toml", name)).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

/// 重新从磁盘与环境变量加载配置；调用方决定是否用新资源调用 update_resources
pub fn reload_config() -> Result<KernelConfig, config::ConfigError> {
    load_config(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = KernelConfig::default();
        assert_eq!(cfg.runtime_config().process_limit, Some(DEFAULT_PROCESS_LIMIT));
        assert_eq!(cfg.llm.timeouts.request, 60);
        assert!(cfg.resources.is_empty());
        assert_eq!(cfg.interpreter_config().system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_unbounded_runtime() {
        let mut cfg = KernelConfig::default();
        cfg.runtime.unbounded = true;
        assert_eq!(cfg.runtime_config().process_limit, None);
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[runtime]
process_limit = 3

[interpreter]
hint = "prefer notes"

[llm]
provider = "mock"

[[resources]]
uri = "echo://local"
protocol = "echo"

[resources.actions.say]
description = "Echo text"
display = "inline"
"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.runtime.process_limit, 3);
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.interpreter_config().hint.as_deref(), Some("prefer notes"));
        assert!(cfg
            .resources
            .iter()
            .any(|r| r.uri == "echo://local" && r.actions.contains_key("say")));
    }
}

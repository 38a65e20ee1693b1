//! 内核错误类型
//!
//! 注册表 / 运行时错误属于配置或编程错误，同步返回、不重试；
//! 模型调用失败（网络、结构化输出不合法）原样抛给 Interpreter 的调用方；
//! 协议处理器的错误不包装、不重试，只有处理器自己知道副作用能否重放。

use thiserror::Error;

use crate::llm::LlmError;

/// 内核运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum KernelError {
    /// 外部协议试图注册保留的 `process` scheme
    #[error("Reserved scheme: {0}")]
    ReservedScheme(String),

    #[error("Unregistered protocol: {0}")]
    UnregisteredProtocol(String),

    /// 动作句柄格式错误，或不在当前 ActionDict 中
    #[error("Invalid action handle: {0}")]
    InvalidActionHandle(String),

    /// 恢复 / 实例化时找不到 tag 对应的进程构造器
    #[error("Process constructor not found: {source_scheme}/{tag}")]
    ConstructorNotFound { source_scheme: String, tag: String },

    /// 结构化输出无法解析或不符合 schema
    #[error("Model output does not match schema: {0}")]
    ModelSchema(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Duplicate process: {0}")]
    DuplicateProcess(String),

    /// 协议处理器返回的失败，原样透传
    #[error("Action failed: {0}")]
    ActionFailed(String),

    /// 进程状态序列化 / 反序列化失败
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Config error: {0}")]
    Config(String),

    /// 进行中的回合被调用方取消
    #[error("Turn cancelled")]
    Cancelled,

    /// 内核 actor 已退出
    #[error("Kernel has shut down")]
    Shutdown,
}

impl From<config::ConfigError> for KernelError {
    fn from(e: config::ConfigError) -> Self {
        KernelError::Config(e.to_string())
    }
}

//! Hive - 对话式智能体内核
//!
//! 模块划分：
//! - **config**: 内核配置加载（TOML + 环境变量）
//! - **core**: 错误类型、会话驱动循环、内核 actor
//! - **interpreter**: 策略引擎（TEXT / RESEARCH）与可恢复的回合步进机
//! - **llm**: LLM 客户端抽象、结构化输出与实现（OpenAI 兼容 / Mock）
//! - **messages**: 对话消息、只追加日志、模型消息折叠
//! - **observability**: 日志初始化
//! - **process**: 进程抽象、容器与容量受限的运行时
//! - **protocols**: 协议 trait、scheme 注册表、内置协议
//! - **resources**: 资源描述、动作句柄与 ActionDict

pub mod config;
pub mod core;
pub mod interpreter;
pub mod llm;
pub mod messages;
pub mod observability;
pub mod process;
pub mod protocols;
pub mod resources;

pub use crate::core::{spawn_kernel, KernelError, KernelHandle, Session};
pub use crate::interpreter::{Interpreter, Response};

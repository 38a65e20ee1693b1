//! 核心层：错误类型、会话驱动循环、单一所有者的内核 actor

pub mod error;
pub mod orchestrator;
pub mod session;

pub use error::KernelError;
pub use orchestrator::{spawn_kernel, Command, KernelHandle};
pub use session::Session;

//! 协议层：协议 trait、scheme 注册表、内置协议（echo / notes）

pub mod echo;
pub mod notes;
pub mod protocol;
pub mod registry;

pub use echo::EchoProtocol;
pub use notes::NotesProtocol;
pub use protocol::{
    scheme_of, ActionOutcome, ActionOutput, ActionProposal, ActionResult, Protocol,
    PROCESS_SCHEME,
};
pub use registry::ProtocolRegistry;

use std::sync::Arc;

/// 内置协议（echo / notes）
pub fn builtin_protocols() -> Vec<Arc<dyn Protocol>> {
    vec![Arc::new(EchoProtocol), Arc::new(NotesProtocol::new())]
}

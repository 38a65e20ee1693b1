//! 资源层：资源描述、动作句柄编解码、ActionDict 注册表

pub mod handle;
pub mod registry;
pub mod resource;

pub use handle::{decode, encode, ActionHandle, HANDLE_SEPARATOR};
pub use registry::{build_action_dict, ActionDict, ResourceRegistry};
pub use resource::{ActionDefinition, DisplayMode, Icon, Resource};

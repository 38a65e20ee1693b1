//! 进程层：进程抽象、容器、容量受限的运行时、快照 Schema

pub mod container;
pub mod process;
pub mod runtime;
pub mod schema;

pub use container::{ProcessContainer, ProcessSnapshot, ProcessStatus};
pub use process::{
    Pid, Process, ProcessDescriptions, ProcessKind, ProcessKinds, ProcessNotifier, RuntimeEvent,
};
pub use runtime::{Runtime, RuntimeConfig, DEFAULT_PROCESS_LIMIT};
pub use schema::snapshot_schema_json;

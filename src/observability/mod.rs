//! 可观测性：tracing 订阅器与运行时事件日志

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::process::RuntimeEvent;

/// 安装全局订阅器；默认 info，可通过 RUST_LOG 覆盖。日志写 stderr，不干扰 REPL 输出。
/// 重复调用时保留已安装的订阅器。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// 把运行时事件写成 debug 日志，直到发送端全部关闭；返回记录的事件数。
/// 接收端落后时跳过丢失的事件继续消费。
pub async fn log_runtime_events(mut events: broadcast::Receiver<RuntimeEvent>) -> usize {
    let mut logged = 0;
    loop {
        match events.recv().await {
            Ok(event) => {
                tracing::debug!(event = ?event, "runtime event");
                logged += 1;
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "runtime event logger lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
    logged
}

//! 内核 actor：单一所有者串行处理命令
//!
//! spawn_kernel 把 Session 移入后台任务，调用方通过 KernelHandle 发送 Command，结果经 oneshot 返回。
//! 同一时刻只有一条命令在执行，因此不会出现同一 pid 上重入的挂起 / 恢复。
//! 进行中的 Submit 可以用其 CancellationToken 取消：actor 停止推进该回合并回复 Cancelled。

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::{KernelError, Session};
use crate::interpreter::Response;
use crate::messages::Attachment;
use crate::process::{Pid, ProcessDescriptions, ProcessSnapshot};
use crate::resources::Resource;

type Reply<T> = oneshot::Sender<Result<T, KernelError>>;

/// 发往内核 actor 的命令
pub enum Command {
    /// 提交用户输入，运行一个完整回合
    Submit {
        text: Option<String>,
        files: Vec<Attachment>,
        cancel: CancellationToken,
        reply: Reply<Vec<Response>>,
    },
    Suspend { pid: Pid, reply: Reply<bool> },
    Resume { pid: Pid, reply: Reply<()> },
    Close { pid: Pid, reply: Reply<()> },
    /// 替换资源集合
    UpdateResources {
        resources: Vec<Resource>,
        reply: Reply<()>,
    },
    /// 当前进程描述
    Describe { reply: Reply<ProcessDescriptions> },
    /// 导出全部进程快照
    Snapshots { reply: Reply<Vec<ProcessSnapshot>> },
    /// 退出 actor
    Quit,
}

/// 内核 actor 的句柄（可克隆，跨线程共享）
#[derive(Clone)]
pub struct KernelHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl KernelHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, KernelError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).map_err(|_| KernelError::Shutdown)?;
        rx.await.map_err(|_| KernelError::Shutdown)?
    }

    pub async fn submit(&self, text: impl Into<String>) -> Result<Vec<Response>, KernelError> {
        self.submit_with(Some(text.into()), Vec::new(), CancellationToken::new())
            .await
    }

    /// 带附件与取消令牌的提交
    pub async fn submit_with(
        &self,
        text: Option<String>,
        files: Vec<Attachment>,
        cancel: CancellationToken,
    ) -> Result<Vec<Response>, KernelError> {
        self.request(|reply| Command::Submit {
            text,
            files,
            cancel,
            reply,
        })
        .await
    }

    pub async fn suspend(&self, pid: impl Into<Pid>) -> Result<bool, KernelError> {
        let pid = pid.into();
        self.request(|reply| Command::Suspend { pid, reply }).await
    }

    pub async fn resume(&self, pid: impl Into<Pid>) -> Result<(), KernelError> {
        let pid = pid.into();
        self.request(|reply| Command::Resume { pid, reply }).await
    }

    pub async fn close(&self, pid: impl Into<Pid>) -> Result<(), KernelError> {
        let pid = pid.into();
        self.request(|reply| Command::Close { pid, reply }).await
    }

    pub async fn update_resources(&self, resources: Vec<Resource>) -> Result<(), KernelError> {
        self.request(|reply| Command::UpdateResources { resources, reply })
            .await
    }

    pub async fn describe_processes(&self) -> Result<ProcessDescriptions, KernelError> {
        self.request(|reply| Command::Describe { reply }).await
    }

    pub async fn snapshots(&self) -> Result<Vec<ProcessSnapshot>, KernelError> {
        self.request(|reply| Command::Snapshots { reply }).await
    }

    /// 请求退出；actor 处理完当前命令后结束
    pub fn quit(&self) {
        let _ = self.tx.send(Command::Quit);
    }
}

/// 启动内核 actor；JoinHandle 在退出时交还 Session
pub fn spawn_kernel(session: Session) -> (KernelHandle, JoinHandle<Session>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Command>();

    let join = tokio::spawn(async move {
        let mut session = session;
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Submit {
                    text,
                    files,
                    cancel,
                    reply,
                } => {
                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            tracing::info!("turn cancelled");
                            Err(KernelError::Cancelled)
                        }
                        r = session.handle_input(text, files) => r,
                    };
                    if let Err(e) = &result {
                        tracing::warn!("turn failed: {}", e);
                    }
                    let _ = reply.send(result);
                }
                Command::Suspend { pid, reply } => {
                    let _ = reply.send(session.runtime_mut().suspend(&pid));
                }
                Command::Resume { pid, reply } => {
                    let _ = reply.send(session.runtime_mut().resume(&pid));
                }
                Command::Close { pid, reply } => {
                    let _ = reply.send(session.runtime_mut().close(&pid));
                }
                Command::UpdateResources { resources, reply } => {
                    session.update_resources(resources);
                    let _ = reply.send(Ok(()));
                }
                Command::Describe { reply } => {
                    let _ = reply.send(Ok(session.runtime().describe_processes()));
                }
                Command::Snapshots { reply } => {
                    let _ = reply.send(session.runtime().snapshots());
                }
                Command::Quit => break,
            }
        }
        tracing::info!("kernel actor stopped");
        session
    });

    (KernelHandle { tx }, join)
}

//! 会话：消息日志 + 策略引擎 + 进程运行时
//!
//! handle_input 是一个完整回合的驱动循环：追加输入消息，逐步 resume 回合；
//! 遇到动作提案就经 Runtime 分发，把动作消息写入日志并把新历史传回回合；直接回复写入日志。
//! 回合失败时日志只保留失败前已追加的消息。

use std::sync::Arc;

use crate::config::KernelConfig;
use crate::core::KernelError;
use crate::interpreter::{Interpreter, Response, TurnInput, TurnUpdate};
use crate::llm::LlmClient;
use crate::messages::{Attachment, Message, MessageLog};
use crate::process::{Pid, ProcessSnapshot, Runtime};
use crate::protocols::Protocol;
use crate::resources::Resource;

pub struct Session {
    log: MessageLog,
    interpreter: Interpreter,
    runtime: Runtime,
}

impl Session {
    pub fn new(interpreter: Interpreter, runtime: Runtime) -> Self {
        Self {
            log: MessageLog::new(),
            interpreter,
            runtime,
        }
    }

    /// 按配置构建：资源来自 [[resources]]，容量来自 [runtime]
    pub fn from_config(
        cfg: &KernelConfig,
        llm: Arc<dyn LlmClient>,
        protocols: Vec<Arc<dyn Protocol>>,
    ) -> Result<Self, KernelError> {
        let runtime = Runtime::new(cfg.runtime_config(), protocols)?;
        let interpreter = Interpreter::new(llm, cfg.resources.clone(), cfg.interpreter_config());
        Ok(Self::new(interpreter, runtime))
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut self.runtime
    }

    pub fn update_resources(&mut self, resources: Vec<Resource>) {
        self.interpreter.update_resources(resources);
    }

    /// 从快照恢复进程（均为挂起状态）；任一快照无效时一个也不恢复
    pub fn restore(&mut self, snapshots: Vec<ProcessSnapshot>) -> Result<Vec<Pid>, KernelError> {
        self.runtime.instantiate_all(snapshots)
    }

    fn turn_update(&self) -> TurnUpdate {
        TurnUpdate::new(self.log.messages().to_vec())
            .with_processes(self.runtime.describe_processes())
    }

    /// 处理一次用户输入，返回本回合产出的全部响应
    pub async fn handle_input(
        &mut self,
        text: Option<String>,
        files: Vec<Attachment>,
    ) -> Result<Vec<Response>, KernelError> {
        let input = Message::input(text, files);
        let correlation_id = input.id().to_string();
        self.log.push(input);
        tracing::debug!(correlation_id = %correlation_id, "turn started");

        let mut turn = self.interpreter.run(
            TurnInput::new(self.log.messages().to_vec())
                .with_processes(self.runtime.describe_processes()),
        );
        let mut responses = Vec::new();
        let mut update = None;

        while let Some(resp) = turn.resume(update.take()).await? {
            match &resp {
                Response::ActionProposal { proposal } => {
                    let result = self.runtime.dispatch(proposal).await?;
                    self.log.push(result.to_message(correlation_id.clone()));
                    update = Some(self.turn_update());
                }
                Response::Direct { text } => {
                    self.log
                        .push(Message::response(correlation_id.clone(), text.clone()));
                }
                Response::Thought { .. } | Response::Log { .. } => {}
            }
            responses.push(resp);
        }

        tracing::info!(
            correlation_id = %correlation_id,
            responses = responses.len(),
            "turn finished"
        );
        Ok(responses)
    }

    /// 纯文本输入的便捷写法
    pub async fn handle_text(&mut self, text: impl Into<String>) -> Result<Vec<Response>, KernelError> {
        self.handle_input(Some(text.into()), Vec::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::InterpreterConfig;
    use crate::llm::{MockLlmClient, MockReply};
    use crate::messages::MessageBody;
    use crate::process::{ProcessStatus, RuntimeConfig};
    use crate::protocols::{builtin_protocols, EchoProtocol, NotesProtocol};
    use serde_json::json;

    fn session(llm: Arc<MockLlmClient>, limit: Option<usize>) -> Session {
        let interpreter = Interpreter::new(
            llm,
            vec![EchoProtocol::resource(), NotesProtocol::resource()],
            InterpreterConfig::default(),
        );
        let runtime = Runtime::new(
            RuntimeConfig {
                process_limit: limit,
            },
            builtin_protocols(),
        )
        .unwrap();
        Session::new(interpreter, runtime)
    }

    #[tokio::test]
    async fn test_text_turn_logs_input_and_response() {
        let llm = Arc::new(MockLlmClient::with_replies([
            MockReply::Object(json!({ "strategy": "TEXT" })),
            MockReply::Text("Hi there.".into()),
        ]));
        let mut s = session(llm, Some(50));
        let responses = s.handle_text("hello").await.unwrap();

        assert_eq!(responses, vec![Response::Direct { text: "Hi there.".into() }]);
        assert_eq!(s.log().len(), 2);
        let input_id = s.log().messages()[0].id().to_string();
        assert_eq!(s.log().messages()[1].correlation_id(), input_id);
    }

    #[tokio::test]
    async fn test_research_turn_creates_process() {
        let llm = Arc::new(MockLlmClient::with_replies([
            MockReply::Object(json!({ "strategy": "RESEARCH" })),
            MockReply::Object(json!({ "tools": [
                { "id": "notes://local->open", "args": { "title": "Groceries", "lines": ["milk"] } },
                { "id": "echo://local->say", "args": { "text": "noted" }, "display": "inline" }
            ]})),
            MockReply::Text("Opened your note.".into()),
        ]));
        let mut s = session(llm.clone(), Some(50));
        let responses = s.handle_text("start a grocery list").await.unwrap();

        assert_eq!(responses.len(), 3);
        assert_eq!(s.runtime().len(), 1);
        // 输入 + 两条动作消息 + 回复
        assert_eq!(s.log().len(), 4);

        let pid = match s.log().messages()[1].body() {
            MessageBody::Action { process: Some(pid), .. } => pid.clone(),
            other => panic!("unexpected body {:?}", other),
        };
        assert_eq!(s.runtime().status(&pid), Some(ProcessStatus::Running));
        match s.log().messages()[2].body() {
            MessageBody::Action { content, .. } => {
                assert_eq!(content, &Some(json!({ "text": "noted" })))
            }
            other => panic!("unexpected body {:?}", other),
        }

        // 最终回复请求看到了进程描述
        let last = llm.requests().pop().unwrap();
        assert!(last[0].text().unwrap().contains(&pid));
    }

    #[tokio::test]
    async fn test_failed_dispatch_keeps_earlier_messages() {
        let llm = Arc::new(MockLlmClient::with_replies([
            MockReply::Object(json!({ "strategy": "RESEARCH" })),
            MockReply::Object(json!({ "tools": [
                { "id": "echo://local->say", "args": { "text": "one" }, "display": "inline" },
                { "id": "notes://local->open", "args": { "title": "t" } }
            ]})),
        ]));
        let mut s = session(llm, Some(50));
        s.runtime_mut().deregister_protocol(&["notes"]);

        let err = s.handle_text("go").await.unwrap_err();
        assert!(matches!(err, KernelError::UnregisteredProtocol(ref p) if p == "notes"));
        // 输入 + 第一条动作消息
        assert_eq!(s.log().len(), 2);
    }

    #[tokio::test]
    async fn test_capacity_applies_across_turns() {
        let open = |title: &str| {
            [
                MockReply::Object(json!({ "strategy": "RESEARCH" })),
                MockReply::Object(json!({ "tools": [
                    { "id": "notes://local->open", "args": { "title": title } }
                ]})),
                MockReply::Text("ok".into()),
            ]
        };
        let llm = Arc::new(MockLlmClient::new());
        for reply in open("a").into_iter().chain(open("b")) {
            llm.push_reply(reply);
        }
        let mut s = session(llm, Some(1));
        s.handle_text("open a").await.unwrap();
        s.handle_text("open b").await.unwrap();

        let statuses: Vec<_> = s.runtime().containers().map(|c| c.status()).collect();
        assert_eq!(statuses, vec![ProcessStatus::Suspended, ProcessStatus::Running]);
    }

    #[tokio::test]
    async fn test_restore_from_snapshots() {
        let llm = Arc::new(MockLlmClient::with_replies([
            MockReply::Object(json!({ "strategy": "RESEARCH" })),
            MockReply::Object(json!({ "tools": [
                { "id": "notes://local->open", "args": { "title": "keep" } }
            ]})),
            MockReply::Text("ok".into()),
        ]));
        let mut first = session(llm, Some(50));
        first.handle_text("open").await.unwrap();
        let snapshots = first.runtime().snapshots().unwrap();

        let mut second = session(Arc::new(MockLlmClient::new()), Some(50));
        let pids = second.restore(snapshots).unwrap();
        assert_eq!(pids.len(), 1);
        assert_eq!(second.runtime().status(&pids[0]), Some(ProcessStatus::Suspended));
        second.runtime_mut().resume(&pids[0]).unwrap();
        assert_eq!(second.runtime().status(&pids[0]), Some(ProcessStatus::Running));
    }

    #[tokio::test]
    async fn test_restore_rejects_whole_batch() {
        let llm = Arc::new(MockLlmClient::with_replies([
            MockReply::Object(json!({ "strategy": "RESEARCH" })),
            MockReply::Object(json!({ "tools": [
                { "id": "notes://local->open", "args": { "title": "good" } }
            ]})),
            MockReply::Text("ok".into()),
        ]));
        let mut first = session(llm, Some(50));
        first.handle_text("open").await.unwrap();
        let good = first.runtime().snapshots().unwrap().remove(0);
        let mut bad = good.clone();
        bad.pid = "proc_bad".into();
        bad.tag = "sketch".into();

        let mut second = session(Arc::new(MockLlmClient::new()), Some(50));
        assert!(matches!(
            second.restore(vec![good.clone(), bad]),
            Err(KernelError::ConstructorNotFound { ref tag, .. }) if tag == "sketch"
        ));
        assert!(second.runtime().is_empty());

        // 修正后重试成功
        assert_eq!(second.restore(vec![good.clone()]).unwrap(), vec![good.pid]);
    }
}

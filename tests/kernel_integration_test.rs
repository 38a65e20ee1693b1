//! 内核端到端集成测试：Session / actor 驱动完整回合、进程容量与快照恢复

use std::sync::Arc;

use hive::config::KernelConfig;
use hive::core::{spawn_kernel, KernelError, Session};
use hive::interpreter::{Interpreter, InterpreterConfig, Response};
use hive::llm::{MockLlmClient, MockReply};
use hive::messages::{Attachment, MessageBody};
use hive::process::{snapshot_schema_json, ProcessStatus, Runtime, RuntimeConfig, RuntimeEvent};
use hive::protocols::{builtin_protocols, EchoProtocol, NotesProtocol, Protocol};
use hive::resources::Resource;
use serde_json::json;

fn resources() -> Vec<Resource> {
    vec![EchoProtocol::resource(), NotesProtocol::resource()]
}

fn session_with(llm: Arc<MockLlmClient>, limit: Option<usize>) -> Session {
    let interpreter = Interpreter::new(llm, resources(), InterpreterConfig::default());
    let runtime = Runtime::new(RuntimeConfig { process_limit: limit }, builtin_protocols())
        .expect("runtime");
    Session::new(interpreter, runtime)
}

fn open_note(title: &str) -> [MockReply; 3] {
    [
        MockReply::Object(json!({ "strategy": "RESEARCH" })),
        MockReply::Object(json!({ "tools": [
            { "id": "notes://local->open", "args": { "title": title } }
        ]})),
        MockReply::Text(format!("Opened {}.", title)),
    ]
}

#[tokio::test]
async fn test_session_from_config_runs_text_turn() {
    let cfg = KernelConfig {
        resources: resources(),
        ..KernelConfig::default()
    };
    let llm = Arc::new(MockLlmClient::with_replies([
        MockReply::Object(json!({ "thought": "just chat", "strategy": "TEXT" })),
        MockReply::Text("Hello from hive.".into()),
    ]));
    let mut session = Session::from_config(&cfg, llm, builtin_protocols()).unwrap();
    assert_eq!(session.runtime().process_limit(), Some(50));

    let responses = session.handle_text("hi").await.unwrap();
    assert_eq!(
        responses,
        vec![
            Response::Thought { text: "just chat".into() },
            Response::Direct { text: "Hello from hive.".into() },
        ]
    );
    assert_eq!(session.log().len(), 2);
}

#[tokio::test]
async fn test_attachments_reach_the_model() {
    let llm = Arc::new(MockLlmClient::with_replies([MockReply::Text("Got it.".into())]));
    let interpreter = Interpreter::new(llm.clone(), vec![], InterpreterConfig::default());
    let runtime = Runtime::new(RuntimeConfig::default(), vec![]).unwrap();
    let mut session = Session::new(interpreter, runtime);

    let file = Attachment::new("notes.txt", "text/plain", b"remember the milk".to_vec());
    session
        .handle_input(Some("read this".into()), vec![file])
        .await
        .unwrap();

    let request = &llm.requests()[0];
    let rendered = serde_json::to_string(request).unwrap();
    assert!(rendered.contains("remember the milk"));
}

#[tokio::test]
async fn test_oldest_processes_suspended_first() {
    let llm = Arc::new(MockLlmClient::new());
    for title in ["a", "b", "c", "d"] {
        for reply in open_note(title) {
            llm.push_reply(reply);
        }
    }
    let mut session = session_with(llm, Some(2));
    let mut events = session.runtime().subscribe();

    for title in ["a", "b", "c", "d"] {
        session.handle_text(format!("open {}", title)).await.unwrap();
    }

    let statuses: Vec<_> = session.runtime().containers().map(|c| c.status()).collect();
    assert_eq!(
        statuses,
        vec![
            ProcessStatus::Suspended,
            ProcessStatus::Suspended,
            ProcessStatus::Running,
            ProcessStatus::Running,
        ]
    );

    let mut suspended = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, RuntimeEvent::ProcessSuspended { .. }) {
            suspended += 1;
        }
    }
    assert_eq!(suspended, 2);
}

#[tokio::test]
async fn test_action_messages_share_turn_correlation() {
    let llm = Arc::new(MockLlmClient::with_replies([
        MockReply::Object(json!({ "strategy": "RESEARCH" })),
        MockReply::Object(json!({ "tools": [
            { "id": "echo://local->say", "args": { "text": "ping" }, "display": "inline" }
        ]})),
        MockReply::Text("pong".into()),
    ]));
    let mut session = session_with(llm, Some(50));
    session.handle_text("ping?").await.unwrap();

    let messages = session.log().messages();
    let input_id = messages[0].id();
    assert!(messages.iter().all(|m| m.correlation_id() == input_id));
    assert_eq!(session.log().turn(input_id).count(), 3);
    assert!(matches!(messages[1].body(), MessageBody::Action { uri, .. } if uri == "echo://local"));
}

#[tokio::test]
async fn test_snapshots_round_trip_through_new_session() {
    let llm = Arc::new(MockLlmClient::with_replies(open_note("keep")));
    let mut first = session_with(llm, Some(50));
    first.handle_text("open keep").await.unwrap();
    let snapshots = first.runtime().snapshots().unwrap();

    let schema: serde_json::Value = serde_json::from_str(&snapshot_schema_json()).unwrap();
    let value = serde_json::to_value(&snapshots[0]).unwrap();
    assert!(jsonschema::JSONSchema::compile(&schema)
        .unwrap()
        .is_valid(&value));

    let mut second = session_with(Arc::new(MockLlmClient::new()), Some(50));
    let pid = second.restore(snapshots).unwrap().remove(0);
    second.runtime_mut().resume(&pid).unwrap();
    assert_eq!(
        second.runtime().describe_processes()[&pid]["title"],
        json!("keep")
    );
}

#[tokio::test]
async fn test_reserved_scheme_rejected_at_startup() {
    struct Impostor;

    #[async_trait::async_trait]
    impl Protocol for Impostor {
        fn schemes(&self) -> Vec<String> {
            vec!["process".to_string()]
        }

        async fn handle_action(
            &self,
            _proposal: &hive::protocols::ActionProposal,
        ) -> Result<hive::protocols::ActionOutput, KernelError> {
            Err(KernelError::ActionFailed("never".into()))
        }
    }

    let result = Runtime::new(RuntimeConfig::default(), vec![Arc::new(Impostor) as Arc<dyn Protocol>]);
    assert!(matches!(result, Err(KernelError::ReservedScheme(_))));
}

#[tokio::test]
async fn test_actor_serializes_turns() {
    let llm = Arc::new(MockLlmClient::new());
    for title in ["x", "y"] {
        for reply in open_note(title) {
            llm.push_reply(reply);
        }
    }
    let (handle, join) = spawn_kernel(session_with(llm, Some(1)));

    let (a, b) = tokio::join!(handle.submit("open x"), handle.submit("open y"));
    assert!(a.is_ok() && b.is_ok());

    let procs = handle.describe_processes().await.unwrap();
    assert_eq!(procs.len(), 2);
    let suspended = procs
        .values()
        .filter(|d| d.get("status") == Some(&json!("suspended")))
        .count();
    assert_eq!(suspended, 1);

    handle.quit();
    let session = join.await.unwrap();
    // 两个回合，各 3 条消息
    assert_eq!(session.log().len(), 6);
}

#[tokio::test]
async fn test_model_appends_to_open_note() {
    let llm = Arc::new(MockLlmClient::with_replies(open_note("groceries")));
    let mut session = session_with(llm.clone(), Some(50));
    session.handle_text("start a grocery list").await.unwrap();
    let pid = session.runtime().containers().next().unwrap().pid().to_string();
    let mut events = session.runtime().subscribe();

    let append = |line: &str| {
        [
            MockReply::Object(json!({ "strategy": "RESEARCH" })),
            MockReply::Object(json!({ "tools": [
                { "id": "notes://local->append", "args": { "pid": pid, "line": line } }
            ]})),
            MockReply::Text("Added.".into()),
        ]
    };
    for reply in append("milk") {
        llm.push_reply(reply);
    }
    session.handle_text("add milk").await.unwrap();

    session.runtime_mut().suspend(&pid).unwrap();
    session.runtime_mut().resume(&pid).unwrap();
    for reply in append("bread") {
        llm.push_reply(reply);
    }
    session.handle_text("add bread").await.unwrap();

    let mut changed = 0;
    while let Ok(event) = events.try_recv() {
        if event == (RuntimeEvent::ProcessChanged { pid: pid.clone() }) {
            changed += 1;
        }
    }
    assert_eq!(changed, 2);
    assert_eq!(
        session.runtime().describe_processes()[&pid]["lines"],
        json!(["milk", "bread"])
    );
    let last_action = session
        .log()
        .messages()
        .iter()
        .rev()
        .find_map(|m| match m.body() {
            MessageBody::Action { content, .. } => content.clone(),
            _ => None,
        })
        .unwrap();
    assert_eq!(last_action["lines"], json!(["milk", "bread"]));
}

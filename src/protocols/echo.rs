//! Echo 协议：把参数原样作为结果返回

use async_trait::async_trait;
use serde_json::json;

use crate::core::KernelError;
use crate::protocols::{ActionOutput, ActionProposal, Protocol};
use crate::resources::{ActionDefinition, Resource};

pub struct EchoProtocol;

impl EchoProtocol {
    /// 与本协议配套的资源描述
    pub fn resource() -> Resource {
        Resource::new("echo://local", "echo").with_name("Echo").with_action(
            "say",
            ActionDefinition::new("Echo the given text back as the action result").with_params(
                json!({
                    "type": "object",
                    "properties": { "text": { "type": "string" } },
                    "required": ["text"]
                }),
            ),
        )
    }
}

#[async_trait]
impl Protocol for EchoProtocol {
    fn schemes(&self) -> Vec<String> {
        vec!["echo".to_string()]
    }

    async fn handle_action(&self, proposal: &ActionProposal) -> Result<ActionOutput, KernelError> {
        Ok(ActionOutput::Value(proposal.args.clone()))
    }
}

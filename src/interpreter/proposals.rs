//! 动作提案生成
//!
//! 一次结构化调用，模型可同时选择多个动作。全部提案校验通过后才返回：
//! 句柄必须在 ActionDict 中，参数必须符合动作的 params_schema，展示方式解析为非 auto。

use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::KernelError;
use crate::interpreter::strategy::object_error;
use crate::interpreter::{TurnContext, TurnInput};
use crate::llm::{parse_object, validate_against};
use crate::messages::ModelMessage;
use crate::protocols::ActionProposal;
use crate::resources::{decode, ActionDefinition, ActionDict, DisplayMode};

#[derive(Debug, Deserialize)]
struct ToolSelection {
    tools: Vec<ToolPick>,
}

#[derive(Debug, Deserialize)]
struct ToolPick {
    id: String,
    #[serde(default)]
    args: Option<Value>,
    #[serde(default)]
    display: Option<DisplayMode>,
}

/// 发送给模型的动作选择 schema
pub fn action_choice_schema(actions: &ActionDict) -> Value {
    let handles: Vec<&String> = actions.keys().collect();
    let displays: Vec<&str> = DisplayMode::CHOICES.iter().map(|d| d.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "tools": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "enum": handles },
                        "args": { "type": "object" },
                        "display": { "type": "string", "enum": displays }
                    },
                    "required": ["id", "display"]
                }
            }
        },
        "required": ["tools"]
    })
}

/// 定义钉死的展示方式优先，否则取模型选择的非 auto 选项
pub fn resolve_display(
    def: &ActionDefinition,
    chosen: Option<DisplayMode>,
) -> Option<DisplayMode> {
    def.pinned_display()
        .or_else(|| chosen.filter(|d| *d != DisplayMode::Auto))
}

fn to_proposal(actions: &ActionDict, pick: ToolPick) -> Result<ActionProposal, KernelError> {
    let def = actions
        .get(&pick.id)
        .ok_or_else(|| KernelError::InvalidActionHandle(pick.id.clone()))?;
    let handle = decode(&pick.id)?;

    let args = pick.args.unwrap_or_else(|| json!({}));
    if let Some(schema) = &def.params_schema {
        validate_against(schema, &args).map_err(|e| match e {
            KernelError::ModelSchema(detail) => {
                KernelError::ModelSchema(format!("{}: {}", pick.id, detail))
            }
            other => other,
        })?;
    }

    let display = resolve_display(def, pick.display).ok_or_else(|| {
        KernelError::ModelSchema(format!("{}: display mode must not be auto", pick.id))
    })?;

    Ok(ActionProposal::new(handle.uri, handle.action_id, args, display))
}

/// 校验模型输出并转为提案列表
pub fn parse_proposals(actions: &ActionDict, value: Value) -> Result<Vec<ActionProposal>, KernelError> {
    let selection: ToolSelection = parse_object(value)?;
    if selection.tools.is_empty() {
        return Err(KernelError::ModelSchema("no action selected".to_string()));
    }
    selection
        .tools
        .into_iter()
        .map(|pick| to_proposal(actions, pick))
        .collect()
}

/// 调用模型生成一个或多个动作提案
pub async fn generate_proposals(
    ctx: &TurnContext,
    input: &TurnInput,
) -> Result<Vec<ActionProposal>, KernelError> {
    let schema = action_choice_schema(&ctx.actions);
    let mut messages = ctx.model_messages(input);
    messages.push(ModelMessage::system(
        "Select one or more actions to gather what you need. For each, give its id, \
         arguments matching its params schema, and a display mode.",
    ));
    let value = ctx
        .llm
        .generate_object(&messages, &schema)
        .await
        .map_err(object_error)?;
    let proposals = parse_proposals(&ctx.actions, value)?;
    tracing::debug!(count = proposals.len(), "action proposals generated");
    Ok(proposals)
}

//! 资源描述：URI + 协议 + 展示元数据 + 动作表
//!
//! 资源由外部配置提供，内核只读。

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 动作结果的展示方式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// 由模型决定；发出的提案中不会保留此值
    #[default]
    Auto,
    Inline,
    Panel,
    Fullscreen,
}

impl DisplayMode {
    /// 供模型选择的非 auto 选项
    pub const CHOICES: [DisplayMode; 3] = [DisplayMode::Inline, DisplayMode::Panel, DisplayMode::Fullscreen];

    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::Auto => "auto",
            DisplayMode::Inline => "inline",
            DisplayMode::Panel => "panel",
            DisplayMode::Fullscreen => "fullscreen",
        }
    }
}

/// 图标
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Icon {
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// 单个动作的定义
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ActionDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// 参数 JSON Schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params_schema: Option<Value>,
    /// 固定展示方式；为空或 auto 时由模型选择
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<DisplayMode>,
}

impl ActionDefinition {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }

    pub fn with_params(mut self, schema: Value) -> Self {
        self.params_schema = Some(schema);
        self
    }

    pub fn with_display(mut self, display: DisplayMode) -> Self {
        self.display = Some(display);
        self
    }

    /// 定义中钉死的非 auto 展示方式
    pub fn pinned_display(&self) -> Option<DisplayMode> {
        self.display.filter(|d| *d != DisplayMode::Auto)
    }
}

/// 资源描述
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub uri: String,
    /// 协议（URI scheme）
    pub protocol: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub icons: Vec<Icon>,
    #[serde(default)]
    pub actions: BTreeMap<String, ActionDefinition>,
}

impl Resource {
    pub fn new(uri: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            protocol: protocol.into(),
            name: None,
            icons: Vec::new(),
            actions: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_action(mut self, id: impl Into<String>, def: ActionDefinition) -> Self {
        self.actions.insert(id.into(), def);
        self
    }
}

//! 资源注册表与 ActionDict
//!
//! ActionDict 是「动作句柄 -> 动作定义」的扁平表。资源集合变化时整表重建，不做增量修补。

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::resources::{encode, ActionDefinition, Resource};

/// 动作句柄 -> 定义（BTreeMap 保证遍历顺序稳定，prompt 输出可复现）
pub type ActionDict = BTreeMap<String, ActionDefinition>;

/// 为每个 (资源, 动作) 生成一条记录
pub fn build_action_dict(resources: &[Resource]) -> ActionDict {
    let mut dict = ActionDict::new();
    for resource in resources {
        for (action_id, def) in &resource.actions {
            dict.insert(encode(&resource.uri, action_id), def.clone());
        }
    }
    dict
}

/// 资源注册表：有序资源列表 + 派生的 ActionDict（共享快照，进行中的回合不受更新影响）
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    resources: Vec<Resource>,
    actions: Arc<ActionDict>,
}

impl ResourceRegistry {
    pub fn new(resources: Vec<Resource>) -> Self {
        let actions = Arc::new(build_action_dict(&resources));
        Self { resources, actions }
    }

    /// 替换资源集合并重建 ActionDict
    pub fn update(&mut self, resources: Vec<Resource>) {
        self.actions = Arc::new(build_action_dict(&resources));
        self.resources = resources;
        tracing::info!(
            resources = self.resources.len(),
            actions = self.actions.len(),
            "resources updated"
        );
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, uri: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.uri == uri)
    }

    pub fn actions(&self) -> Arc<ActionDict> {
        Arc::clone(&self.actions)
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

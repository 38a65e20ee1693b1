//! 进程快照 JSON Schema（schemars 自动生成）
//!
//! 宿主持久化快照时可用它校验存储内容。

use schemars::schema_for;

use crate::process::ProcessSnapshot;

/// 返回 ProcessSnapshot 的 JSON Schema 字符串
pub fn snapshot_schema_json() -> String {
    let schema = schema_for!(ProcessSnapshot);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::validate_against;
    use crate::process::ProcessContainer;
    use crate::protocols::notes::Note;

    #[test]
    fn test_schema_lists_required_fields() {
        let schema: serde_json::Value = serde_json::from_str(&snapshot_schema_json()).unwrap();
        let required = schema["required"].as_array().unwrap();
        for field in ["pid", "source", "tag", "state"] {
            assert!(required.iter().any(|r| r == field), "missing {field}");
        }
    }

    #[test]
    fn test_real_snapshot_validates() {
        let schema: serde_json::Value = serde_json::from_str(&snapshot_schema_json()).unwrap();
        let snap = ProcessContainer::new("notes", Box::new(Note::new("x")))
            .serialize()
            .unwrap();
        let value = serde_json::to_value(&snap).unwrap();
        validate_against(&schema, &value).unwrap();
    }
}

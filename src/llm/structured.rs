//! 结构化输出解析
//!
//! extract_json 从模型文本中提取 JSON（```json 围栏或最外层花括号）；
//! validate_against 用 jsonschema 校验实例；parse_object 反序列化为目标类型。

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::KernelError;
use crate::llm::LlmError;

/// 从模型输出中提取 JSON 值
pub fn extract_json(output: &str) -> Result<Value, LlmError> {
    let trimmed = output.trim();

    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or(rest.trim())
    } else if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            &trimmed[start..=end]
        } else {
            trimmed
        }
    } else {
        trimmed
    };

    serde_json::from_str(json_str)
        .map_err(|e| LlmError::InvalidOutput(format!("{}: {}", e, json_str)))
}

/// 用 JSON Schema 校验实例，失败时汇总所有错误
pub fn validate_against(schema: &Value, instance: &Value) -> Result<(), KernelError> {
    let compiled = jsonschema::JSONSchema::compile(schema)
        .map_err(|e| KernelError::ModelSchema(format!("invalid schema: {}", e)))?;
    if let Err(errors) = compiled.validate(instance) {
        let detail: Vec<String> = errors
            .map(|e| format!("{} at '{}'", e, e.instance_path))
            .collect();
        return Err(KernelError::ModelSchema(detail.join("; ")));
    }
    Ok(())
}

/// 反序列化模型生成的对象
pub fn parse_object<T: DeserializeOwned>(value: Value) -> Result<T, KernelError> {
    serde_json::from_value(value).map_err(|e| KernelError::ModelSchema(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_fenced_json() {
        let out = "Sure.\n```json\n{\"strategy\": \"TEXT\"}\n```";
        assert_eq!(extract_json(out).unwrap(), json!({"strategy": "TEXT"}));
    }

    #[test]
    fn test_extract_bare_json() {
        let out = "choice: {\"strategy\": \"RESEARCH\"} done";
        assert_eq!(extract_json(out).unwrap(), json!({"strategy": "RESEARCH"}));
    }

    #[test]
    fn test_extract_without_json_fails() {
        assert!(matches!(
            extract_json("no structure here"),
            Err(LlmError::InvalidOutput(_))
        ));
    }

    #[test]
    fn test_validate_reports_errors() {
        let schema = json!({
            "type": "object",
            "properties": { "q": { "type": "string" } },
            "required": ["q"]
        });
        assert!(validate_against(&schema, &json!({"q": "rust"})).is_ok());
        let err = validate_against(&schema, &json!({"q": 1})).unwrap_err();
        assert!(matches!(err, KernelError::ModelSchema(_)));
    }
}

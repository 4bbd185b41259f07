//! JSON Schema 校验（工具输出与 ReAct 最终答案共用）

use jsonschema::JSONSchema;
use serde_json::Value;

/// schema 本身能否编译
pub fn check_schema(schema: &Value) -> Result<(), String> {
    JSONSchema::compile(schema)
        .map(|_| ())
        .map_err(|e| format!("invalid schema: {}", e))
}

/// 按 schema 校验 instance；失败时返回拼接后的错误描述
pub fn validate_against_schema(schema: &Value, instance: &Value) -> Result<(), String> {
    let compiled =
        JSONSchema::compile(schema).map_err(|e| format!("invalid schema: {}", e))?;
    let result = compiled.validate(instance);
    match result {
        Ok(()) => Ok(()),
        Err(errors) => {
            let messages: Vec<String> = errors.map(|e| e.to_string()).collect();
            Err(messages.join("; "))
        }
    }
}

/// 先把文本解析为 JSON，再按 schema 校验
pub fn validate_text_against_schema(schema: &Value, text: &str) -> Result<Value, String> {
    let value: Value =
        serde_json::from_str(text.trim()).map_err(|e| format!("not valid JSON: {}", e))?;
    validate_against_schema(schema, &value)?;
    Ok(value)
}

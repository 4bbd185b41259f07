//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / output_schema / execute），由 ToolRegistry 按名注册与查找，
//! ToolDispatcher 在派发时解析工具、构造 ToolInput 并施加重试与校验。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::tools::ToolInput;

/// 工具 trait：名称、描述（供 LLM 理解）、可选输出 schema、异步执行
///
/// 立即完成的工具与需要挂起等待 I/O 的工具都以同一个 `execute` future 暴露，调用方不区分两者。
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（计划中的 action、ReAct 中的 Action）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema，拼入工具目录；默认不限制
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 输出 JSON Schema；strict_validation 开启时用于事后校验
    fn output_schema(&self) -> Option<&Value> {
        None
    }

    async fn execute(&self, input: ToolInput) -> Result<Value, String>;
}

/// 供 prompt 构造使用的工具目录项
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDescriptor {
    /// 参数 schema 是否声明了任何属性
    fn has_parameters(&self) -> bool {
        self.parameters
            .get("properties")
            .and_then(Value::as_object)
            .is_some_and(|props| !props.is_empty())
    }
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，同名再注册会覆盖旧条目
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::debug!("Tool {} re-registered, previous entry replaced", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// 返回 {name, description, parameters} 列表（按名称排序）
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .map(|tool| ToolDescriptor {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// 将工具目录渲染为 prompt 段落：每行 `- name: description`，声明了参数时附上参数 schema
pub fn render_catalog(catalog: &[ToolDescriptor]) -> String {
    catalog
        .iter()
        .map(|t| {
            if t.has_parameters() {
                format!("- {}: {} Parameters: {}", t.name, t.description, t.parameters)
            } else {
                format!("- {}: {}", t.name, t.description)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{EchoTool, FnTool};

    #[test]
    fn test_register_and_list() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(FnTool::new("add", "Add two numbers", |_input| {
            Ok(serde_json::json!(3))
        }));
        assert_eq!(registry.len(), 2);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
        assert!(registry.contains("add"));
        let names: Vec<String> = registry.list().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["add", "echo"]);
    }

    #[test]
    fn test_reregistration_overwrites() {
        let mut registry = ToolRegistry::new();
        registry.register(FnTool::new("calc", "old", |_| Ok(Value::Null)));
        registry.register(FnTool::new("calc", "new", |_| Ok(Value::Null)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list()[0].description, "new");
    }

    #[test]
    fn test_render_catalog() {
        let catalog = vec![ToolDescriptor {
            name: "ping".into(),
            description: "Check liveness".into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }];
        assert_eq!(render_catalog(&catalog), "- ping: Check liveness");
    }

    #[test]
    fn test_catalog_carries_parameter_schema() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(
            FnTool::new("add", "Add two numbers", |_| Ok(Value::Null)).with_parameters_schema(
                serde_json::json!({
                    "type": "object",
                    "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}},
                    "required": ["a", "b"]
                }),
            ),
        );
        let rendered = render_catalog(&registry.list());
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[0].starts_with("- add: Add two numbers Parameters: {"));
        assert!(lines[0].contains("\"required\":[\"a\",\"b\"]"));
        assert!(lines[1].starts_with("- echo: Return the given text unchanged. Parameters: {"));
        assert!(lines[1].contains("\"text\""));
    }
}

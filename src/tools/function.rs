//! 闭包工具：同步（立即返回）与异步（可挂起）两种实现
//!
//! 两者都实现 Tool，Dispatcher 只通过 `execute` future 调用，不区分具体类型。

use std::future::Future;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::tools::{Tool, ToolInput};

/// 同步闭包工具
pub struct FnTool<F> {
    name: String,
    description: String,
    parameters: Option<Value>,
    output_schema: Option<Value>,
    func: F,
}

impl<F> FnTool<F>
where
    F: Fn(&ToolInput) -> Result<Value, String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, description: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: None,
            output_schema: None,
            func,
        }
    }

    /// 参数 schema，会出现在规划与 ReAct 的工具目录中
    pub fn with_parameters_schema(mut self, schema: Value) -> Self {
        self.parameters = Some(schema);
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }
}

#[async_trait]
impl<F> Tool for FnTool<F>
where
    F: Fn(&ToolInput) -> Result<Value, String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        match &self.parameters {
            Some(schema) => schema.clone(),
            None => serde_json::json!({"type": "object", "properties": {}}),
        }
    }

    fn output_schema(&self) -> Option<&Value> {
        self.output_schema.as_ref()
    }

    async fn execute(&self, input: ToolInput) -> Result<Value, String> {
        (self.func)(&input)
    }
}

type AsyncToolFn = Box<dyn Fn(ToolInput) -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;

/// 异步闭包工具（I/O 型工具）
pub struct AsyncFnTool {
    name: String,
    description: String,
    parameters: Option<Value>,
    output_schema: Option<Value>,
    func: AsyncToolFn,
}

impl AsyncFnTool {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(ToolInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: None,
            output_schema: None,
            func: Box::new(move |input| func(input).boxed()),
        }
    }

    /// 参数 schema，会出现在规划与 ReAct 的工具目录中
    pub fn with_parameters_schema(mut self, schema: Value) -> Self {
        self.parameters = Some(schema);
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }
}

#[async_trait]
impl Tool for AsyncFnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        match &self.parameters {
            Some(schema) => schema.clone(),
            None => serde_json::json!({"type": "object", "properties": {}}),
        }
    }

    fn output_schema(&self) -> Option<&Value> {
        self.output_schema.as_ref()
    }

    async fn execute(&self, input: ToolInput) -> Result<Value, String> {
        (self.func)(input).await
    }
}

//! 工具层：Tool 能力、注册表、闭包工具、重试退避与派发器

pub mod backoff;
pub mod dispatcher;
pub mod echo;
pub mod function;
pub mod input;
pub mod registry;
pub mod schema;

pub use backoff::{BackoffPolicy, LinearBackoff, RecordingSleeper, Sleeper, TokioSleeper};
pub use dispatcher::{ToolDispatcher, QUERY_PARAMETER};
pub use echo::EchoTool;
pub use function::{AsyncFnTool, FnTool};
pub use input::{ToolFailure, ToolInput, ToolOutcome};
pub use registry::{render_catalog, Tool, ToolDescriptor, ToolRegistry};
pub use schema::{check_schema, validate_against_schema, validate_text_against_schema};

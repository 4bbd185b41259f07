//! 认知层：步骤校验、计划生成、ReAct 解析与循环、反思

pub mod loop_;
pub mod parser;
pub mod planner;
pub mod reflection;
pub mod step;

pub use loop_::{ReactRunner, ReactSession, ReactTrace};
pub use parser::{parse_react_output, ReactParse};
pub use planner::{parse_plan, PlanGenerator};
pub use reflection::{Reflector, DEFAULT_REFLECTION_TEMPLATE};
pub use step::{is_valid_step, plan_schema, Step};
